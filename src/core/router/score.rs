//! Per (provider, model) routing statistics
//!
//! Exponentially weighted success/latency averages feed the dispatcher's
//! candidate ranking. Unseen pairs start from a neutral prior so a new
//! provider is neither starved nor blindly preferred.

use crate::config::ScoreConfig;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::Rng;

/// Rolling statistics for one (provider, model) pair.
#[derive(Debug, Clone)]
pub struct RoutingStat {
    /// Smoothed success rate in [0, 1]
    pub success_ewma: f64,
    /// Smoothed latency in milliseconds
    pub latency_ewma_ms: f64,
    /// Recorded outcomes
    pub samples: u64,
    /// Last update time
    pub last_updated: DateTime<Utc>,
}

impl RoutingStat {
    fn prior(config: &ScoreConfig) -> Self {
        Self {
            success_ewma: config.success_prior,
            latency_ewma_ms: config.latency_prior_ms,
            samples: 0,
            last_updated: Utc::now(),
        }
    }
}

/// Tracks outcomes and scores candidates.
#[derive(Debug)]
pub struct ScoreTracker {
    stats: DashMap<(String, String), RoutingStat>,
    config: ScoreConfig,
}

impl ScoreTracker {
    pub fn new(config: ScoreConfig) -> Self {
        Self {
            stats: DashMap::new(),
            config,
        }
    }

    /// Record one forward attempt or health probe outcome.
    ///
    /// The read-modify-write happens inside a single map entry operation
    /// with no await point, which is what keeps concurrent updates from
    /// losing each other.
    pub fn record(&self, provider_id: &str, model: &str, success: bool, latency_ms: Option<u64>) {
        let key = (provider_id.to_string(), model.to_string());
        let alpha = self.config.alpha;
        let mut entry = self
            .stats
            .entry(key)
            .or_insert_with(|| RoutingStat::prior(&self.config));
        let stat = entry.value_mut();

        let success_value = if success { 1.0 } else { 0.0 };
        let latency = latency_ms.map(|ms| ms as f64).unwrap_or(stat.latency_ewma_ms);

        stat.success_ewma = (1.0 - alpha) * stat.success_ewma + alpha * success_value;
        stat.latency_ewma_ms = (1.0 - alpha) * stat.latency_ewma_ms + alpha * latency;
        stat.samples += 1;
        stat.last_updated = Utc::now();
    }

    /// Score a pair: weighted success and latency components plus a small
    /// uniform jitter that only breaks exact ties.
    pub fn score(&self, provider_id: &str, model: &str) -> f64 {
        let key = (provider_id.to_string(), model.to_string());
        let (success, latency) = self
            .stats
            .get(&key)
            .map(|s| (s.success_ewma, s.latency_ewma_ms))
            .unwrap_or((self.config.success_prior, self.config.latency_prior_ms));

        let latency_score = 1.0 / (1.0 + latency / self.config.latency_knee_ms);
        let jitter = if self.config.jitter > 0.0 {
            rand::thread_rng().r#gen::<f64>() * self.config.jitter
        } else {
            0.0
        };

        self.config.success_weight * success + self.config.latency_weight * latency_score + jitter
    }

    /// Current statistics for a pair, if any outcome was recorded.
    pub fn stat(&self, provider_id: &str, model: &str) -> Option<RoutingStat> {
        self.stats
            .get(&(provider_id.to_string(), model.to_string()))
            .map(|s| s.clone())
    }
}
