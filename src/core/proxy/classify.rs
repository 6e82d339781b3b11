//! Upstream error classification
//!
//! Maps a non-2xx upstream response onto the retry taxonomy. Quota and
//! missing-model detection is heuristic and provider-specific, so the hint
//! lists come from configuration rather than being baked in.

use crate::config::ClassifierConfig;

/// Category of a failed upstream response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    /// 4xx (excluding 429): malformed input, returned verbatim, not retried
    ClientError,
    /// 429: transient, penalized and retried elsewhere
    RateLimited,
    /// 5xx: transient, penalized and retried elsewhere
    ServerError,
    /// Upstream no longer serves the model; also invalidates the catalog
    ModelNotFound,
    /// Quota/credit exhausted; penalized with an extended cooldown
    QuotaExhausted,
}

impl UpstreamErrorKind {
    /// Whether the orchestrator should try another provider.
    pub fn is_retryable(self) -> bool {
        !matches!(self, UpstreamErrorKind::ClientError)
    }
}

/// Configurable upstream error classifier.
#[derive(Debug, Clone)]
pub struct Classifier {
    quota_statuses: Vec<u16>,
    quota_hints: Vec<String>,
    missing_model_hints: Vec<String>,
}

impl Classifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            quota_statuses: config.quota_statuses.clone(),
            quota_hints: config.quota_hints.iter().map(|h| h.to_lowercase()).collect(),
            missing_model_hints: config
                .missing_model_hints
                .iter()
                .map(|h| h.to_lowercase())
                .collect(),
        }
    }

    /// Classify a non-2xx response by status code and body text.
    pub fn classify(&self, status: u16, body: &str) -> UpstreamErrorKind {
        let lowered = body.to_lowercase();

        if status == 404 || self.missing_model_hints.iter().any(|h| lowered.contains(h)) {
            return UpstreamErrorKind::ModelNotFound;
        }
        if self.quota_statuses.contains(&status)
            || self.quota_hints.iter().any(|h| lowered.contains(h))
        {
            return UpstreamErrorKind::QuotaExhausted;
        }
        if status == 429 {
            return UpstreamErrorKind::RateLimited;
        }
        if (400..500).contains(&status) {
            return UpstreamErrorKind::ClientError;
        }
        UpstreamErrorKind::ServerError
    }
}
