//! Provider selection
//!
//! Given a requested model and the providers already tried for this request,
//! the dispatcher resolves aliases against the live registry snapshot,
//! filters by lifecycle state and cooldown, probes pairs whose cooldown has
//! expired, and returns the highest-scoring available candidate.

use crate::config::RoutingConfig;
use crate::core::alias::build_alias_maps;
use crate::core::models::Provider;
use crate::core::registry::ProviderStore;
use crate::core::router::cooldown::{CooldownMap, CooldownState};
use crate::core::router::score::ScoreTracker;
use crate::core::sync::Prober;
use crate::utils::error::Result;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A routing decision: where to send the request and as which model.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Chosen provider record
    pub provider: Provider,
    /// Concrete raw variant the provider verified, substituted into the
    /// forwarded request
    pub resolved_model: String,
}

/// Selects the best available provider for a requested model.
pub struct Dispatcher {
    store: Arc<dyn ProviderStore>,
    scores: Arc<ScoreTracker>,
    cooldowns: Arc<CooldownMap>,
    prober: Prober,
    config: RoutingConfig,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn ProviderStore>,
        scores: Arc<ScoreTracker>,
        cooldowns: Arc<CooldownMap>,
        prober: Prober,
        config: RoutingConfig,
    ) -> Self {
        Self {
            store,
            scores,
            cooldowns,
            prober,
            config,
        }
    }

    /// Pick a provider for `requested_model`, skipping `excluded` ids.
    ///
    /// Returns `None` both when no provider ever supported the model and
    /// when every supporting provider is excluded or cooling down; the log
    /// distinguishes the two.
    pub async fn select(
        &self,
        requested_model: &str,
        excluded: &HashSet<String>,
    ) -> Result<Option<Selection>> {
        let providers = self.store.list_all().await?;
        let maps = build_alias_maps(providers.iter().map(|p| p.models.as_slice()));

        let Some(canonical) = maps.resolve(requested_model) else {
            warn!(model = requested_model, "no provider advertises this model");
            return Ok(None);
        };
        let Some(variants) = maps.variants_for(canonical) else {
            warn!(model = requested_model, "no provider advertises this model");
            return Ok(None);
        };

        let mut supporters = 0usize;
        let mut candidates: Vec<Selection> = Vec::new();
        let mut rng = rand::thread_rng();

        for provider in providers {
            let owned: Vec<&String> = provider
                .models
                .iter()
                .filter(|m| variants.contains(m.as_str()))
                .collect();
            if owned.is_empty() {
                continue;
            }
            supporters += 1;

            if !provider.status.is_routable() || excluded.contains(&provider.id) {
                continue;
            }

            // Random pick among the provider's matching variants so one
            // lexical ordering never monopolizes traffic.
            let resolved_model = owned.choose(&mut rng).map(|m| (*m).clone());
            if let Some(resolved_model) = resolved_model {
                candidates.push(Selection {
                    resolved_model,
                    provider,
                });
            }
        }
        drop(rng);

        if candidates.is_empty() {
            if supporters == 0 {
                warn!(model = requested_model, "no provider advertises this model");
            } else {
                warn!(
                    model = requested_model,
                    "all supporting providers are excluded or not routable"
                );
            }
            return Ok(None);
        }

        let mut available: Vec<(Selection, f64)> = Vec::new();
        for candidate in candidates {
            if self.is_available(&candidate).await {
                let score = self
                    .scores
                    .score(&candidate.provider.id, &candidate.resolved_model);
                available.push((candidate, score));
            }
        }

        let Some((best, score)) = available
            .into_iter()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        else {
            warn!(
                model = requested_model,
                "all supporting providers are cooling down"
            );
            return Ok(None);
        };

        info!(
            model = requested_model,
            provider = %best.provider.name,
            resolved = %best.resolved_model,
            score,
            "dispatching request"
        );
        Ok(Some(best))
    }

    /// Availability ladder for one candidate, in priority order:
    /// a fresh successful sync trumps any cooldown, a clear pair is
    /// available, an unexpired cooldown is not, and an expired cooldown gets
    /// a single live health probe to decide.
    async fn is_available(&self, candidate: &Selection) -> bool {
        let provider = &candidate.provider;
        let model = &candidate.resolved_model;

        if provider.synced_within(chrono::Duration::seconds(
            self.config.trust_window_secs as i64,
        )) {
            self.cooldowns.clear(&provider.id, model);
            return true;
        }

        match self.cooldowns.state(&provider.id, model) {
            CooldownState::Clear => true,
            CooldownState::Cooling => false,
            CooldownState::Expired => {
                debug!(provider = %provider.name, model = %model, "cooldown expired, probing");
                let outcome = self
                    .prober
                    .probe(&provider.base_url, &provider.api_key, model)
                    .await;
                self.scores
                    .record(&provider.id, model, outcome.ok, Some(outcome.latency_ms));
                if outcome.ok {
                    self.cooldowns.clear(&provider.id, model);
                    true
                } else {
                    self.cooldowns.penalize(&provider.id, model);
                    false
                }
            }
        }
    }

    /// Apply the standard cooldown penalty to a pair.
    pub fn penalize(&self, provider_id: &str, model: &str) -> u64 {
        self.cooldowns.penalize(provider_id, model)
    }
}
