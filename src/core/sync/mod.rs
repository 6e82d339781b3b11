//! Provider sync engine
//!
//! Background pipeline that discovers and verifies a provider's working
//! model set: fetch the advertised catalog, then probe each candidate with a
//! real one-token completion, persisting each pass immediately so consumers
//! see the list grow mid-sync.
//!
//! One provider syncs strictly sequentially (re-entrant triggers serialize on
//! a per-provider lock); different providers sync concurrently. Probes are
//! deliberately throttled: concurrent probing trips upstream rate limits and
//! corrupts the verification signal.

pub mod probe;

pub use probe::{ProbeOutcome, Prober};

use crate::config::SyncConfig;
use crate::core::models::openai::UpstreamModelList;
use crate::core::models::ProviderStatus;
use crate::core::registry::ProviderStore;
use crate::core::router::cooldown::CooldownMap;
use crate::core::router::score::ScoreTracker;
use crate::utils::error::{GatewayError, Result};
use crate::utils::logging::{LogSink, SyncEvent, SyncResult};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

/// Discovers and verifies provider model catalogs in the background.
pub struct SyncEngine {
    store: Arc<dyn ProviderStore>,
    prober: Prober,
    client: reqwest::Client,
    cooldowns: Arc<CooldownMap>,
    scores: Arc<ScoreTracker>,
    sink: Arc<dyn LogSink>,
    config: SyncConfig,
    /// Per-provider run locks; guarantee one active sync per provider
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn ProviderStore>,
        prober: Prober,
        client: reqwest::Client,
        cooldowns: Arc<CooldownMap>,
        scores: Arc<ScoreTracker>,
        sink: Arc<dyn LogSink>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            prober,
            client,
            cooldowns,
            scores,
            sink,
            config,
            locks: DashMap::new(),
        }
    }

    /// Kick off a background sync for one provider.
    ///
    /// Returns immediately. The spawned task is supervised: run errors and
    /// panics both land in the log sink instead of vanishing.
    pub fn spawn(self: &Arc<Self>, provider_id: String) {
        let engine = Arc::clone(self);
        let sink = Arc::clone(&self.sink);
        let id = provider_id.clone();

        let handle = tokio::spawn(async move { engine.run(&provider_id).await });
        tokio::spawn(async move {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(provider_id = %id, error = %e, "provider sync failed");
                    sink.sync_event(SyncEvent {
                        provider_id: id.clone(),
                        provider_name: String::new(),
                        model: "*".to_string(),
                        result: SyncResult::Failure,
                        message: e.to_string(),
                    });
                }
                Err(join_error) => {
                    error!(provider_id = %id, error = %join_error, "provider sync task aborted");
                    sink.sync_event(SyncEvent {
                        provider_id: id.clone(),
                        provider_name: String::new(),
                        model: "*".to_string(),
                        result: SyncResult::Failure,
                        message: format!("sync task aborted: {}", join_error),
                    });
                }
            }
        });
    }

    /// Run one full sync for a provider. Serialized per provider id.
    pub async fn run(&self, provider_id: &str) -> Result<()> {
        let lock = self
            .locks
            .entry(provider_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let Some(provider) = self.store.get(provider_id).await? else {
            // Deleted while the task was queued.
            return Ok(());
        };

        info!(provider = %provider.name, "starting model sync");
        self.store
            .update_status_and_models(provider_id, ProviderStatus::Syncing, Some(Vec::new()), None)
            .await?;

        let catalog = match self.fetch_catalog(&provider.base_url, &provider.api_key).await {
            Ok(catalog) => catalog,
            Err(e) => {
                self.store
                    .update_status(provider_id, ProviderStatus::Error)
                    .await?;
                self.sink.sync_event(SyncEvent {
                    provider_id: provider.id.clone(),
                    provider_name: provider.name.clone(),
                    model: "*".to_string(),
                    result: SyncResult::Failure,
                    message: format!("catalog fetch failed: {}", e),
                });
                return Err(e);
            }
        };

        let candidates = self.filter_candidates(catalog);
        info!(
            provider = %provider.name,
            candidates = candidates.len(),
            "catalog fetched, verifying models"
        );

        for model in candidates {
            tokio::time::sleep(Duration::from_millis(self.config.probe_delay_ms)).await;

            let outcome = self
                .prober
                .probe(&provider.base_url, &provider.api_key, &model)
                .await;
            self.scores
                .record(&provider.id, &model, outcome.ok, Some(outcome.latency_ms));

            if outcome.ok {
                self.store.append_model(provider_id, &model).await?;
                self.cooldowns.clear(&provider.id, &model);
                self.sink.sync_event(SyncEvent {
                    provider_id: provider.id.clone(),
                    provider_name: provider.name.clone(),
                    model,
                    result: SyncResult::Success,
                    message: outcome.detail,
                });
            } else {
                self.sink.sync_event(SyncEvent {
                    provider_id: provider.id.clone(),
                    provider_name: provider.name.clone(),
                    model,
                    result: SyncResult::Failure,
                    message: outcome.detail,
                });
            }
        }

        self.store
            .update_status_and_models(provider_id, ProviderStatus::Active, None, Some(Utc::now()))
            .await?;
        info!(provider = %provider.name, "model sync complete");
        Ok(())
    }

    /// React to an upstream "model not found" signal: drop the single model
    /// immediately, then re-run a full sync rather than patching in place.
    /// A stale catalog rarely has exactly one stale entry.
    pub async fn invalidate_model(self: &Arc<Self>, provider_id: &str, model: &str) -> Result<()> {
        warn!(provider_id, model, "upstream no longer serves model, resyncing");
        self.store.remove_model(provider_id, model).await?;
        self.spawn(provider_id.to_string());
        Ok(())
    }

    /// Periodic full resync of every provider.
    ///
    /// The interval arrives over a watch channel; changing the setting
    /// re-arms the timer without a restart. Zero disables the timer.
    pub fn spawn_periodic(self: Arc<Self>, mut interval_rx: watch::Receiver<Duration>) {
        tokio::spawn(async move {
            loop {
                let interval = *interval_rx.borrow();
                if interval.is_zero() {
                    if interval_rx.changed().await.is_err() {
                        break;
                    }
                    continue;
                }
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        self.resync_all().await;
                    }
                    changed = interval_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        // Re-arm with the new interval.
                    }
                }
            }
        });
    }

    async fn resync_all(self: &Arc<Self>) {
        match self.store.list_all().await {
            Ok(providers) => {
                info!(count = providers.len(), "periodic resync");
                for provider in providers {
                    self.spawn(provider.id);
                }
            }
            Err(e) => error!(error = %e, "periodic resync could not list providers"),
        }
    }

    async fn fetch_catalog(&self, base_url: &str, api_key: &str) -> Result<Vec<String>> {
        let url = format!("{}/models", base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(api_key)
            .timeout(Duration::from_secs(self.config.probe_timeout_secs))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::Internal(format!(
                "upstream catalog responded with {}",
                response.status()
            )));
        }

        let list: UpstreamModelList = response.json().await?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }

    fn filter_candidates(&self, catalog: Vec<String>) -> Vec<String> {
        if self.config.name_filters.is_empty() {
            return catalog;
        }
        catalog
            .into_iter()
            .filter(|id| {
                let lowered = id.to_lowercase();
                self.config
                    .name_filters
                    .iter()
                    .any(|f| lowered.contains(&f.to_lowercase()))
            })
            .collect()
    }
}
