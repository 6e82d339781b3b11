//! Provider registry
//!
//! The registry owns all read/write access to provider records. Persistence
//! sits behind the `ProviderStore` trait; the shipped implementation keeps
//! records in process. Every mutation is a partial update so concurrent
//! writers (sync engine vs. lifecycle operations) never clobber each other's
//! unrelated fields.

use crate::core::models::{Provider, ProviderStatus};
use crate::core::sync::SyncEngine;
use crate::utils::error::{GatewayError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;
use url::Url;

/// Persistence interface for provider records.
///
/// Partial updates are part of the contract: `update_status` must not touch
/// models or timestamps, `append_model` must not touch status.
#[async_trait]
pub trait ProviderStore: Send + Sync {
    /// All provider records
    async fn list_all(&self) -> Result<Vec<Provider>>;
    /// One record by id
    async fn get(&self, id: &str) -> Result<Option<Provider>>;
    /// Insert a new record
    async fn insert(&self, provider: Provider) -> Result<()>;
    /// Update the status field only
    async fn update_status(&self, id: &str, status: ProviderStatus) -> Result<()>;
    /// Update status, optionally replace the model set, optionally stamp the
    /// sync completion time
    async fn update_status_and_models(
        &self,
        id: &str,
        status: ProviderStatus,
        models: Option<Vec<String>>,
        last_synced_at: Option<DateTime<Utc>>,
    ) -> Result<()>;
    /// Append one verified model, keeping insertion order, ignoring dups
    async fn append_model(&self, id: &str, model: &str) -> Result<()>;
    /// Remove one model from the working set
    async fn remove_model(&self, id: &str, model: &str) -> Result<()>;
    /// Replace name / base URL / credential
    async fn update_connection(
        &self,
        id: &str,
        name: Option<String>,
        base_url: Option<String>,
        api_key: Option<String>,
    ) -> Result<()>;
    /// Stamp the last-used time
    async fn touch_last_used(&self, id: &str) -> Result<()>;
    /// Delete a record; true when something was removed
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// In-process provider store.
#[derive(Debug, Default)]
pub struct MemoryProviderStore {
    records: DashMap<String, Provider>,
}

impl MemoryProviderStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_record<F>(&self, id: &str, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Provider),
    {
        match self.records.get_mut(id) {
            Some(mut record) => {
                mutate(record.value_mut());
                Ok(())
            }
            None => Err(GatewayError::Store(format!("unknown provider: {}", id))),
        }
    }
}

#[async_trait]
impl ProviderStore for MemoryProviderStore {
    async fn list_all(&self) -> Result<Vec<Provider>> {
        let mut providers: Vec<Provider> =
            self.records.iter().map(|r| r.value().clone()).collect();
        providers.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(providers)
    }

    async fn get(&self, id: &str) -> Result<Option<Provider>> {
        Ok(self.records.get(id).map(|r| r.value().clone()))
    }

    async fn insert(&self, provider: Provider) -> Result<()> {
        self.records.insert(provider.id.clone(), provider);
        Ok(())
    }

    async fn update_status(&self, id: &str, status: ProviderStatus) -> Result<()> {
        self.with_record(id, |p| p.status = status)
    }

    async fn update_status_and_models(
        &self,
        id: &str,
        status: ProviderStatus,
        models: Option<Vec<String>>,
        last_synced_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.with_record(id, |p| {
            p.status = status;
            if let Some(models) = models {
                p.models = models;
            }
            if let Some(stamp) = last_synced_at {
                p.last_synced_at = Some(stamp);
            }
        })
    }

    async fn append_model(&self, id: &str, model: &str) -> Result<()> {
        self.with_record(id, |p| {
            if !p.models.iter().any(|m| m == model) {
                p.models.push(model.to_string());
            }
        })
    }

    async fn remove_model(&self, id: &str, model: &str) -> Result<()> {
        self.with_record(id, |p| p.models.retain(|m| m != model))
    }

    async fn update_connection(
        &self,
        id: &str,
        name: Option<String>,
        base_url: Option<String>,
        api_key: Option<String>,
    ) -> Result<()> {
        self.with_record(id, |p| {
            if let Some(name) = name {
                p.name = name;
            }
            if let Some(base_url) = base_url {
                p.base_url = base_url.trim_end_matches('/').to_string();
            }
            if let Some(api_key) = api_key {
                p.api_key = api_key;
            }
        })
    }

    async fn touch_last_used(&self, id: &str) -> Result<()> {
        self.with_record(id, |p| p.last_used_at = Some(Utc::now()))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.records.remove(id).is_some())
    }
}

/// Provider lifecycle operations.
///
/// Create, update, and resync all hand the provider to the sync engine; the
/// engine owns status/models/lastSyncedAt from that point on.
pub struct ProviderRegistry {
    store: Arc<dyn ProviderStore>,
    sync: Arc<SyncEngine>,
}

impl ProviderRegistry {
    pub fn new(store: Arc<dyn ProviderStore>, sync: Arc<SyncEngine>) -> Self {
        Self { store, sync }
    }

    /// Register a provider and kick off its first sync in the background.
    pub async fn create(
        &self,
        name: impl Into<String>,
        base_url: &str,
        api_key: impl Into<String>,
    ) -> Result<Provider> {
        Url::parse(base_url)
            .map_err(|e| GatewayError::Validation(format!("invalid base URL: {}", e)))?;

        let provider = Provider::new(name, base_url, api_key);
        self.store.insert(provider.clone()).await?;
        info!(provider = %provider.name, id = %provider.id, "provider registered");
        self.sync.spawn(provider.id.clone());
        Ok(provider)
    }

    /// Update connection details; any change forces a full re-sync from
    /// `pending`.
    pub async fn update(
        &self,
        id: &str,
        name: Option<String>,
        base_url: Option<String>,
        api_key: Option<String>,
    ) -> Result<Provider> {
        if let Some(base_url) = base_url.as_deref() {
            Url::parse(base_url)
                .map_err(|e| GatewayError::Validation(format!("invalid base URL: {}", e)))?;
        }
        self.store
            .update_connection(id, name, base_url, api_key)
            .await?;
        self.store.update_status(id, ProviderStatus::Pending).await?;
        self.sync.spawn(id.to_string());

        self.store
            .get(id)
            .await?
            .ok_or_else(|| GatewayError::Store(format!("unknown provider: {}", id)))
    }

    /// Remove a provider immediately and unconditionally.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.store.delete(id).await
    }

    /// Force a full re-sync of one provider.
    pub async fn resync(&self, id: &str) -> Result<()> {
        self.store.update_status(id, ProviderStatus::Pending).await?;
        self.sync.spawn(id.to_string());
        Ok(())
    }

    /// Current provider snapshot.
    pub async fn list(&self) -> Result<Vec<Provider>> {
        self.store.list_all().await
    }

    /// One provider by id.
    pub async fn get(&self, id: &str) -> Result<Option<Provider>> {
        self.store.get(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn partial_updates_do_not_clobber_unrelated_fields() {
        let store = MemoryProviderStore::new();
        let provider = Provider::new("mock", "http://up.example", "sk-1");
        let id = provider.id.clone();
        store.insert(provider).await.unwrap();

        store.append_model(&id, "gpt-4").await.unwrap();
        store.append_model(&id, "gpt-4").await.unwrap();
        store.append_model(&id, "claude-3").await.unwrap();
        store
            .update_status(&id, ProviderStatus::Syncing)
            .await
            .unwrap();

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.models, vec!["gpt-4", "claude-3"]);
        assert_eq!(record.status, ProviderStatus::Syncing);
        assert_eq!(record.api_key, "sk-1");
    }

    #[tokio::test]
    async fn status_and_models_update_can_stamp_sync_time() {
        let store = MemoryProviderStore::new();
        let provider = Provider::new("mock", "http://up.example", "sk-1");
        let id = provider.id.clone();
        store.insert(provider).await.unwrap();

        let stamp = Utc::now();
        store
            .update_status_and_models(&id, ProviderStatus::Active, None, Some(stamp))
            .await
            .unwrap();

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.status, ProviderStatus::Active);
        assert_eq!(record.last_synced_at, Some(stamp));
    }

    #[tokio::test]
    async fn delete_reports_whether_a_record_existed() {
        let store = MemoryProviderStore::new();
        let provider = Provider::new("mock", "http://up.example", "sk-1");
        let id = provider.id.clone();
        store.insert(provider).await.unwrap();

        assert!(store.delete(&id).await.unwrap());
        assert!(!store.delete(&id).await.unwrap());
    }

    #[tokio::test]
    async fn remove_model_shrinks_working_set() {
        let store = MemoryProviderStore::new();
        let provider = Provider::new("mock", "http://up.example", "sk-1");
        let id = provider.id.clone();
        store.insert(provider).await.unwrap();
        store.append_model(&id, "gpt-4").await.unwrap();
        store.append_model(&id, "claude-3").await.unwrap();

        store.remove_model(&id, "gpt-4").await.unwrap();
        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.models, vec!["claude-3"]);
    }
}
