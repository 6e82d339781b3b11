//! Provider records and their lifecycle state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sync lifecycle of a provider.
///
/// `pending` -> `syncing` -> `active`, or `error` when the catalog fetch
/// fails. Any credential/URL update or manual resync returns the provider to
/// `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    Pending,
    Syncing,
    Active,
    Error,
}

impl ProviderStatus {
    /// Whether the provider may serve traffic. A `syncing` provider is
    /// routable: its model list grows as probes pass.
    pub fn is_routable(self) -> bool {
        matches!(self, ProviderStatus::Active | ProviderStatus::Syncing)
    }
}

/// A registered upstream provider.
///
/// `models` is the verified-working set as of the last sync; it is updated
/// incrementally while a sync runs, so consumers may observe a growing list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    /// Opaque unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Upstream API base URL, no trailing slash
    pub base_url: String,
    /// Credential used against this upstream
    pub api_key: String,
    /// Verified-working model identifiers, insertion ordered
    #[serde(default)]
    pub models: Vec<String>,
    /// Sync lifecycle state
    pub status: ProviderStatus,
    /// Completion time of the last full sync
    #[serde(default)]
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Last time a request was forwarded through this provider
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Provider {
    /// Create a fresh `pending` provider with an empty model set.
    pub fn new(name: impl Into<String>, base_url: &str, api_key: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            models: Vec::new(),
            status: ProviderStatus::Pending,
            last_synced_at: None,
            last_used_at: None,
            created_at: Utc::now(),
        }
    }

    /// Whether the last completed sync is recent enough to trust over any
    /// cooldown entry.
    pub fn synced_within(&self, window: chrono::Duration) -> bool {
        self.last_synced_at
            .map(|t| Utc::now() - t < window)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_provider_is_pending_with_trimmed_url() {
        let provider = Provider::new("mock", "https://api.example.com/v1/", "sk-test");
        assert_eq!(provider.base_url, "https://api.example.com/v1");
        assert_eq!(provider.status, ProviderStatus::Pending);
        assert!(provider.models.is_empty());
        assert!(provider.last_synced_at.is_none());
    }

    #[test]
    fn routable_statuses() {
        assert!(ProviderStatus::Active.is_routable());
        assert!(ProviderStatus::Syncing.is_routable());
        assert!(!ProviderStatus::Pending.is_routable());
        assert!(!ProviderStatus::Error.is_routable());
    }

    #[test]
    fn trust_window_requires_a_completed_sync() {
        let mut provider = Provider::new("mock", "http://x", "k");
        assert!(!provider.synced_within(chrono::Duration::minutes(5)));

        provider.last_synced_at = Some(Utc::now());
        assert!(provider.synced_within(chrono::Duration::minutes(5)));

        provider.last_synced_at = Some(Utc::now() - chrono::Duration::minutes(10));
        assert!(!provider.synced_within(chrono::Duration::minutes(5)));
    }
}
