//! Self-healing cooldowns for failing (provider, model) pairs
//!
//! A forwarding failure excludes the pair for a backoff window that doubles
//! on repeated failure up to a cap. Success (forward, health probe, or a
//! trusted recent sync) removes the entry.

use crate::config::CooldownConfig;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// One active cooldown.
#[derive(Debug, Clone)]
pub struct CooldownEntry {
    /// Pair is excluded from selection until this time
    pub until: DateTime<Utc>,
    /// Backoff applied by the most recent penalty
    pub backoff_ms: u64,
}

/// Current standing of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownState {
    /// No entry: freely selectable
    Clear,
    /// Entry exists and has not expired
    Cooling,
    /// Entry exists but the window has passed; a health probe decides
    Expired,
}

/// Shared cooldown map.
#[derive(Debug)]
pub struct CooldownMap {
    entries: DashMap<(String, String), CooldownEntry>,
    config: CooldownConfig,
}

impl CooldownMap {
    pub fn new(config: CooldownConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    /// Penalize a pair after a forwarding failure. Doubles an existing
    /// backoff (capped), or seeds at the initial penalty. Returns the
    /// applied backoff.
    ///
    /// The whole read-modify-write runs inside one entry operation; no await
    /// may be introduced between reading the old backoff and storing the new
    /// one.
    pub fn penalize(&self, provider_id: &str, model: &str) -> u64 {
        self.penalize_with_floor(provider_id, model, self.config.initial_ms)
    }

    /// Penalize with an extended floor, used for quota exhaustion where the
    /// condition is expected to persist.
    pub fn penalize_extended(&self, provider_id: &str, model: &str) -> u64 {
        let floor = self
            .config
            .initial_ms
            .saturating_mul(self.config.quota_multiplier)
            .min(self.config.max_ms);
        self.penalize_with_floor(provider_id, model, floor)
    }

    fn penalize_with_floor(&self, provider_id: &str, model: &str, floor_ms: u64) -> u64 {
        let key = (provider_id.to_string(), model.to_string());
        let backoff = match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                let doubled = entry.backoff_ms.saturating_mul(2).min(self.config.max_ms);
                entry.backoff_ms = doubled.max(floor_ms).min(self.config.max_ms);
                entry.until = Utc::now() + Duration::milliseconds(entry.backoff_ms as i64);
                entry.backoff_ms
            }
            Entry::Vacant(vacant) => {
                let backoff = floor_ms.min(self.config.max_ms);
                vacant.insert(CooldownEntry {
                    until: Utc::now() + Duration::milliseconds(backoff as i64),
                    backoff_ms: backoff,
                });
                backoff
            }
        };
        backoff
    }

    /// Remove the entry for a pair.
    pub fn clear(&self, provider_id: &str, model: &str) {
        self.entries
            .remove(&(provider_id.to_string(), model.to_string()));
    }

    /// Current standing of a pair.
    pub fn state(&self, provider_id: &str, model: &str) -> CooldownState {
        match self
            .entries
            .get(&(provider_id.to_string(), model.to_string()))
        {
            None => CooldownState::Clear,
            Some(entry) if entry.until > Utc::now() => CooldownState::Cooling,
            Some(_) => CooldownState::Expired,
        }
    }

    /// Current entry for a pair, if one exists.
    pub fn entry(&self, provider_id: &str, model: &str) -> Option<CooldownEntry> {
        self.entries
            .get(&(provider_id.to_string(), model.to_string()))
            .map(|e| e.clone())
    }
}
