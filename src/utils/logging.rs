//! Structured event sink and usage counters
//!
//! The routing core emits append-only sync/request events and bumps a small
//! set of counters; everything goes through the `LogSink` trait so tests can
//! inject their own sink and the shipped implementation stays swappable for
//! an external store.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

/// Outcome of a single sync-time model probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncResult {
    Success,
    Failure,
}

/// One append-only sync log record.
#[derive(Debug, Clone)]
pub struct SyncEvent {
    pub provider_id: String,
    pub provider_name: String,
    pub model: String,
    pub result: SyncResult,
    pub message: String,
}

/// One append-only request log record.
#[derive(Debug, Clone)]
pub struct RequestLogEntry {
    pub method: String,
    pub path: String,
    pub model: Option<String>,
    pub status: u16,
    pub duration_ms: u64,
    pub ip: Option<String>,
}

/// Counters the routing core maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayCounter {
    /// Non-2xx or network failure from an upstream
    UpstreamError,
    /// A cooldown entry was created or extended
    CooldownApplied,
    /// A client request exhausted every retry attempt
    RetriesExhausted,
}

/// Sink for structured events and aggregate usage.
///
/// Implementations must be cheap and non-blocking; they are called on the
/// request path.
pub trait LogSink: Send + Sync {
    /// Record a sync probe outcome
    fn sync_event(&self, event: SyncEvent);
    /// Record a served client request
    fn log_request(&self, entry: RequestLogEntry);
    /// Bump an event counter
    fn bump(&self, counter: GatewayCounter);
    /// Record one successful forward, keyed by model and provider
    fn record_usage(&self, model: &str, provider_name: &str);
}

/// Default sink: tracing output plus in-process aggregates.
#[derive(Debug, Default)]
pub struct TracingLogSink {
    upstream_errors: AtomicU64,
    cooldowns_applied: AtomicU64,
    retries_exhausted: AtomicU64,
    usage_by_model: DashMap<String, u64>,
    usage_by_provider: DashMap<String, u64>,
}

impl TracingLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, counter: GatewayCounter) -> u64 {
        match counter {
            GatewayCounter::UpstreamError => self.upstream_errors.load(Ordering::Relaxed),
            GatewayCounter::CooldownApplied => self.cooldowns_applied.load(Ordering::Relaxed),
            GatewayCounter::RetriesExhausted => self.retries_exhausted.load(Ordering::Relaxed),
        }
    }

    pub fn usage_for_model(&self, model: &str) -> u64 {
        self.usage_by_model.get(model).map(|v| *v).unwrap_or(0)
    }

    pub fn usage_for_provider(&self, provider_name: &str) -> u64 {
        self.usage_by_provider
            .get(provider_name)
            .map(|v| *v)
            .unwrap_or(0)
    }
}

impl LogSink for TracingLogSink {
    fn sync_event(&self, event: SyncEvent) {
        match event.result {
            SyncResult::Success => info!(
                provider = %event.provider_name,
                model = %event.model,
                "sync probe passed"
            ),
            SyncResult::Failure => warn!(
                provider = %event.provider_name,
                model = %event.model,
                message = %event.message,
                "sync probe failed"
            ),
        }
    }

    fn log_request(&self, entry: RequestLogEntry) {
        info!(
            method = %entry.method,
            path = %entry.path,
            model = entry.model.as_deref().unwrap_or("-"),
            status = entry.status,
            duration_ms = entry.duration_ms,
            ip = entry.ip.as_deref().unwrap_or("-"),
            "request served"
        );
    }

    fn bump(&self, counter: GatewayCounter) {
        let cell = match counter {
            GatewayCounter::UpstreamError => &self.upstream_errors,
            GatewayCounter::CooldownApplied => &self.cooldowns_applied,
            GatewayCounter::RetriesExhausted => &self.retries_exhausted,
        };
        cell.fetch_add(1, Ordering::Relaxed);
    }

    fn record_usage(&self, model: &str, provider_name: &str) {
        *self.usage_by_model.entry(model.to_string()).or_insert(0) += 1;
        *self
            .usage_by_provider
            .entry(provider_name.to_string())
            .or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let sink = TracingLogSink::new();
        sink.bump(GatewayCounter::UpstreamError);
        sink.bump(GatewayCounter::UpstreamError);
        sink.bump(GatewayCounter::CooldownApplied);

        assert_eq!(sink.counter(GatewayCounter::UpstreamError), 2);
        assert_eq!(sink.counter(GatewayCounter::CooldownApplied), 1);
        assert_eq!(sink.counter(GatewayCounter::RetriesExhausted), 0);
    }

    #[test]
    fn usage_aggregates_by_model_and_provider() {
        let sink = TracingLogSink::new();
        sink.record_usage("gpt-4", "primary");
        sink.record_usage("gpt-4", "secondary");
        sink.record_usage("claude-3", "primary");

        assert_eq!(sink.usage_for_model("gpt-4"), 2);
        assert_eq!(sink.usage_for_provider("primary"), 2);
        assert_eq!(sink.usage_for_provider("secondary"), 1);
    }
}
