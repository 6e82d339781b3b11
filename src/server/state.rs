//! Application state shared across HTTP handlers

use crate::auth::AuthGate;
use crate::config::Config;
use crate::core::orchestrator::Orchestrator;
use crate::core::registry::{ProviderRegistry, ProviderStore};
use crate::utils::logging::TracingLogSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// HTTP server state shared across handlers.
///
/// Everything is behind an `Arc` so worker threads share one instance of
/// each service.
#[derive(Clone)]
pub struct AppState {
    /// Gateway configuration (shared read-only)
    pub config: Arc<Config>,
    /// Gateway credential gate
    pub auth: Arc<AuthGate>,
    /// Provider record access
    pub store: Arc<dyn ProviderStore>,
    /// Provider lifecycle operations
    pub registry: Arc<ProviderRegistry>,
    /// Retry loop behind the chat endpoint
    pub orchestrator: Arc<Orchestrator>,
    /// Event sink and in-process counters
    pub sink: Arc<TracingLogSink>,
    /// Periodic resync interval; sending re-arms the background timer,
    /// dropping the last sender stops it
    pub resync_interval: Arc<watch::Sender<Duration>>,
}
