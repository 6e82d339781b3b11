//! Configuration management for the gateway
//!
//! Configuration is loaded from a YAML file (`config/gateway.yaml` by
//! default), every field has a serde default, and a handful of deployment
//! knobs can be overridden from `HERMES_*` environment variables.

use crate::utils::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Main configuration struct for the gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Gateway credential settings
    #[serde(default)]
    pub auth: AuthConfig,
    /// Dispatcher / retry / scoring knobs
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Provider sync engine knobs
    #[serde(default)]
    pub sync: SyncConfig,
    /// Upstream error classification heuristics
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// Providers registered at startup
    #[serde(default)]
    pub providers: Vec<ProviderSeed>,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Gateway credential settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared secret clients present as `Authorization: Bearer <key>`
    #[serde(default)]
    pub master_key: String,
}

/// Dispatcher / retry / scoring knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Maximum providers tried per client request
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// A sync completed within this window overrides cooldown state
    #[serde(default = "default_trust_window_secs")]
    pub trust_window_secs: u64,
    #[serde(default)]
    pub cooldown: CooldownConfig,
    #[serde(default)]
    pub score: ScoreConfig,
}

/// Exponential cooldown parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooldownConfig {
    /// First penalty applied to a failing (provider, model) pair
    #[serde(default = "default_cooldown_initial_ms")]
    pub initial_ms: u64,
    /// Backoff doubling cap
    #[serde(default = "default_cooldown_max_ms")]
    pub max_ms: u64,
    /// Multiplier applied to the initial penalty for quota exhaustion
    #[serde(default = "default_quota_multiplier")]
    pub quota_multiplier: u64,
}

/// EWMA scoring parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreConfig {
    /// EWMA smoothing factor
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Neutral success prior for unseen pairs
    #[serde(default = "default_success_prior")]
    pub success_prior: f64,
    /// Neutral latency prior for unseen pairs
    #[serde(default = "default_latency_prior_ms")]
    pub latency_prior_ms: f64,
    /// Weight of the success component
    #[serde(default = "default_success_weight")]
    pub success_weight: f64,
    /// Weight of the latency component
    #[serde(default = "default_latency_weight")]
    pub latency_weight: f64,
    /// Latency at which the latency component halves
    #[serde(default = "default_latency_knee_ms")]
    pub latency_knee_ms: f64,
    /// Upper bound of the uniform tie-breaking jitter
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

/// Provider sync engine knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Timeout for catalog fetches and probes
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    /// Delay between consecutive probes of one provider. Serial and
    /// deliberately slow: many upstreams enforce very low rate limits and a
    /// burst of probes would poison the verification signal.
    #[serde(default = "default_probe_delay_ms")]
    pub probe_delay_ms: u64,
    /// Periodic full-resync interval, 0 disables the timer
    #[serde(default)]
    pub interval_secs: u64,
    /// Catalog pre-filter substrings; empty keeps every advertised model
    #[serde(default)]
    pub name_filters: Vec<String>,
}

/// Upstream error classification heuristics
///
/// Provider-specific and heuristic by nature; the lists are configuration so
/// deployments can extend them without a rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Status codes that signal exhausted quota/credit
    #[serde(default = "default_quota_statuses")]
    pub quota_statuses: Vec<u16>,
    /// Body substrings that signal exhausted quota/credit
    #[serde(default = "default_quota_hints")]
    pub quota_hints: Vec<String>,
    /// Body substrings that signal a model unknown to the upstream
    #[serde(default = "default_missing_model_hints")]
    pub missing_model_hints: Vec<String>,
    /// Body substrings that signal the upstream expects the legacy
    /// text-completion schema
    #[serde(default = "default_alt_protocol_hints")]
    pub alt_protocol_hints: Vec<String>,
}

/// A provider registered at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSeed {
    pub name: String,
    pub base_url: String,
    pub api_key: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_max_attempts() -> u32 {
    3
}
fn default_trust_window_secs() -> u64 {
    300
}
fn default_cooldown_initial_ms() -> u64 {
    30_000
}
fn default_cooldown_max_ms() -> u64 {
    600_000
}
fn default_quota_multiplier() -> u64 {
    8
}
fn default_alpha() -> f64 {
    0.2
}
fn default_success_prior() -> f64 {
    0.7
}
fn default_latency_prior_ms() -> f64 {
    1000.0
}
fn default_success_weight() -> f64 {
    0.7
}
fn default_latency_weight() -> f64 {
    0.3
}
fn default_latency_knee_ms() -> f64 {
    800.0
}
fn default_jitter() -> f64 {
    0.01
}
fn default_probe_timeout_secs() -> u64 {
    5
}
fn default_probe_delay_ms() -> u64 {
    5_000
}
fn default_quota_statuses() -> Vec<u16> {
    vec![402]
}
fn default_quota_hints() -> Vec<String> {
    ["insufficient_quota", "quota", "credit", "balance", "billing"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_missing_model_hints() -> Vec<String> {
    ["model_not_found", "does not exist", "unknown model", "no such model"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_alt_protocol_hints() -> Vec<String> {
    ["\"prompt\"", "not a chat model", "completions endpoint"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            master_key: String::new(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            trust_window_secs: default_trust_window_secs(),
            cooldown: CooldownConfig::default(),
            score: ScoreConfig::default(),
        }
    }
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            initial_ms: default_cooldown_initial_ms(),
            max_ms: default_cooldown_max_ms(),
            quota_multiplier: default_quota_multiplier(),
        }
    }
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            success_prior: default_success_prior(),
            latency_prior_ms: default_latency_prior_ms(),
            success_weight: default_success_weight(),
            latency_weight: default_latency_weight(),
            latency_knee_ms: default_latency_knee_ms(),
            jitter: default_jitter(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: default_probe_timeout_secs(),
            probe_delay_ms: default_probe_delay_ms(),
            interval_secs: 0,
            name_filters: Vec::new(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            quota_statuses: default_quota_statuses(),
            quota_hints: default_quota_hints(),
            missing_model_hints: default_missing_model_hints(),
            alt_protocol_hints: default_alt_protocol_hints(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file and apply environment overrides.
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {:?}", path);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GatewayError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .map_err(|e| GatewayError::Config(format!("Failed to parse config: {}", e)))?;

        config.apply_env();
        config.validate()?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Defaults plus environment overrides, used when no file is present.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("HERMES_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("HERMES_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(key) = std::env::var("HERMES_MASTER_KEY") {
            self.auth.master_key = key;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(GatewayError::Config("server.port must be non-zero".into()));
        }
        if self.routing.max_attempts == 0 {
            return Err(GatewayError::Config(
                "routing.max_attempts must be at least 1".into(),
            ));
        }
        if self.routing.cooldown.initial_ms == 0
            || self.routing.cooldown.max_ms < self.routing.cooldown.initial_ms
        {
            return Err(GatewayError::Config(
                "routing.cooldown must satisfy 0 < initial_ms <= max_ms".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.routing.score.alpha) {
            return Err(GatewayError::Config(
                "routing.score.alpha must be within [0, 1]".into(),
            ));
        }
        Ok(())
    }
}
