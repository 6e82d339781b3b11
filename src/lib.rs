//! # Hermes Gateway
//!
//! A unification AI gateway: one OpenAI-compatible endpoint in front of any
//! number of OpenAI-compatible providers, with verified model catalogs,
//! alias-based model identity, latency/success-aware routing, and automatic
//! failover.
//!
//! ## How routing works
//!
//! - Each registered provider is synced in the background: its advertised
//!   catalog is fetched, then every candidate model is verified with a real
//!   one-token completion. Only verified models are routable.
//! - A request's model name is resolved against the live catalogs through a
//!   normalization scheme, so `gpt-4o`, `openai/gpt-4o` and `GPT-4o-2024`
//!   land on the same identity.
//! - Among providers serving that identity, the dispatcher picks the best
//!   EWMA score (success rate + latency), skipping pairs in cooldown, and
//!   the orchestrator fails over on 429/5xx/network errors.
//!
//! ## Gateway mode
//!
//! ```rust,no_run
//! use hermes_gateway::{Config, Gateway};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config/gateway.yaml").await?;
//!     let gateway = Gateway::new(config).await?;
//!     gateway.run().await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod auth;
pub mod config;
pub mod core;
pub mod server;
pub mod utils;

pub use crate::config::Config;
pub use crate::utils::error::{GatewayError, Result};

pub use crate::core::models::{
    ChatCompletionRequest, ChatMessage, MessageContent, Provider, ProviderStatus,
};
pub use crate::core::orchestrator::Orchestrator;
pub use crate::core::registry::{MemoryProviderStore, ProviderRegistry, ProviderStore};

use tracing::info;

/// A Hermes gateway instance: configuration plus a wired HTTP server.
pub struct Gateway {
    server: server::HttpServer,
}

impl Gateway {
    /// Create a new gateway instance
    pub async fn new(config: Config) -> Result<Self> {
        info!("Creating new gateway instance");
        let server = server::HttpServer::new(&config).await?;
        Ok(Self { server })
    }

    /// Run the gateway server
    pub async fn run(self) -> Result<()> {
        info!("Starting Hermes Gateway");
        self.server.start().await?;
        Ok(())
    }
}

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name of the crate
pub const NAME: &str = env!("CARGO_PKG_NAME");
