//! Hermes AI Gateway
//!
//! One OpenAI-compatible endpoint in front of many providers.

use hermes_gateway::{Config, Gateway};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config/gateway.yaml";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> hermes_gateway::Result<()> {
    let config = if std::path::Path::new(DEFAULT_CONFIG_PATH).exists() {
        Config::from_file(DEFAULT_CONFIG_PATH).await?
    } else {
        Config::from_env()?
    };

    let gateway = Gateway::new(config).await?;
    gateway.run().await
}
