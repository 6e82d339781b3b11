//! HTTP server core
//!
//! Wires every service together into an `AppState`, mounts the routes, and
//! runs the actix server.

use crate::auth::AuthGate;
use crate::config::{Config, ServerConfig};
use crate::core::orchestrator::Orchestrator;
use crate::core::proxy::{Classifier, Forwarder};
use crate::core::registry::{MemoryProviderStore, ProviderRegistry, ProviderStore};
use crate::core::router::{CooldownMap, Dispatcher, ScoreTracker};
use crate::core::sync::{Prober, SyncEngine};
use crate::server::routes;
use crate::server::state::AppState;
use crate::utils::error::Result;
use crate::utils::logging::{LogSink, TracingLogSink};
use actix_cors::Cors;
use actix_web::{web, App, HttpServer as ActixHttpServer};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;

/// Build the full service graph from a configuration.
///
/// Also registers seeded providers (each kicks off its first background
/// sync) and arms the periodic resync timer.
pub async fn build_state(config: Config) -> Result<AppState> {
    let client = reqwest::Client::builder().build()?;

    let sink = Arc::new(TracingLogSink::new());
    let sink_dyn: Arc<dyn LogSink> = sink.clone();
    let store: Arc<dyn ProviderStore> = Arc::new(MemoryProviderStore::new());

    let scores = Arc::new(ScoreTracker::new(config.routing.score.clone()));
    let cooldowns = Arc::new(CooldownMap::new(config.routing.cooldown.clone()));
    let prober = Prober::new(
        client.clone(),
        Duration::from_secs(config.sync.probe_timeout_secs),
        config.classifier.alt_protocol_hints.clone(),
    );

    let sync = Arc::new(SyncEngine::new(
        Arc::clone(&store),
        prober.clone(),
        client.clone(),
        Arc::clone(&cooldowns),
        Arc::clone(&scores),
        Arc::clone(&sink_dyn),
        config.sync.clone(),
    ));

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&store),
        Arc::clone(&scores),
        Arc::clone(&cooldowns),
        prober,
        config.routing.clone(),
    ));
    let forwarder = Arc::new(Forwarder::new(
        client,
        Classifier::new(&config.classifier),
        Arc::clone(&store),
        scores,
        cooldowns,
        Arc::clone(&sync),
        Arc::clone(&sink_dyn),
    ));
    let orchestrator = Arc::new(Orchestrator::new(
        dispatcher,
        forwarder,
        sink_dyn,
        config.routing.max_attempts,
    ));

    let registry = Arc::new(ProviderRegistry::new(Arc::clone(&store), Arc::clone(&sync)));
    let auth = Arc::new(AuthGate::new(&config.auth));
    if !auth.enabled() {
        warn!("no master key configured, client authentication is disabled");
    }

    for seed in &config.providers {
        if let Err(e) = registry
            .create(seed.name.clone(), &seed.base_url, seed.api_key.clone())
            .await
        {
            warn!(provider = %seed.name, error = %e, "seeded provider rejected");
        }
    }

    let (interval_tx, interval_rx) =
        watch::channel(Duration::from_secs(config.sync.interval_secs));
    Arc::clone(&sync).spawn_periodic(interval_rx);

    Ok(AppState {
        config: Arc::new(config),
        auth,
        store,
        registry,
        orchestrator,
        sink,
        resync_interval: Arc::new(interval_tx),
    })
}

/// HTTP server
pub struct HttpServer {
    config: ServerConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with a fully wired service graph.
    pub async fn new(config: &Config) -> Result<Self> {
        info!("Creating HTTP server");
        let server_config = config.server.clone();
        let state = build_state(config.clone()).await?;
        Ok(Self {
            config: server_config,
            state,
        })
    }

    /// Create the actix application.
    pub fn create_app(
        state: web::Data<AppState>,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new()
            .app_data(state)
            .wrap(Cors::permissive())
            .wrap(TracingLogger::default())
            .configure(routes::configure)
    }

    /// Start the HTTP server and run it to completion.
    pub async fn start(self) -> Result<()> {
        let bind_addr = format!("{}:{}", self.config.host, self.config.port);
        info!("Starting HTTP server on {}", bind_addr);

        let state = web::Data::new(self.state);
        let server = ActixHttpServer::new(move || Self::create_app(state.clone()))
            .bind(&bind_addr)?
            .run();

        info!("HTTP server listening on {}", bind_addr);
        server.await?;

        info!("HTTP server stopped");
        Ok(())
    }

    /// Get application state
    pub fn state(&self) -> &AppState {
        &self.state
    }
}
