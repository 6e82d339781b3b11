//! Sync engine tests against mock upstream providers.

use hermes_gateway::config::{CooldownConfig, ScoreConfig, SyncConfig};
use hermes_gateway::core::models::{Provider, ProviderStatus};
use hermes_gateway::core::registry::{MemoryProviderStore, ProviderRegistry, ProviderStore};
use hermes_gateway::core::router::{CooldownMap, ScoreTracker};
use hermes_gateway::core::sync::{Prober, SyncEngine};
use hermes_gateway::utils::logging::{LogSink, TracingLogSink};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    store: Arc<dyn ProviderStore>,
    engine: Arc<SyncEngine>,
}

fn harness(sync: SyncConfig, alt_protocol_hints: Vec<String>) -> Harness {
    let client = reqwest::Client::new();
    let sink: Arc<dyn LogSink> = Arc::new(TracingLogSink::new());
    let store: Arc<dyn ProviderStore> = Arc::new(MemoryProviderStore::new());
    let prober = Prober::new(client.clone(), Duration::from_secs(2), alt_protocol_hints);

    let engine = Arc::new(SyncEngine::new(
        Arc::clone(&store),
        prober,
        client,
        Arc::new(CooldownMap::new(CooldownConfig::default())),
        Arc::new(ScoreTracker::new(ScoreConfig::default())),
        sink,
        sync,
    ));

    Harness { store, engine }
}

fn fast_sync() -> SyncConfig {
    SyncConfig {
        probe_timeout_secs: 2,
        probe_delay_ms: 0,
        ..SyncConfig::default()
    }
}

async fn add_provider(store: &Arc<dyn ProviderStore>, base_url: &str) -> String {
    let provider = Provider::new("mock", base_url, "sk-upstream");
    let id = provider.id.clone();
    store.insert(provider).await.unwrap();
    id
}

async fn add_active_provider(
    store: &Arc<dyn ProviderStore>,
    base_url: &str,
    models: &[&str],
) -> String {
    let mut provider = Provider::new("mock", base_url, "sk-upstream");
    provider.status = ProviderStatus::Active;
    provider.models = models.iter().map(|m| m.to_string()).collect();
    let id = provider.id.clone();
    store.insert(provider).await.unwrap();
    id
}

/// Poll until a background sync has settled the provider on `models`.
async fn wait_for_working_set(store: &Arc<dyn ProviderStore>, id: &str, models: &[&str]) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let record = store.get(id).await.unwrap().unwrap();
        if record.status == ProviderStatus::Active
            && record.models == models
            && record.last_synced_at.is_some()
        {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "sync did not converge, state: {:?}",
            record
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

async fn mount_catalog(server: &MockServer, models: &[&str]) {
    let data: Vec<_> = models.iter().map(|id| json!({"id": id})).collect();
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": data})))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "ok"})))
        .mount(server)
        .await;
}

#[tokio::test]
async fn sync_keeps_only_models_that_answer_probes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "gpt-4"}, {"id": "broken-model"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "gpt-4"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "chatcmpl-1"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"error": "model_not_found"})),
        )
        .mount(&server)
        .await;

    let h = harness(fast_sync(), Vec::new());
    let id = add_provider(&h.store, &server.uri()).await;

    h.engine.run(&id).await.unwrap();

    let record = h.store.get(&id).await.unwrap().unwrap();
    assert_eq!(record.status, ProviderStatus::Active);
    assert_eq!(record.models, vec!["gpt-4"]);
    assert!(record.last_synced_at.is_some());
}

#[tokio::test]
async fn catalog_failure_marks_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let h = harness(fast_sync(), Vec::new());
    let id = add_provider(&h.store, &server.uri()).await;

    assert!(h.engine.run(&id).await.is_err());

    let record = h.store.get(&id).await.unwrap().unwrap();
    assert_eq!(record.status, ProviderStatus::Error);
    assert!(record.models.is_empty());
    assert!(record.last_synced_at.is_none());
}

#[tokio::test]
async fn name_filter_limits_which_models_get_probed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "gpt-4"}, {"id": "embedding-ada"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "ok"})))
        .mount(&server)
        .await;

    let h = harness(
        SyncConfig {
            name_filters: vec!["gpt".to_string()],
            ..fast_sync()
        },
        Vec::new(),
    );
    let id = add_provider(&h.store, &server.uri()).await;

    h.engine.run(&id).await.unwrap();

    let record = h.store.get(&id).await.unwrap().unwrap();
    assert_eq!(record.models, vec!["gpt-4"]);
    // Only the filtered candidate was probed.
    let probes: Vec<_> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/chat/completions")
        .collect();
    assert_eq!(probes.len(), 1);
}

#[tokio::test]
async fn legacy_schema_upstream_verifies_through_completions_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "text-davinci"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "not a chat model"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/completions"))
        .and(body_partial_json(json!({"prompt": "Hi", "max_tokens": 1})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "cmpl-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(fast_sync(), vec!["not a chat model".to_string()]);
    let id = add_provider(&h.store, &server.uri()).await;

    h.engine.run(&id).await.unwrap();

    let record = h.store.get(&id).await.unwrap().unwrap();
    assert_eq!(record.models, vec!["text-davinci"]);
}

#[tokio::test]
async fn syncing_a_deleted_provider_is_a_noop() {
    let h = harness(fast_sync(), Vec::new());
    assert!(h.engine.run("no-such-provider").await.is_ok());
}

#[tokio::test]
async fn model_invalidation_removes_and_resyncs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "gpt-4"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "ok"})))
        .mount(&server)
        .await;

    let h = harness(fast_sync(), Vec::new());
    let mut provider = Provider::new("mock", &server.uri(), "sk-upstream");
    provider.status = ProviderStatus::Active;
    provider.models = vec!["gpt-4".to_string(), "stale-model".to_string()];
    let id = provider.id.clone();
    h.store.insert(provider).await.unwrap();

    h.engine.invalidate_model(&id, "stale-model").await.unwrap();

    // The stale entry is gone immediately; the respawned sync rebuilds the
    // working set from the live catalog.
    let record = h.store.get(&id).await.unwrap().unwrap();
    assert!(!record.models.contains(&"stale-model".to_string()));

    wait_for_working_set(&h.store, &id, &["gpt-4"]).await;
}

#[tokio::test]
async fn connection_update_forces_full_resync_from_pending() {
    let server = MockServer::start().await;
    mount_catalog(&server, &["gpt-4"]).await;

    let h = harness(fast_sync(), Vec::new());
    let registry = ProviderRegistry::new(Arc::clone(&h.store), Arc::clone(&h.engine));
    let id = add_active_provider(&h.store, &server.uri(), &["stale-model"]).await;

    let updated = registry
        .update(&id, None, None, Some("sk-rotated".to_string()))
        .await
        .unwrap();
    assert_eq!(updated.status, ProviderStatus::Pending);
    assert_eq!(updated.api_key, "sk-rotated");

    // The respawned sync rebuilds the working set from the live catalog.
    wait_for_working_set(&h.store, &id, &["gpt-4"]).await;
}

#[tokio::test]
async fn manual_resync_rebuilds_working_set() {
    let server = MockServer::start().await;
    mount_catalog(&server, &["gpt-4", "claude-3"]).await;

    let h = harness(fast_sync(), Vec::new());
    let registry = ProviderRegistry::new(Arc::clone(&h.store), Arc::clone(&h.engine));
    let id = add_active_provider(&h.store, &server.uri(), &["stale-model"]).await;

    registry.resync(&id).await.unwrap();
    let record = h.store.get(&id).await.unwrap().unwrap();
    assert_eq!(record.status, ProviderStatus::Pending);

    wait_for_working_set(&h.store, &id, &["gpt-4", "claude-3"]).await;
}

#[tokio::test]
async fn shrinking_the_periodic_interval_rearms_the_timer() {
    let server = MockServer::start().await;
    mount_catalog(&server, &["gpt-4"]).await;

    let h = harness(fast_sync(), Vec::new());
    let id = add_active_provider(&h.store, &server.uri(), &["stale-model"]).await;

    // Armed with an interval that would never fire inside this test.
    let (tx, rx) = watch::channel(Duration::from_secs(3600));
    Arc::clone(&h.engine).spawn_periodic(rx);
    tokio::time::sleep(Duration::from_millis(20)).await;

    // The timer picks up the new interval without waiting out the old one.
    tx.send(Duration::from_millis(50)).unwrap();

    wait_for_working_set(&h.store, &id, &["gpt-4"]).await;
}
