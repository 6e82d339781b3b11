//! Proxy forwarder
//!
//! Forwards a client request to a selected provider, substituting the
//! provider's own credential and the resolved model variant. Streaming
//! responses pass the upstream byte stream through unbuffered; non-streaming
//! responses are parsed and returned as JSON. Every outcome feeds back into
//! the score tracker, the cooldown map, and the usage log.

pub mod classify;

pub use classify::{Classifier, UpstreamErrorKind};

use crate::core::models::{ChatCompletionRequest, Provider};
use crate::core::registry::ProviderStore;
use crate::core::router::cooldown::CooldownMap;
use crate::core::router::score::ScoreTracker;
use crate::core::sync::SyncEngine;
use crate::utils::logging::{GatewayCounter, LogSink};
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};

/// Successful upstream reply.
pub enum UpstreamReply {
    /// Parsed non-streaming JSON body
    Json(serde_json::Value),
    /// Upstream byte stream, passed through as received
    Stream {
        /// Upstream content type (usually `text/event-stream`)
        content_type: String,
        /// Raw body chunks
        body: BoxStream<'static, reqwest::Result<Bytes>>,
    },
}

impl std::fmt::Debug for UpstreamReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamReply::Json(value) => f.debug_tuple("Json").field(value).finish(),
            UpstreamReply::Stream { content_type, .. } => f
                .debug_struct("Stream")
                .field("content_type", content_type)
                .finish_non_exhaustive(),
        }
    }
}

/// Failed forward attempt.
#[derive(Debug)]
pub enum ForwardError {
    /// Upstream answered with a non-2xx status
    Upstream {
        status: u16,
        body: String,
        kind: UpstreamErrorKind,
    },
    /// The upstream was never reached or the connection broke
    Network(String),
    /// Request could not be serialized or the success body parsed
    Internal(String),
}

/// Forwards requests to upstream providers.
pub struct Forwarder {
    client: reqwest::Client,
    classifier: Classifier,
    store: Arc<dyn ProviderStore>,
    scores: Arc<ScoreTracker>,
    cooldowns: Arc<CooldownMap>,
    sync: Arc<SyncEngine>,
    sink: Arc<dyn LogSink>,
}

impl Forwarder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: reqwest::Client,
        classifier: Classifier,
        store: Arc<dyn ProviderStore>,
        scores: Arc<ScoreTracker>,
        cooldowns: Arc<CooldownMap>,
        sync: Arc<SyncEngine>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            client,
            classifier,
            store,
            scores,
            cooldowns,
            sync,
            sink,
        }
    }

    /// Forward one request to one provider.
    pub async fn forward(
        &self,
        provider: &Provider,
        resolved_model: &str,
        request: &ChatCompletionRequest,
    ) -> Result<UpstreamReply, ForwardError> {
        let url = format!("{}/chat/completions", provider.base_url);
        let mut body = serde_json::to_value(request)
            .map_err(|e| ForwardError::Internal(format!("request serialization failed: {}", e)))?;
        body["model"] = serde_json::Value::String(resolved_model.to_string());

        if let Err(e) = self.store.touch_last_used(&provider.id).await {
            warn!(provider = %provider.name, error = %e, "could not stamp last_used_at");
        }

        let streaming = request.stream.unwrap_or(false);
        let started = Instant::now();

        let response = self
            .client
            .post(&url)
            .bearer_auth(&provider.api_key)
            .json(&body)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                let latency = started.elapsed().as_millis() as u64;
                self.scores
                    .record(&provider.id, resolved_model, false, Some(latency));
                self.cooldowns.penalize(&provider.id, resolved_model);
                self.sink.bump(GatewayCounter::UpstreamError);
                self.sink.bump(GatewayCounter::CooldownApplied);
                error!(provider = %provider.name, error = %e, "upstream unreachable");
                return Err(ForwardError::Network(e.to_string()));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let latency = started.elapsed().as_millis() as u64;
            let text = response.text().await.unwrap_or_default();
            let kind = self.classifier.classify(status.as_u16(), &text);

            self.scores
                .record(&provider.id, resolved_model, false, Some(latency));
            self.sink.bump(GatewayCounter::UpstreamError);
            self.apply_penalty(provider, resolved_model, kind).await;

            warn!(
                provider = %provider.name,
                model = resolved_model,
                status = status.as_u16(),
                kind = ?kind,
                "upstream error"
            );
            return Err(ForwardError::Upstream {
                status: status.as_u16(),
                body: text,
                kind,
            });
        }

        if streaming {
            // Record success as soon as headers arrive; the byte stream is
            // handed to the client untouched.
            let latency = started.elapsed().as_millis() as u64;
            self.scores
                .record(&provider.id, resolved_model, true, Some(latency));
            self.cooldowns.clear(&provider.id, resolved_model);
            self.sink.record_usage(resolved_model, &provider.name);

            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("text/event-stream")
                .to_string();
            return Ok(UpstreamReply::Stream {
                content_type,
                body: response.bytes_stream().boxed(),
            });
        }

        match response.json::<serde_json::Value>().await {
            Ok(value) => {
                let latency = started.elapsed().as_millis() as u64;
                self.scores
                    .record(&provider.id, resolved_model, true, Some(latency));
                self.cooldowns.clear(&provider.id, resolved_model);
                self.sink.record_usage(resolved_model, &provider.name);
                Ok(UpstreamReply::Json(value))
            }
            Err(e) => {
                let latency = started.elapsed().as_millis() as u64;
                self.scores
                    .record(&provider.id, resolved_model, false, Some(latency));
                self.cooldowns.penalize(&provider.id, resolved_model);
                self.sink.bump(GatewayCounter::UpstreamError);
                self.sink.bump(GatewayCounter::CooldownApplied);
                Err(ForwardError::Internal(format!(
                    "upstream returned 2xx with unparseable body: {}",
                    e
                )))
            }
        }
    }

    async fn apply_penalty(&self, provider: &Provider, model: &str, kind: UpstreamErrorKind) {
        match kind {
            // Malformed client input says nothing about provider health.
            UpstreamErrorKind::ClientError => {}
            UpstreamErrorKind::RateLimited | UpstreamErrorKind::ServerError => {
                self.cooldowns.penalize(&provider.id, model);
                self.sink.bump(GatewayCounter::CooldownApplied);
            }
            UpstreamErrorKind::QuotaExhausted => {
                self.cooldowns.penalize_extended(&provider.id, model);
                self.sink.bump(GatewayCounter::CooldownApplied);
            }
            UpstreamErrorKind::ModelNotFound => {
                self.cooldowns.penalize(&provider.id, model);
                self.sink.bump(GatewayCounter::CooldownApplied);
                if let Err(e) = self.sync.invalidate_model(&provider.id, model).await {
                    error!(provider = %provider.name, model, error = %e, "model invalidation failed");
                }
            }
        }
    }
}
