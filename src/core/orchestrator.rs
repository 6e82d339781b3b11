//! Request orchestration
//!
//! The retry loop behind the chat endpoint: ask the dispatcher for a
//! provider (excluding those already tried this request), forward, and
//! decide whether the outcome ends the request or warrants another attempt.
//!
//! Client-visible semantics are strict:
//! - no candidate on the first attempt -> 404 `model_not_found`
//! - non-429 4xx from upstream -> returned verbatim, never retried
//! - 429 / 5xx / network failure -> excluded and retried
//! - retries exhausted -> last upstream error verbatim, or a generic 502
//!   when only network-level failures occurred

use crate::core::models::ChatCompletionRequest;
use crate::core::proxy::{ForwardError, Forwarder, UpstreamReply};
use crate::core::router::Dispatcher;
use crate::utils::error::{GatewayError, Result};
use crate::utils::logging::{GatewayCounter, LogSink};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// Drives one client request across providers.
pub struct Orchestrator {
    dispatcher: Arc<Dispatcher>,
    forwarder: Arc<Forwarder>,
    sink: Arc<dyn LogSink>,
    max_attempts: u32,
}

impl Orchestrator {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        forwarder: Arc<Forwarder>,
        sink: Arc<dyn LogSink>,
        max_attempts: u32,
    ) -> Self {
        Self {
            dispatcher,
            forwarder,
            sink,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Execute a chat completion against the best available providers.
    pub async fn execute(&self, request: &ChatCompletionRequest) -> Result<UpstreamReply> {
        let mut tried: HashSet<String> = HashSet::new();
        let mut last_upstream: Option<(u16, String)> = None;
        let mut last_network: Option<String> = None;

        for attempt in 1..=self.max_attempts {
            let Some(selection) = self.dispatcher.select(&request.model, &tried).await? else {
                if attempt == 1 {
                    // Nothing was ever contacted; this is the client's
                    // problem, not an upstream outage.
                    return Err(GatewayError::ModelNotSupported(request.model.clone()));
                }
                warn!(
                    model = %request.model,
                    attempt,
                    "no more candidates, surfacing last failure"
                );
                break;
            };

            tried.insert(selection.provider.id.clone());

            match self
                .forwarder
                .forward(&selection.provider, &selection.resolved_model, request)
                .await
            {
                Ok(reply) => return Ok(reply),
                Err(ForwardError::Upstream { status, body, kind }) => {
                    if !kind.is_retryable() {
                        return Err(GatewayError::UpstreamPassthrough { status, body });
                    }
                    last_upstream = Some((status, body));
                }
                Err(ForwardError::Network(message)) => {
                    last_network = Some(message);
                }
                Err(ForwardError::Internal(message)) => {
                    return Err(GatewayError::Internal(message));
                }
            }
        }

        self.sink.bump(GatewayCounter::RetriesExhausted);
        match last_upstream {
            Some((status, body)) => Err(GatewayError::UpstreamPassthrough { status, body }),
            None => Err(GatewayError::AllUpstreamsFailed(
                last_network.unwrap_or_else(|| "no upstream could be reached".to_string()),
            )),
        }
    }
}
