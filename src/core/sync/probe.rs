//! Live model probes
//!
//! A probe is a minimal real completion call (one output token, neutral
//! prompt) used to verify that a (provider, model) pair is actually
//! callable. Sync-time verification and dispatcher health checks share the
//! same shape so their signals are comparable.

use crate::core::models::ChatCompletionRequest;
use reqwest::Client;
use serde_json::json;
use std::time::{Duration, Instant};

/// Result of one probe.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    /// HTTP success from the upstream
    pub ok: bool,
    /// End-to-end latency
    pub latency_ms: u64,
    /// Status line or error text for the sync log
    pub detail: String,
}

/// Issues probes with a bounded timeout.
#[derive(Debug, Clone)]
pub struct Prober {
    client: Client,
    timeout: Duration,
    alt_protocol_hints: Vec<String>,
}

impl Prober {
    pub fn new(client: Client, timeout: Duration, alt_protocol_hints: Vec<String>) -> Self {
        Self {
            client,
            timeout,
            alt_protocol_hints: alt_protocol_hints
                .into_iter()
                .map(|h| h.to_lowercase())
                .collect(),
        }
    }

    /// Probe one model. On failure, if the response body hints that the
    /// upstream expects the legacy text-completion schema, the probe is
    /// retried once in that shape before the failure is final.
    pub async fn probe(&self, base_url: &str, api_key: &str, model: &str) -> ProbeOutcome {
        let started = Instant::now();
        let url = format!("{}/chat/completions", base_url);
        let body = ChatCompletionRequest::probe(model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => ProbeOutcome {
                ok: true,
                latency_ms: started.elapsed().as_millis() as u64,
                detail: response.status().to_string(),
            },
            Ok(response) => {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                if self.hints_legacy_schema(&text) {
                    return self.probe_legacy(base_url, api_key, model, started).await;
                }
                ProbeOutcome {
                    ok: false,
                    latency_ms: started.elapsed().as_millis() as u64,
                    detail: format!("{}: {}", status, truncate(&text, 200)),
                }
            }
            Err(e) => ProbeOutcome {
                ok: false,
                latency_ms: started.elapsed().as_millis() as u64,
                detail: e.to_string(),
            },
        }
    }

    fn hints_legacy_schema(&self, body: &str) -> bool {
        let lowered = body.to_lowercase();
        self.alt_protocol_hints.iter().any(|h| lowered.contains(h))
    }

    async fn probe_legacy(
        &self,
        base_url: &str,
        api_key: &str,
        model: &str,
        started: Instant,
    ) -> ProbeOutcome {
        let url = format!("{}/completions", base_url);
        let body = json!({
            "model": model,
            "prompt": "Hi",
            "max_tokens": 1,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => ProbeOutcome {
                ok: true,
                latency_ms: started.elapsed().as_millis() as u64,
                detail: format!("{} (legacy completion schema)", response.status()),
            },
            Ok(response) => ProbeOutcome {
                ok: false,
                latency_ms: started.elapsed().as_millis() as u64,
                detail: format!("legacy retry failed: {}", response.status()),
            },
            Err(e) => ProbeOutcome {
                ok: false,
                latency_ms: started.elapsed().as_millis() as u64,
                detail: format!("legacy retry failed: {}", e),
            },
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 2), "he");
        assert_eq!(truncate("héllo", 2), "hé");
    }

    #[test]
    fn legacy_hint_matching_is_case_insensitive() {
        let prober = Prober::new(
            Client::new(),
            Duration::from_secs(5),
            vec!["not a chat model".to_string()],
        );
        assert!(prober.hints_legacy_schema("This is NOT a CHAT model"));
        assert!(!prober.hints_legacy_schema("rate limit exceeded"));
    }
}
