//! OpenAI-compatible wire types
//!
//! Only the subset of the chat-completions schema the gateway inspects is
//! typed; everything else passes through untouched inside `extra`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Chat completion request (OpenAI compatible)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// Requested model name; resolved to a provider-specific variant before
    /// forwarding
    pub model: String,
    /// Conversation messages
    pub messages: Vec<ChatMessage>,
    /// Whether to stream the response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Any additional OpenAI parameters, forwarded verbatim
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A single chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role (`system` / `user` / `assistant` / ...)
    pub role: String,
    /// Text or multimodal content
    pub content: MessageContent,
}

/// Message content, either plain text or structured parts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text content
    Text(String),
    /// Multimodal content parts, forwarded verbatim
    Parts(Vec<serde_json::Value>),
}

impl ChatCompletionRequest {
    /// Minimal request used by sync-time and health probes: one neutral user
    /// message, one output token.
    pub fn probe(model: &str) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: MessageContent::Text("Hi".to_string()),
            }],
            stream: None,
            temperature: None,
            max_tokens: Some(1),
            extra: HashMap::new(),
        }
    }
}

/// Model list entry for `GET /v1/models`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelObject {
    /// Model identifier
    pub id: String,
    /// Always `"model"`
    pub object: String,
    /// Unix timestamp
    pub created: i64,
    /// Owner label reported to clients
    pub owned_by: String,
}

/// Model list response for `GET /v1/models`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelList {
    /// Always `"list"`
    pub object: String,
    /// De-duplicated union of every provider's verified models
    pub data: Vec<ModelObject>,
}

/// Upstream catalog response from `GET {base}/models`
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamModelList {
    /// Catalog entries
    #[serde(default)]
    pub data: Vec<UpstreamModelEntry>,
}

/// One entry of an upstream model catalog
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamModelEntry {
    /// Raw model identifier as the upstream advertises it
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_request_fields_round_trip() {
        let raw = serde_json::json!({
            "model": "gpt-4",
            "messages": [{"role": "user", "content": "hello"}],
            "temperature": 0.2,
            "top_p": 0.9,
            "seed": 42
        });
        let request: ChatCompletionRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(request.model, "gpt-4");
        assert_eq!(request.extra.get("seed"), Some(&serde_json::json!(42)));

        let back = serde_json::to_value(&request).unwrap();
        assert_eq!(back["top_p"], serde_json::json!(0.9));
    }

    #[test]
    fn probe_request_is_minimal() {
        let probe = ChatCompletionRequest::probe("gpt-4");
        assert_eq!(probe.max_tokens, Some(1));
        assert_eq!(probe.messages.len(), 1);
    }

    #[test]
    fn multimodal_content_parses() {
        let raw = serde_json::json!({
            "model": "gpt-4",
            "messages": [{
                "role": "user",
                "content": [{"type": "text", "text": "hi"}]
            }]
        });
        let request: ChatCompletionRequest = serde_json::from_value(raw).unwrap();
        assert!(matches!(
            request.messages[0].content,
            MessageContent::Parts(_)
        ));
    }
}
