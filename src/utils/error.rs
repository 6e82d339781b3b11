//! Error handling for the gateway
//!
//! Every failure surfaced to a client carries a machine-readable `code`
//! inside an OpenAI-style `{error:{message,type,code}}` envelope. Upstream
//! client errors and exhausted-retry upstream errors are passed through
//! verbatim instead of being re-wrapped.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

/// Result type alias for the gateway
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Main error type for the gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Gateway credential rejected
    #[error("Invalid gateway key provided")]
    Auth,

    /// Malformed client request
    #[error("Validation error: {0}")]
    Validation(String),

    /// No registered provider supports the requested model
    #[error("No upstream provider supports model '{0}'")]
    ModelNotSupported(String),

    /// Last upstream error returned verbatim after retries
    #[error("Upstream returned status {status}")]
    UpstreamPassthrough {
        /// HTTP status from the upstream
        status: u16,
        /// Raw upstream response body
        body: String,
    },

    /// Every attempted provider failed at the network level
    #[error("All upstream providers failed: {0}")]
    AllUpstreamsFailed(String),

    /// Provider store errors
    #[error("Store error: {0}")]
    Store(String),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Debug, Serialize)]
struct ErrorDetail<'a> {
    message: String,
    #[serde(rename = "type")]
    error_type: &'a str,
    code: &'a str,
}

impl GatewayError {
    fn envelope(&self) -> (StatusCode, &'static str, &'static str) {
        match self {
            GatewayError::Auth => (
                StatusCode::UNAUTHORIZED,
                "invalid_request_error",
                "invalid_api_key",
            ),
            GatewayError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "invalid_request",
            ),
            GatewayError::ModelNotSupported(_) => (
                StatusCode::NOT_FOUND,
                "invalid_request_error",
                "model_not_found",
            ),
            GatewayError::AllUpstreamsFailed(_) => {
                (StatusCode::BAD_GATEWAY, "api_error", "upstream_error")
            }
            GatewayError::Config(_) | GatewayError::Yaml(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "api_error",
                "config_error",
            ),
            GatewayError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "api_error",
                "store_error",
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "api_error",
                "internal_error",
            ),
        }
    }
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::UpstreamPassthrough { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            _ => self.envelope().0,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Pass the upstream body through untouched so clients see exactly
        // what the provider said.
        if let GatewayError::UpstreamPassthrough { status, body } = self {
            let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY);
            return HttpResponse::build(status)
                .content_type("application/json")
                .body(body.clone());
        }

        let (status, error_type, code) = self.envelope();
        HttpResponse::build(status).json(ErrorEnvelope {
            error: ErrorDetail {
                message: self.to_string(),
                error_type,
                code,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_maps_to_401_with_code() {
        let response = GatewayError::Auth.error_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn model_not_supported_maps_to_404() {
        let err = GatewayError::ModelNotSupported("gpt-5".into());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn passthrough_keeps_upstream_status() {
        let err = GatewayError::UpstreamPassthrough {
            status: 418,
            body: "{\"error\":\"teapot\"}".into(),
        };
        assert_eq!(err.status_code().as_u16(), 418);
    }

    #[test]
    fn exhausted_retries_map_to_502() {
        let err = GatewayError::AllUpstreamsFailed("connection refused".into());
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }
}
