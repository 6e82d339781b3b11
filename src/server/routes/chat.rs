//! Chat completions endpoint
//!
//! OpenAI-compatible entry point. Authenticates, validates, hands the
//! request to the orchestrator, and renders either the parsed JSON reply or
//! the upstream byte stream. Every request lands in the request log with its
//! final status and duration.

use crate::core::models::ChatCompletionRequest;
use crate::core::proxy::UpstreamReply;
use crate::server::state::AppState;
use crate::utils::error::{GatewayError, Result};
use crate::utils::logging::{LogSink, RequestLogEntry};
use actix_web::http::header::CACHE_CONTROL;
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use futures::StreamExt;
use std::time::Instant;
use tracing::error;

/// `POST /v1/chat/completions`
pub async fn chat_completions(
    state: web::Data<AppState>,
    req: HttpRequest,
    request: web::Json<ChatCompletionRequest>,
) -> std::result::Result<HttpResponse, GatewayError> {
    let started = Instant::now();
    let model = request.model.clone();
    let ip = req
        .connection_info()
        .realip_remote_addr()
        .map(str::to_string);

    let result = handle(&state, &req, request.into_inner()).await;

    let status = match &result {
        Ok(response) => response.status().as_u16(),
        Err(e) => e.status_code().as_u16(),
    };
    state.sink.log_request(RequestLogEntry {
        method: req.method().to_string(),
        path: req.path().to_string(),
        model: Some(model),
        status,
        duration_ms: started.elapsed().as_millis() as u64,
        ip,
    });

    result
}

async fn handle(
    state: &AppState,
    req: &HttpRequest,
    request: ChatCompletionRequest,
) -> Result<HttpResponse> {
    state.auth.check(req)?;
    validate(&request)?;

    match state.orchestrator.execute(&request).await? {
        UpstreamReply::Json(value) => Ok(HttpResponse::Ok().json(value)),
        UpstreamReply::Stream { content_type, body } => Ok(HttpResponse::Ok()
            .content_type(content_type)
            .insert_header((CACHE_CONTROL, "no-cache"))
            .streaming(body.map(|chunk| {
                chunk.map_err(|e| {
                    error!(error = %e, "upstream stream broke mid-response");
                    actix_web::error::ErrorInternalServerError(e)
                })
            }))),
    }
}

fn validate(request: &ChatCompletionRequest) -> Result<()> {
    if request.model.trim().is_empty() {
        return Err(GatewayError::Validation("model must not be empty".into()));
    }
    if request.messages.is_empty() {
        return Err(GatewayError::Validation(
            "messages must not be empty".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_model_fails_validation() {
        let mut request = ChatCompletionRequest::probe("gpt-4");
        request.model = "  ".to_string();
        assert!(validate(&request).is_err());
    }

    #[test]
    fn empty_messages_fail_validation() {
        let mut request = ChatCompletionRequest::probe("gpt-4");
        request.messages.clear();
        assert!(validate(&request).is_err());
    }

    #[test]
    fn probe_shape_passes_validation() {
        assert!(validate(&ChatCompletionRequest::probe("gpt-4")).is_ok());
    }
}
