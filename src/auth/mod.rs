//! Gateway authentication
//!
//! A single shared secret guards the client-facing API. Clients present it
//! as `Authorization: Bearer <key>`; an empty configured key disables the
//! gate, which is only sensible for local development.

use crate::config::AuthConfig;
use crate::utils::error::{GatewayError, Result};
use actix_web::http::header::AUTHORIZATION;
use actix_web::HttpRequest;

/// Shared-secret bearer gate for client-facing routes.
#[derive(Debug, Clone)]
pub struct AuthGate {
    master_key: Option<String>,
}

impl AuthGate {
    pub fn new(config: &AuthConfig) -> Self {
        let master_key = if config.master_key.is_empty() {
            None
        } else {
            Some(config.master_key.clone())
        };
        Self { master_key }
    }

    /// Whether the gate actually checks anything.
    pub fn enabled(&self) -> bool {
        self.master_key.is_some()
    }

    /// Validate the request's bearer credential.
    pub fn check(&self, req: &HttpRequest) -> Result<()> {
        let Some(expected) = self.master_key.as_deref() else {
            return Ok(());
        };
        match bearer_token(req) {
            Some(token) if token == expected => Ok(()),
            _ => Err(GatewayError::Auth),
        }
    }
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
