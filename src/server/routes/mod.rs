//! Client-facing HTTP routes

pub mod chat;
pub mod health;
pub mod models;

use actix_web::web;

/// Mount all routes onto an application.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(health::liveness)).service(
        web::scope("/v1")
            .route("/chat/completions", web::post().to(chat::chat_completions))
            .route("/models", web::get().to(models::list_models)),
    );
}
