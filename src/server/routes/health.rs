//! Liveness endpoint

use actix_web::HttpResponse;

/// `GET /` liveness check; unauthenticated by design so load balancers can
/// hit it.
pub async fn liveness() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain")
        .body("Hermes AI Gateway is running")
}
