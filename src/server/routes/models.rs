//! Model listing endpoint

use crate::core::models::{ModelList, ModelObject};
use crate::server::state::AppState;
use crate::utils::error::GatewayError;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use std::collections::BTreeSet;
use tracing::debug;

/// `GET /v1/models`
///
/// De-duplicated union of every registered provider's verified models, in
/// the OpenAI list shape. A provider mid-resync keeps advertising its
/// last-verified set; the dispatcher is what decides routability per
/// request.
pub async fn list_models(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, GatewayError> {
    state.auth.check(&req)?;

    let providers = state.store.list_all().await?;
    let mut ids: BTreeSet<String> = BTreeSet::new();
    for provider in providers {
        ids.extend(provider.models);
    }
    debug!(count = ids.len(), "listing verified models");

    let created = Utc::now().timestamp();
    let data = ids
        .into_iter()
        .map(|id| ModelObject {
            id,
            object: "model".to_string(),
            created,
            owned_by: "hermes-gateway".to_string(),
        })
        .collect();

    Ok(HttpResponse::Ok().json(ModelList {
        object: "list".to_string(),
        data,
    }))
}
