use axum::Json;
use axum::extract::State;
use std::sync::Arc;

use crate::error::ApiResult;
use crate::models::HealthResponse;
use crate::server::AppState;

/// # Errors
///
/// This handler does not fail; the `Result` keeps the signature uniform with the other handlers.
pub async fn health(State(state): State<Arc<AppState>>) -> ApiResult<Json<HealthResponse>> {
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        resources: state.catalog.iter().map(|definition| definition.name.clone()).collect(),
        api_clients: state.clients.len(),
    };

    Ok(Json(response))
}
