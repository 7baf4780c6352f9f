use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde_json::Value;
use std::sync::Arc;

use crate::auth::AuthenticatedClient;
use crate::catalog::ResourceDefinition;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::listing::ListParams;
use crate::models::{BulkDeleteRequest, ListEnvelope};
use crate::server::AppState;
use crate::validation::{NOT_BLANK, ValidationMode, Violation};

/// # Errors
/// - `ApiError::Forbidden`: the token lacks the resource's read scope.
/// - `ApiError::BadRequest`: invalid `limit`, `offset`, `orderBy` or `sortOrder`.
pub async fn list_resources(
    State(state): State<Arc<AppState>>,
    Extension(definition): Extension<Arc<ResourceDefinition>>,
    AuthenticatedClient(claims): AuthenticatedClient,
    ApiQuery(query): ApiQuery<Vec<(String, String)>>,
) -> ApiResult<Json<ListEnvelope>> {
    claims.require_scope(&definition.read_scope)?;

    let params = ListParams::parse(&query, &definition, &state.config)?;
    let items = state.store.list(&definition)?;

    Ok(Json(params.apply(&definition, state.config.default_locale(), items)))
}

/// # Errors
/// - `ApiError::Forbidden`: the token lacks the resource's read scope.
/// - `ApiError::NotFound`: no item has this id.
pub async fn get_resource(
    State(state): State<Arc<AppState>>,
    Extension(definition): Extension<Arc<ResourceDefinition>>,
    AuthenticatedClient(claims): AuthenticatedClient,
    ApiPath(id): ApiPath<u64>,
) -> ApiResult<Json<Value>> {
    claims.require_scope(&definition.read_scope)?;

    Ok(Json(state.store.get(&definition, id)?))
}

/// # Errors
/// - `ApiError::Forbidden`: the token lacks the resource's write scope.
/// - `ApiError::BadRequest`: the body is not a JSON object.
/// - `ApiError::Validation`: the payload breaks a field rule.
pub async fn create_resource(
    State(state): State<Arc<AppState>>,
    Extension(definition): Extension<Arc<ResourceDefinition>>,
    AuthenticatedClient(claims): AuthenticatedClient,
    ApiJson(payload): ApiJson<Value>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    claims.require_scope(&definition.write_scope)?;

    let fields = state
        .validation()
        .validate(&definition, &payload, ValidationMode::Create)?;
    let item = state.store.insert(&definition, fields)?;

    Ok((StatusCode::CREATED, Json(item)))
}

/// Full update: the payload must satisfy the same rules as a creation.
///
/// # Errors
/// - `ApiError::Forbidden`: the token lacks the resource's write scope.
/// - `ApiError::NotFound`: no item has this id.
/// - `ApiError::Validation`: the payload breaks a field rule.
pub async fn replace_resource(
    State(state): State<Arc<AppState>>,
    Extension(definition): Extension<Arc<ResourceDefinition>>,
    AuthenticatedClient(claims): AuthenticatedClient,
    ApiPath(id): ApiPath<u64>,
    ApiJson(payload): ApiJson<Value>,
) -> ApiResult<Json<Value>> {
    claims.require_scope(&definition.write_scope)?;
    state.store.get(&definition, id)?;

    let fields = state
        .validation()
        .validate(&definition, &payload, ValidationMode::Replace)?;

    Ok(Json(state.store.replace(&definition, id, fields)?))
}

/// Partial update: only the provided fields are validated and changed.
///
/// # Errors
/// - `ApiError::Forbidden`: the token lacks the resource's write scope.
/// - `ApiError::NotFound`: no item has this id.
/// - `ApiError::Validation`: a provided field breaks its rule.
pub async fn patch_resource(
    State(state): State<Arc<AppState>>,
    Extension(definition): Extension<Arc<ResourceDefinition>>,
    AuthenticatedClient(claims): AuthenticatedClient,
    ApiPath(id): ApiPath<u64>,
    ApiJson(payload): ApiJson<Value>,
) -> ApiResult<Json<Value>> {
    claims.require_scope(&definition.write_scope)?;
    state.store.get(&definition, id)?;

    let fields = state
        .validation()
        .validate(&definition, &payload, ValidationMode::Patch)?;

    Ok(Json(state.store.merge(&definition, id, fields)?))
}

/// # Errors
/// - `ApiError::Forbidden`: the token lacks the resource's write scope.
/// - `ApiError::NotFound`: no item has this id.
pub async fn delete_resource(
    State(state): State<Arc<AppState>>,
    Extension(definition): Extension<Arc<ResourceDefinition>>,
    AuthenticatedClient(claims): AuthenticatedClient,
    ApiPath(id): ApiPath<u64>,
) -> ApiResult<StatusCode> {
    claims.require_scope(&definition.write_scope)?;
    state.store.remove(&definition, id)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Deletes every listed id, or nothing when one of them does not exist.
///
/// # Errors
/// - `ApiError::Forbidden`: the token lacks the resource's write scope.
/// - `ApiError::Validation`: the id list is empty or not a list of ids.
/// - `ApiError::NotFound`: at least one id does not exist.
pub async fn bulk_delete_resources(
    State(state): State<Arc<AppState>>,
    Extension(definition): Extension<Arc<ResourceDefinition>>,
    AuthenticatedClient(claims): AuthenticatedClient,
    ApiJson(request): ApiJson<BulkDeleteRequest>,
) -> ApiResult<StatusCode> {
    claims.require_scope(&definition.write_scope)?;

    if request.ids.is_empty() {
        return Err(ApiError::Validation(vec![Violation::new("ids", NOT_BLANK)]));
    }
    state.store.remove_many(&definition, &request.ids)?;

    Ok(StatusCode::NO_CONTENT)
}
