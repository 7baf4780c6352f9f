use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::debug;

use crate::auth::AuthenticatedClient;
use crate::catalog::ResourceDefinition;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiMultipart;
use crate::server::AppState;
use crate::validation::{NOT_NULL, ValidationMode, Violation};

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Creates an item of a multipart resource from an upload.
///
/// Text parts become fields as-is. The `file` part is reduced to `fileName`,
/// `mimeType` and `size`; its content is not kept.
///
/// # Errors
/// - `ApiError::Forbidden`: the token lacks the resource's write scope.
/// - `ApiError::BadRequest`: the multipart body cannot be read.
/// - `ApiError::Validation`: the `file` part is missing or a field breaks its rule.
pub async fn upload_attachment(
    State(state): State<Arc<AppState>>,
    Extension(definition): Extension<Arc<ResourceDefinition>>,
    AuthenticatedClient(claims): AuthenticatedClient,
    ApiMultipart(mut multipart): ApiMultipart,
) -> ApiResult<(StatusCode, Json<Value>)> {
    claims.require_scope(&definition.write_scope)?;

    let mut payload = Map::new();
    let mut has_file = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let mime_type = field.content_type().unwrap_or(DEFAULT_MIME_TYPE).to_string();
            let content = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {e}")))?;

            debug!(file_name = %file_name, size = content.len(), "received upload");
            payload.insert("fileName".to_string(), json!(file_name));
            payload.insert("mimeType".to_string(), json!(mime_type));
            payload.insert("size".to_string(), json!(content.len()));
            has_file = true;
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Invalid multipart field {name}: {e}")))?;
            payload.insert(name, json!(text));
        }
    }

    if !has_file {
        return Err(ApiError::Validation(vec![Violation::new("file", NOT_NULL)]));
    }

    let fields = state
        .validation()
        .validate(&definition, &Value::Object(payload), ValidationMode::Create)?;
    let item = state.store.insert(&definition, fields)?;

    Ok((StatusCode::CREATED, Json(item)))
}
