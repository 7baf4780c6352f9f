use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::extract::ApiForm;
use crate::models::TokenResponse;
use crate::server::AppState;

const CLIENT_CREDENTIALS: &str = "client_credentials";

/// OAuth2 client-credentials token endpoint.
///
/// Takes a form-encoded body with `client_id`, `client_secret`, `grant_type` and
/// repeated `scope[]` entries (a space separated `scope` is accepted as well).
///
/// # Errors
///
/// - `ApiError::InvalidRequest` if the body is not a form, or the client id or secret is missing
/// - `ApiError::UnsupportedGrantType` for any grant other than `client_credentials`
/// - `ApiError::InvalidClient` for unknown, disabled, or wrongly authenticated clients
/// - `ApiError::InvalidScope` if a requested scope was not granted to the client
pub async fn access_token(
    State(state): State<Arc<AppState>>,
    ApiForm(pairs): ApiForm<Vec<(String, String)>>,
) -> ApiResult<Json<TokenResponse>> {
    let mut grant_type = None;
    let mut client_id = None;
    let mut client_secret = None;
    let mut scopes: Vec<String> = Vec::new();

    for (key, value) in pairs {
        match key.as_str() {
            "grant_type" => grant_type = Some(value),
            "client_id" => client_id = Some(value),
            "client_secret" => client_secret = Some(value),
            "scope[]" => scopes.push(value),
            "scope" => scopes.extend(value.split_whitespace().map(String::from)),
            _ => {}
        }
    }

    match grant_type.as_deref() {
        Some(CLIENT_CREDENTIALS) => {}
        Some(other) => {
            return Err(ApiError::UnsupportedGrantType(format!(
                "The authorization grant type \"{other}\" is not supported"
            )));
        }
        None => return Err(ApiError::InvalidRequest("Missing grant_type".to_string())),
    }

    let client_id = client_id.ok_or_else(|| ApiError::InvalidRequest("Missing client_id".to_string()))?;
    let client_secret = client_secret.ok_or_else(|| ApiError::InvalidRequest("Missing client_secret".to_string()))?;

    let client = state.clients.authenticate(&client_id, &client_secret)?;

    scopes.sort();
    scopes.dedup();
    if let Some(denied) = scopes.iter().find(|scope| !client.grants(scope)) {
        return Err(ApiError::InvalidScope(format!("The requested scope \"{denied}\" is invalid")));
    }

    let access_token = state
        .auth
        .issue_token(&client.client_id, scopes.clone(), client.lifetime_seconds)?;
    debug!(client_id = %client.client_id, ?scopes, "issued access token");

    Ok(Json(TokenResponse {
        token_type: "Bearer".to_string(),
        expires_in: client.lifetime_seconds,
        access_token,
    }))
}
