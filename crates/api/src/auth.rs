use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::clients::ApiClientRegistry;
use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

#[derive(Debug, Clone)]
pub struct AuthState {
    pub secret: Vec<u8>,
}

impl AuthState {
    /// Uses the configured signing key, or a random one when none is given.
    #[must_use]
    pub fn new(signing_key: Option<&str>) -> Self {
        let secret = match signing_key {
            Some(key) => key.as_bytes().to_vec(),
            None => {
                let mut secret = vec![0u8; 32];
                rand::Rng::fill(&mut rand::rng(), &mut secret[..]);
                secret
            }
        };

        Self { secret }
    }

    /// # Errors
    ///
    /// This function returns an error if:
    /// - The lifetime does not fit a token expiry
    /// - Token generation fails
    pub fn issue_token(&self, client_id: &str, scopes: Vec<String>, lifetime_seconds: u64) -> ApiResult<String> {
        let lifetime = i64::try_from(lifetime_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| ApiError::InternalError(format!("Token lifetime {lifetime_seconds}s is out of range")))?;
        self.issue_token_at(client_id, scopes, Utc::now(), lifetime)
    }

    /// # Errors
    ///
    /// Returns `ApiError::InternalError` if the expiry overflows or the token cannot be encoded.
    pub fn issue_token_at(
        &self,
        client_id: &str,
        scopes: Vec<String>,
        issued_at: DateTime<Utc>,
        lifetime: Duration,
    ) -> ApiResult<String> {
        let expiration = issued_at
            .checked_add_signed(lifetime)
            .ok_or_else(|| ApiError::InternalError("Token expiry overflows".to_string()))?;

        let claims = TokenClaims {
            sub: client_id.to_string(),
            iat: unix_seconds(issued_at)?,
            exp: unix_seconds(expiration)?,
            jti: Uuid::new_v4().to_string(),
            scopes,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|e| ApiError::InternalError(format!("Token generation failed: {e}")))
    }

    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` if the token is malformed, expired, or signed with another key.
    pub fn verify_token(&self, token: &str) -> ApiResult<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<TokenClaims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|_| ApiError::Unauthorized)
    }
}

fn unix_seconds(instant: DateTime<Utc>) -> ApiResult<u64> {
    u64::try_from(instant.timestamp())
        .map_err(|_| ApiError::InternalError(format!("Timestamp {instant} is before the unix epoch")))
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenClaims {
    pub sub: String,
    pub exp: u64,
    pub iat: u64,
    pub jti: String,
    pub scopes: Vec<String>,
}

impl TokenClaims {
    #[must_use]
    pub fn has_scope(&self, required_scope: &str) -> bool {
        self.scopes.iter().any(|scope| scope == required_scope)
    }

    /// # Errors
    ///
    /// Returns `ApiError::Forbidden` when the token was not granted `required_scope`.
    pub fn require_scope(&self, required_scope: &str) -> ApiResult<()> {
        if self.has_scope(required_scope) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!("Missing required scope \"{required_scope}\"")))
        }
    }
}

/// Claims of a valid bearer token whose client is still registered and enabled.
#[derive(Debug)]
pub struct AuthenticatedClient(pub TokenClaims);

impl<S> FromRequestParts<S> for AuthenticatedClient
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("authorization")
            .and_then(|header| header.to_str().ok())
            .and_then(|header| {
                // Bearer prefix is case-insensitive
                if header.len() > 7 && header[..7].eq_ignore_ascii_case("bearer ") {
                    Some(header[7..].trim())
                } else {
                    None
                }
            })
            .filter(|token| !token.is_empty())
            .ok_or(ApiError::Unauthorized)?;

        let auth_state = parts
            .extensions
            .get::<AuthState>()
            .ok_or(ApiError::InternalError("Auth state not found".to_string()))?;
        let clients = parts
            .extensions
            .get::<ApiClientRegistry>()
            .ok_or(ApiError::InternalError("Client registry not found".to_string()))?;

        let claims = auth_state.verify_token(token)?;
        if !clients.is_active(&claims.sub) {
            return Err(ApiError::Unauthorized);
        }

        Ok(AuthenticatedClient(claims))
    }
}

// Exposes the auth state and client registry to extractors through request extensions
use axum::body::Body;
use axum::{http::Request, middleware::Next, response::Response};

pub async fn auth_middleware(State(state): State<Arc<AppState>>, mut request: Request<Body>, next: Next) -> Response {
    request.extensions_mut().insert(state.auth.clone());
    request.extensions_mut().insert(state.clients.clone());
    next.run(request).await
}
