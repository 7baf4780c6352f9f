use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use color_eyre::eyre::Error;
use serde_json::json;
use std::fmt;

use crate::validation::Violation;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    Forbidden(String),
    NotFound(String),
    BadRequest(String),
    PayloadTooLarge(String),
    InternalError(String),
    Validation(Vec<Violation>),
    // OAuth token endpoint failures
    InvalidClient,
    InvalidScope(String),
    InvalidRequest(String),
    UnsupportedGrantType(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized | ApiError::InvalidClient => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_)
            | ApiError::InvalidScope(_)
            | ApiError::InvalidRequest(_)
            | ApiError::UnsupportedGrantType(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized => write!(f, "Authentication required"),
            ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::InternalError(msg) => write!(f, "{msg}"),
            ApiError::Validation(violations) => {
                write!(f, "{} validation error(s)", violations.len())?;
                for violation in violations {
                    write!(f, "; {}: {}", violation.property_path, violation.message)?;
                }
                Ok(())
            }
            ApiError::InvalidClient => write!(f, "Client authentication failed"),
            ApiError::InvalidScope(msg) | ApiError::InvalidRequest(msg) | ApiError::UnsupportedGrantType(msg) => {
                write!(f, "{msg}")
            }
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            ApiError::Validation(violations) => json!(violations),
            ApiError::InvalidClient => json!({
                "error": "invalid_client",
                "error_description": "Client authentication failed"
            }),
            ApiError::InvalidScope(msg) => json!({ "error": "invalid_scope", "error_description": msg }),
            ApiError::InvalidRequest(msg) => json!({ "error": "invalid_request", "error_description": msg }),
            ApiError::UnsupportedGrantType(msg) => {
                json!({ "error": "unsupported_grant_type", "error_description": msg })
            }
            other => {
                let code = match other {
                    ApiError::Unauthorized => "UNAUTHORIZED",
                    ApiError::Forbidden(_) => "FORBIDDEN",
                    ApiError::NotFound(_) => "NOT_FOUND",
                    ApiError::BadRequest(_) => "BAD_REQUEST",
                    ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
                    _ => "INTERNAL_ERROR",
                };
                json!({
                    "error": {
                        "code": code,
                        "message": other.to_string()
                    }
                })
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}
