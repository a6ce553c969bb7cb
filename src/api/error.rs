use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::identity;

/// Errors surfaced to HTTP clients
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed request field
    #[error("{0}")]
    Validation(String),
    /// Verification code mismatch or expiry
    #[error("{0}")]
    InvalidCredential(String),
    #[error("Username is already taken")]
    UsernameTaken,
    #[error("{0}")]
    NotFound(String),
    /// SMS or identity provider failure
    #[error("{0}")]
    External(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidCredential(_) | ApiError::UsernameTaken => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::External(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

/// Maps identity provider errors to client-facing errors
impl From<identity::Error> for ApiError {
    fn from(error: identity::Error) -> Self {
        match error {
            identity::Error::UsernameExists(_) => ApiError::UsernameTaken,
            identity::Error::UserNotFound(_) => ApiError::NotFound("User not found".into()),
            identity::Error::InvalidParameter(message) => ApiError::Validation(message),
            identity::Error::Service(_) | identity::Error::ConfigError(_) => {
                ApiError::External("Identity provider request failed".into())
            }
        }
    }
}
