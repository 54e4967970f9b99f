use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Field-level validation failure, reported back in the error envelope.
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Error taxonomy of the API boundary. Everything a handler can fail with is
/// converted into one of these and rendered as a `{success, message, ...}`
/// JSON envelope; nothing propagates as an unhandled fault.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("There was an error creating your account.")]
    Validation(Vec<FieldError>),
    #[error("You are not logged in.")]
    Unauthenticated,
    #[error("{0}")]
    Unauthorized(String),
    #[error("Access denied.")]
    Forbidden,
    #[error("{0}")]
    BadRequest(String),
    #[error("You are not authorized to modify resource.")]
    NotResourceOwner,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Conflict(_) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            // Ownership mismatches are reported as 401, matching the
            // behavior clients already depend on.
            ApiError::Unauthenticated | ApiError::Unauthorized(_) | ApiError::NotResourceOwner => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<FieldError>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(e) => {
                error!(error = %e, "internal error");
                "Internal server error.".to_string()
            }
            other => other.to_string(),
        };
        let errors = match self {
            ApiError::Validation(errors) => Some(errors),
            _ => None,
        };
        let body = ErrorBody {
            success: false,
            message,
            errors,
        };
        (status, Json(body)).into_response()
    }
}
