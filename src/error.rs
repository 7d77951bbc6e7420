//! Application error taxonomy and its HTTP rendering.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::repository::RepositoryError;

/// Every terminal, user-visible outcome a request can end in besides success.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing resource, or one the viewer may not know exists.
    #[error("The requested page was not found")]
    NotFound,

    /// Authenticated, but not allowed to touch this resource.
    #[error("You do not have permission to perform this action")]
    Forbidden,

    /// Anonymous viewer on an action that needs an account. Carries the login
    /// location the client is sent to.
    #[error("Authentication required")]
    Unauthenticated(String),

    /// Soft denial: send the client somewhere else instead of failing.
    #[error("Redirecting to {0}")]
    Redirect(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error")]
    Database(#[from] sqlx::Error),
}

/// Error response body for JSON responses.
#[derive(Debug, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorResponse {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            RepositoryError::Database(e) => Self::Database(e),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::Unauthenticated(location) | Self::Redirect(location) => {
                return (StatusCode::FOUND, [(header::LOCATION, location.clone())]).into_response();
            }
            Self::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Database(e) => {
                tracing::error!(error = ?e, "database failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        (status, Json(ErrorResponse::new(code, self.to_string()))).into_response()
    }
}

/// Result type for handler and service operations.
pub type AppResult<T> = Result<T, AppError>;
