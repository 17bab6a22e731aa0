//! Unified error handling
//!
//! Provides the application error type and response envelope:
//! - [`AppError`] — error enum surfaced by every core operation
//! - [`AppResponse`] — API response structure
//!
//! Internal persistence errors are logged and masked; business errors pass
//! through with their own code so the API layer can map them 1:1.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

/// Unified API response structure
///
/// ```json
/// { "code": "E0000", "message": "Success", "data": { ... } }
/// ```
#[derive(Debug, Serialize)]
pub struct AppResponse<T> {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// Application-level error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ========== Authentication / Authorization ==========
    #[error("Authentication required")]
    Unauthorized,

    #[error("Permission denied: {0}")]
    Forbidden(String),

    // ========== Business Logic ==========
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Order is not ready for checkout")]
    NotReadyForCheckout,

    // ========== Settlement ==========
    #[error("No pending payment matches the confirmation")]
    PaymentNotFound,

    #[error("Confirmed amount does not match the pending payment")]
    AmountMismatch,

    // ========== System ==========
    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Result type for handlers and core operations
pub type AppResult<T> = Result<T, AppError>;

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Database(e.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "E3001", self.to_string())
            }
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "E2001", self.to_string()),

            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "E0003", self.to_string()),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "E0002", self.to_string()),

            // Rejected state-machine edges surface as conflicts
            AppError::InvalidTransition { .. } => {
                (StatusCode::CONFLICT, "E0004", self.to_string())
            }
            AppError::NotReadyForCheckout => {
                (StatusCode::UNPROCESSABLE_ENTITY, "E0005", self.to_string())
            }

            AppError::PaymentNotFound => {
                (StatusCode::NOT_FOUND, "E0007", self.to_string())
            }
            AppError::AmountMismatch => {
                (StatusCode::UNPROCESSABLE_ENTITY, "E0008", self.to_string())
            }

            AppError::Database(msg) => {
                error!(target: "database", error = %msg, "Database error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "E9002",
                    "Database error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                error!(target: "internal", error = %msg, "Internal error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "E9001",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(AppResponse::<()> {
            code: code.to_string(),
            message,
            data: None,
        });

        (status, body).into_response()
    }
}

/// Create a successful response
pub fn ok<T: Serialize>(data: T) -> Json<AppResponse<T>> {
    Json(AppResponse {
        code: "E0000".to_string(),
        message: "Success".to_string(),
        data: Some(data),
    })
}
