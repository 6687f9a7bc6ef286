//! Error taxonomy shared by the engine, the sync adapter and the HTTP layer.

use axum::{http::StatusCode, Json};
use sea_orm::DbErr;

use crate::models::common::ErrorResponse;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Vendor or customer absent
    #[error("{0} not found")]
    NotFound(String),

    /// No processor credential on file
    #[error("Vendor has not connected a payment processor account")]
    NotConnected,

    #[error("Missing or invalid bearer token")]
    Unauthorized,

    /// Malformed request parameters
    #[error("{0}")]
    Validation(String),

    /// External processor or delivery gateway unreachable or returned non-success
    #[error("Upstream failure: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::NotConnected | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Upstream(e.to_string())
    }
}

impl From<AppError> for (StatusCode, Json<ErrorResponse>) {
    fn from(e: AppError) -> Self {
        let status = e.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", e);
        } else {
            tracing::debug!("Request rejected ({}): {}", status, e);
        }

        (
            status,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
    }
}
