//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service, and how each
//! failure is rendered as an HTTP response.

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use loan_ledger_core::{LedgerError, ValidationErrors};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an outcome of a ledger operation.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failure to apply the embedded migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The request could not be parsed (bad path id, malformed JSON, missing credentials).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

//=========================================================================================
// Response Envelope
//=========================================================================================

/// A single rejected field in a `400` response.
#[derive(Debug, Serialize, ToSchema)]
pub struct FieldErrorBody {
    pub field: String,
    pub message: String,
}

/// The `{"message": ...}` envelope used for every non-resource response.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldErrorBody>,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            errors: Vec::new(),
        }
    }

    fn invalid(errors: &ValidationErrors) -> Self {
        Self {
            message: "Invalid input".to_string(),
            errors: errors
                .errors()
                .iter()
                .map(|e| FieldErrorBody {
                    field: e.field.to_string(),
                    message: e.message.clone(),
                })
                .collect(),
        }
    }
}

impl ApiError {
    fn status_and_body(&self) -> (StatusCode, MessageResponse) {
        match self {
            ApiError::Ledger(e) => match e {
                LedgerError::InvalidInput(errors) => {
                    (StatusCode::BAD_REQUEST, MessageResponse::invalid(errors))
                }
                LedgerError::DuplicatePhone | LedgerError::LoanAlreadySettled => {
                    (StatusCode::CONFLICT, MessageResponse::new(e.to_string()))
                }
                LedgerError::NotFound(_) | LedgerError::UserNotFound => {
                    (StatusCode::NOT_FOUND, MessageResponse::new(e.to_string()))
                }
                LedgerError::AuthenticationFailed | LedgerError::TokenExpired => {
                    (StatusCode::UNAUTHORIZED, MessageResponse::new(e.to_string()))
                }
                LedgerError::Forbidden => {
                    (StatusCode::FORBIDDEN, MessageResponse::new(e.to_string()))
                }
                LedgerError::Internal(_) => internal(),
            },
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, MessageResponse::new(msg.clone())),
            ApiError::Config(_)
            | ApiError::Database(_)
            | ApiError::Migration(_)
            | ApiError::Io(_)
            | ApiError::Internal(_) => internal(),
        }
    }
}

fn internal() -> (StatusCode, MessageResponse) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        MessageResponse::new("Internal server error"),
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(body)).into_response()
    }
}
