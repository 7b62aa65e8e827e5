//! Error handling for the Pharmaceutical Warehouse Management System
//!
//! Service errors are translated 1:1 into HTTP status codes and messages.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{Diagnostic, DomainError};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Insufficient permissions: {0}")]
    InsufficientPermissions(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Duplicate medicine in request: {}", .0.join(", "))]
    DuplicateInRequest(Vec<String>),

    #[error("Packaging does not match inspection")]
    Reconciliation(Vec<Diagnostic>),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid state transition: {message}")]
    InvalidStateTransition {
        message: String,
        current: String,
        requested: String,
    },

    #[error("Order already has a warehouse manager assigned")]
    AlreadyAssigned,

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Inactive user: {0}")]
    InactiveUser(String),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        let message = err.to_string();
        match err {
            DomainError::Validation { field, message } => AppError::Validation { field, message },
            DomainError::InvalidState(msg) => AppError::InvalidState(msg),
            DomainError::InvalidTransition {
                current, requested, ..
            } => AppError::InvalidStateTransition {
                message,
                current,
                requested,
            },
            DomainError::DuplicateInRequest(ids) => AppError::DuplicateInRequest(ids),
            DomainError::Reconciliation(diagnostics) => AppError::Reconciliation(diagnostics),
            DomainError::Forbidden(msg) => AppError::InsufficientPermissions(msg),
            DomainError::NotFound(resource) => AppError::NotFound(resource),
            DomainError::AlreadyAssigned => AppError::AlreadyAssigned,
            DomainError::InvalidRole(user) => AppError::InvalidRole(user),
            DomainError::InactiveUser(user) => AppError::InactiveUser(user),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        DomainError::from(errors).into()
    }
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
            details: None,
        }
    }

    fn with_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new("TOKEN_EXPIRED", "Token has expired"),
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new("INVALID_TOKEN", "Invalid token"),
            ),
            AppError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new("UNAUTHORIZED", msg.clone()),
            ),
            AppError::InsufficientPermissions(msg) => (
                StatusCode::FORBIDDEN,
                ErrorResponse::new("INSUFFICIENT_PERMISSIONS", msg.clone()),
            ),
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("VALIDATION_ERROR", message.clone()).with_field(field),
            ),
            AppError::DuplicateInRequest(ids) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(
                    "DUPLICATE_IN_REQUEST",
                    format!("Duplicate medicine in request: {}", ids.join(", ")),
                )
                .with_details(serde_json::json!({ "medicine_ids": ids })),
            ),
            AppError::Reconciliation(diagnostics) => {
                let messages: Vec<String> = diagnostics.iter().map(ToString::to_string).collect();
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new(
                        "PACKAGING_MISMATCH",
                        format!("Packaging does not match inspection: {}", messages.join("; ")),
                    )
                    .with_details(serde_json::json!({
                        "messages": messages,
                        "diagnostics": diagnostics,
                    })),
                )
            }
            AppError::DuplicateEntry(field) => (
                StatusCode::CONFLICT,
                ErrorResponse::new(
                    "DUPLICATE_ENTRY",
                    format!("A record with this {} already exists", field),
                )
                .with_field(field),
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new("NOT_FOUND", format!("{} not found", resource)),
            ),
            AppError::InvalidState(msg) => (
                StatusCode::CONFLICT,
                ErrorResponse::new("INVALID_STATE", msg.clone()),
            ),
            AppError::InvalidStateTransition {
                message,
                current,
                requested,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse::new("INVALID_STATE_TRANSITION", message.clone()).with_details(
                    serde_json::json!({
                        "current_status": current,
                        "requested_status": requested,
                    }),
                ),
            ),
            AppError::AlreadyAssigned => (
                StatusCode::CONFLICT,
                ErrorResponse::new(
                    "ALREADY_ASSIGNED",
                    "Order already has a warehouse manager assigned",
                ),
            ),
            AppError::InvalidRole(user) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(
                    "INVALID_ROLE",
                    format!("User {} is not a warehouse manager", user),
                ),
            ),
            AppError::InactiveUser(user) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("INACTIVE_USER", format!("User {} is not active", user)),
            ),
            AppError::ConcurrentModification(msg) => (
                StatusCode::CONFLICT,
                ErrorResponse::new("CONCURRENT_MODIFICATION", msg.clone()),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("DATABASE_ERROR", "A database error occurred"),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("INTERNAL_ERROR", msg.clone()),
            ),
        };

        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        (status, Json(body)).into_response()
    }
}

/// Translate a unique-index violation on insert into a duplicate error
pub fn map_unique_violation(err: sqlx::Error, field: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::DuplicateEntry(field.to_string())
        }
        _ => AppError::DatabaseError(err),
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
