//! Domain error taxonomy shared by the server and the browser bindings

use thiserror::Error;

use crate::models::OrderKind;
use crate::reconciliation::{format_diagnostics, Diagnostic};

/// Errors raised by pure domain rules
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or out-of-policy input
    #[error("{message}")]
    Validation { field: String, message: String },

    /// Operation not permitted in the order's current status
    #[error("{0}")]
    InvalidState(String),

    /// Status change absent from the transition table
    #[error("Cannot change {kind} order status from '{current}' to '{requested}'")]
    InvalidTransition {
        kind: OrderKind,
        current: String,
        requested: String,
    },

    /// The same medicine appears more than once in one submission
    #[error("Duplicate medicine in request: {}", .0.join(", "))]
    DuplicateInRequest(Vec<String>),

    /// Packaged totals do not match inspected net quantities
    #[error("Packaging does not match inspection: {}", format_diagnostics(.0))]
    Reconciliation(Vec<Diagnostic>),

    /// Caller's role may not perform the operation
    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Order already has a warehouse manager assigned")]
    AlreadyAssigned,

    #[error("User {0} is not a warehouse manager")]
    InvalidRole(String),

    #[error("User {0} is not active")]
    InactiveUser(String),
}

impl DomainError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        DomainError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<validator::ValidationErrors> for DomainError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut fields: Vec<_> = field_errors.into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);

        match fields.into_iter().next() {
            Some((field, errs)) => {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("Invalid value for {}", field));
                DomainError::validation(field, message)
            }
            None => DomainError::validation("input", "Invalid input"),
        }
    }
}
