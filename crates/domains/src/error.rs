//! # DomainError
//!
//! Centralized error handling for the Corkboard persistence core.
//! Maps validation and storage failures to actionable error types.

use std::fmt;

use thiserror::Error;

/// One violated field constraint, e.g. `notes[3].geometry.w`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every constraint a candidate entity violated, collected in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {entity}: {}", join_violations(.violations))]
pub struct ValidationError {
    pub entity: &'static str,
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    pub fn single(entity: &'static str, field: &str, message: impl Into<String>) -> Self {
        Self {
            entity,
            violations: vec![FieldViolation { field: field.to_string(), message: message.into() }],
        }
    }

    /// True when some violation targets exactly `field` or one of its children.
    pub fn touches(&self, field: &str) -> bool {
        self.violations.iter().any(|v| {
            v.field == field
                || v.field.starts_with(&format!("{field}."))
                || v.field.starts_with(&format!("{field}["))
        })
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// The primary error type for all domain and storage operations.
#[derive(Error, Debug)]
pub enum DomainError {
    /// Schema constraint violation (never retried)
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Resource not found (e.g., Board, Note, Backup)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Local filesystem failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Document could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Infrastructure failure inside a backend (e.g., SQLite locked, HTTP 500)
    #[error("storage backend error: {0}")]
    Backend(String),

    /// The driver manager was built from an empty driver list
    #[error("no storage drivers available")]
    NoDrivers,

    /// The driver manager was used before `initialize()`
    #[error("driver manager not initialized; call initialize() first")]
    NotInitialized,
}

impl DomainError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound(entity.to_string(), id.to_string())
    }

    pub fn backend(err: impl fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// A specialized Result type for Corkboard domain logic.
pub type Result<T> = std::result::Result<T, DomainError>;
