//! # CoreError
//!
//! Error type returned by the engine. Every variant is also announced on the
//! event channel with a [`CoreErrorKind`](crate::events::CoreErrorKind).

use domains::legacy::LegacyParseError;
use domains::{DomainError, ValidationError};
use thiserror::Error;

use crate::backup::BackupError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error(transparent)]
    Legacy(#[from] LegacyParseError),

    /// A transaction queued ahead of this one failed
    #[error("transaction aborted because an earlier transaction failed")]
    TransactionAborted,

    #[error("plugin `{plugin}` failed: {message}")]
    Plugin { plugin: String, message: String },
}

impl From<ValidationError> for CoreError {
    fn from(err: ValidationError) -> Self {
        Self::Domain(DomainError::Validation(err))
    }
}

impl CoreError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Domain(DomainError::Validation(_)))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Domain(DomainError::NotFound(..)) | Self::Backup(BackupError::NotFound(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
