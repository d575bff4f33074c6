use serde::Serialize;
use thiserror::Error;

pub const E_INVALID_PATH: &str = "E_INVALID_PATH";
pub const E_PATH_CONFLICT: &str = "E_PATH_CONFLICT";
pub const E_NOT_FOUND: &str = "E_NOT_FOUND";
pub const E_INVALID_OPERATION: &str = "E_INVALID_OPERATION";
pub const E_INVALID_SNAPSHOT: &str = "E_INVALID_SNAPSHOT";

/// Errors raised by tree-level operations.
///
/// These are always returned to the caller; the orchestration layer decides
/// whether to retry with a different path or name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("path conflict at '{path}': {reason}")]
    PathConflict { path: String, reason: String },

    #[error("no such file or directory: '{path}'")]
    NotFound { path: String },

    #[error("invalid operation on '{path}': {reason}")]
    InvalidOperation { path: String, reason: String },

    #[error("invalid snapshot: {reason}")]
    InvalidSnapshot { reason: String },
}

impl TreeError {
    #[must_use]
    pub fn invalid_path(path: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn conflict(path: &str, reason: impl Into<String>) -> Self {
        Self::PathConflict {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn not_found(path: &str) -> Self {
        Self::NotFound {
            path: path.to_string(),
        }
    }

    #[must_use]
    pub fn invalid_operation(path: &str, reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn invalid_snapshot(reason: impl Into<String>) -> Self {
        Self::InvalidSnapshot {
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPath { .. } => E_INVALID_PATH,
            Self::PathConflict { .. } => E_PATH_CONFLICT,
            Self::NotFound { .. } => E_NOT_FOUND,
            Self::InvalidOperation { .. } => E_INVALID_OPERATION,
            Self::InvalidSnapshot { .. } => E_INVALID_SNAPSHOT,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

/// Serializable form of a [`TreeError`], handed back to the orchestration layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub code: String,
    pub message: String,
}
