//! Error handling for Netgrow
//!
//! Every failure aborts the whole transformation. Nothing is written to the
//! weight store unless the complete new weight set is ready.

use std::path::PathBuf;

use thiserror::Error;

use crate::weights::Namespace;

/// Result type alias for Netgrow operations
pub type Result<T> = std::result::Result<T, GrowthError>;

/// Main error type for Netgrow operations
#[derive(Error, Debug)]
pub enum GrowthError {
    // Argument Errors
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("{operation}: index {index} out of range (must be below {limit})")]
    IndexOutOfRange {
        operation: &'static str,
        index: usize,
        limit: usize,
    },

    // Storage Errors
    #[error("Stored weights for {namespace} are inconsistent: {reason}")]
    StorageInconsistency { namespace: Namespace, reason: String },

    #[error("No weights stored for {namespace}")]
    NotFound { namespace: Namespace },

    #[error("{namespace} is locked by another transformation: {path}")]
    NamespaceBusy { namespace: Namespace, path: PathBuf },

    #[error("Storage unavailable: {path}: {source}")]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed weight file {path}: {reason}")]
    MalformedMatrix { path: PathBuf, reason: String },

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GrowthError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        GrowthError::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub(crate) fn inconsistent(namespace: Namespace, reason: impl Into<String>) -> Self {
        GrowthError::StorageInconsistency {
            namespace,
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GrowthError::StorageUnavailable {
            path: path.into(),
            source,
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            GrowthError::InvalidArgument { .. } => "INVALID_ARGUMENT",
            GrowthError::IndexOutOfRange { .. } => "INDEX_OUT_OF_RANGE",
            GrowthError::StorageInconsistency { .. } => "STORAGE_INCONSISTENCY",
            GrowthError::NotFound { .. } => "NOT_FOUND",
            GrowthError::NamespaceBusy { .. } => "NAMESPACE_BUSY",
            GrowthError::StorageUnavailable { .. } => "STORAGE_UNAVAILABLE",
            GrowthError::MalformedMatrix { .. } => "MALFORMED_MATRIX",
            GrowthError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Returns true if the same call may succeed later without changes.
    ///
    /// I/O failures are local filesystem errors and are not retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GrowthError::NamespaceBusy { .. })
    }

    /// Returns a user-facing recovery suggestion.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            GrowthError::InvalidArgument { .. } => {
                Some("Networks only grow: pass a positive number of units.")
            }
            GrowthError::IndexOutOfRange { .. } => {
                Some("Check the layer index against the descriptor's layer count.")
            }
            GrowthError::StorageInconsistency { .. } | GrowthError::MalformedMatrix { .. } => {
                Some("Restore a snapshot, or pass the descriptor that matches the stored weights.")
            }
            GrowthError::NotFound { .. } => {
                Some("Train or initialise the network first so its weights are stored.")
            }
            GrowthError::NamespaceBusy { .. } => Some(
                "Another edit is running on this network. Wait for it, or remove a stale lock file.",
            ),
            _ => None,
        }
    }
}
