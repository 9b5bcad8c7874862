use metaledger_storage::{RecordKind, StorageError};

use crate::probe::ProbeReport;

/// Errors returned by lifecycle operations.
///
/// Every failure is surfaced; no variant is ever converted into a
/// successful-looking record.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Referenced id is not in the store.
    #[error("record not found: {id}")]
    NotFound { id: String },

    /// The operation is not an edge of the record's state machine from its
    /// current status. The record is unchanged.
    #[error("cannot {operation} {kind} {id}: status is '{status}'")]
    InvalidTransition {
        id: String,
        kind: RecordKind,
        operation: String,
        status: String,
    },

    /// Input breaks a data-model invariant.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Create-only write for an id that already exists, or a write that kept
    /// losing compare-and-swap races.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The endpoint could not be reached. Carries the full probe report.
    #[error(
        "endpoint {} unreachable: {}",
        .report.endpoint,
        .report.error.as_deref().unwrap_or("no response")
    )]
    Connectivity { report: ProbeReport },

    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl LedgerError {
    /// Stable snake_case tag used when rendering the error as JSON.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::NotFound { .. } => "not_found",
            LedgerError::InvalidTransition { .. } => "invalid_transition",
            LedgerError::Validation(_) => "validation",
            LedgerError::Conflict(_) => "conflict",
            LedgerError::Connectivity { .. } => "connectivity",
            LedgerError::Storage(_) => "storage",
        }
    }
}

impl From<StorageError> for LedgerError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { id } => LedgerError::NotFound { id },
            StorageError::AlreadyExists { id } => {
                LedgerError::Conflict(format!("record {} already exists", id))
            }
            StorageError::InvalidId { id } => {
                LedgerError::Validation(format!("invalid record id {:?}", id))
            }
            e @ StorageError::KindMismatch { .. } => LedgerError::Validation(e.to_string()),
            other => LedgerError::Storage(other),
        }
    }
}
