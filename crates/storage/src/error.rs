use crate::record::RecordKind;

/// All errors that can be returned by a RecordStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No record with the given id.
    #[error("record not found: {id}")]
    NotFound { id: String },

    /// Create-only write for an id that already exists.
    #[error("record already exists: {id}")]
    AlreadyExists { id: String },

    /// Compare-and-swap write lost: the stored version is not the one the
    /// caller read.
    #[error("version conflict on record {id}: expected version {expected_version}, found {found_version}")]
    VersionConflict {
        id: String,
        expected_version: u64,
        found_version: u64,
    },

    /// Write over an id that holds a record of another kind.
    #[error("record {id} is a {stored}, refusing to overwrite it with a {given}")]
    KindMismatch {
        id: String,
        stored: RecordKind,
        given: RecordKind,
    },

    /// Id contains characters that cannot be used as a file name.
    #[error("invalid record id: {id:?}")]
    InvalidId { id: String },

    /// A stored document could not be decoded.
    #[error("corrupt record file {path}: {message}")]
    Corrupt { path: String, message: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A backend-specific storage error (lock poisoning, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
