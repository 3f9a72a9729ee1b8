use std::path::PathBuf;

/// All errors that can be returned by a CaseStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No case record with the given identifier.
    #[error("case '{case_id}' not found")]
    CaseNotFound { case_id: String },

    /// Two records claim the same case identifier.
    #[error("duplicate case '{case_id}' (from {})", path.display())]
    DuplicateCase { case_id: String, path: PathBuf },

    /// A case file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A case file is not a valid case record.
    #[error("invalid case record in {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },

    /// A backend-specific storage error (DB connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
