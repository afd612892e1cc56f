/// Errors from world state operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A get, put or delete failed in the underlying backend.
    #[error("backend failure on {key}: {reason}")]
    Backend { key: String, reason: String },

    /// The query string is malformed, or a scan failed part-way.
    #[error("query error: {0}")]
    Query(String),

    /// The backend does not implement this operation.
    #[error("operation not supported by this backend: {0}")]
    NotSupported(&'static str),

    /// A caller-supplied argument (page size, bookmark) is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// `next` was called on an exhausted or closed iterator.
    #[error("iterator exhausted or closed")]
    IteratorExhausted,

    /// A lock guarding backend state was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub fn backend(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Backend {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
