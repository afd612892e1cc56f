use sacc_store::StoreError;
use sacc_types::TypeError;

use crate::executor::FlushFailure;

/// Errors produced by the update buffer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    /// The key or delta was rejected; nothing was recorded.
    #[error("validation error: {0}")]
    Validation(String),

    /// The stored bytes for a key are not a record.
    #[error("cannot decode record {key}: {reason}")]
    Decode { key: String, reason: String },

    /// A record could not be serialized for writing.
    #[error("cannot encode record {key}: {reason}")]
    Encode { key: String, reason: String },

    /// The stored value is text, so no delta can be merged into it.
    #[error("record {key} does not hold a numeric value")]
    NotNumeric { key: String },

    /// Merging the delta would overflow a 64-bit value.
    #[error("value of {key} would overflow")]
    Overflow { key: String },

    /// A world state operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// One or more keys failed to commit during a flush and remain pending.
    #[error("flush left {} key(s) pending: {}", .failed.len(), failed_keys(.failed))]
    FlushPartial {
        committed: usize,
        failed: Vec<FlushFailure>,
    },

    #[error("update buffer lock poisoned")]
    LockPoisoned,
}

impl From<TypeError> for BatchError {
    fn from(e: TypeError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl BatchError {
    /// Keys named by a partial-flush error, in flush order.
    pub fn failed_keys(&self) -> Vec<&str> {
        match self {
            Self::FlushPartial { failed, .. } => failed.iter().map(|f| f.key.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}

fn failed_keys(failed: &[FlushFailure]) -> String {
    failed
        .iter()
        .map(|f| f.key.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result alias for update buffer operations.
pub type BatchResult<T> = Result<T, BatchError>;
