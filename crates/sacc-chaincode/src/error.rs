use sacc_batch::{BatchError, FlushFailure};
use sacc_store::StoreError;
use sacc_types::TypeError;

/// Errors returned by chaincode operations.
///
/// Every variant maps to a response status through [`status`](Self::status);
/// none of them is fatal to the host.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChaincodeError {
    /// Malformed arguments; nothing was written.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("incorrect number of arguments for {operation}: expected {expected}, got {got}")]
    ArgumentCount {
        operation: &'static str,
        expected: usize,
        got: usize,
    },

    /// The function name does not resolve to a registered operation.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("record {key} does not exist")]
    NotFound { key: String },

    #[error("record {key} already exists")]
    AlreadyExists { key: String },

    /// Stored bytes could not be read as a record or as JSON.
    #[error("cannot decode {key}: {reason}")]
    Decode { key: String, reason: String },

    /// A malformed query, bookmark, or a scan that broke part-way.
    #[error("query error: {0}")]
    Query(String),

    #[error("not supported: {0}")]
    NotSupported(&'static str),

    /// A world state call failed.
    #[error("store error: {0}")]
    Store(StoreError),

    /// A flush committed some keys and left the rest pending.
    #[error("flush left {} key(s) pending: {}", .failed.len(), join_keys(.failed))]
    FlushPartial {
        committed: usize,
        failed: Vec<FlushFailure>,
    },

    /// Any other update-buffer failure (overflow, poisoned lock).
    #[error("update buffer error: {0}")]
    Buffer(BatchError),

    #[error("cannot encode response: {0}")]
    Encode(String),
}

impl ChaincodeError {
    /// HTTP-style status code reported in the [`Response`](crate::Response).
    pub fn status(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::ArgumentCount { .. } | Self::UnknownOperation(_) => 400,
            Self::NotFound { .. } => 404,
            Self::AlreadyExists { .. } => 409,
            _ => 500,
        }
    }

    pub fn decode(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<StoreError> for ChaincodeError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Query(msg) => Self::Query(msg),
            StoreError::NotSupported(what) => Self::NotSupported(what),
            StoreError::InvalidArgument(msg) => Self::Validation(msg),
            other => Self::Store(other),
        }
    }
}

impl From<BatchError> for ChaincodeError {
    fn from(e: BatchError) -> Self {
        match e {
            BatchError::Validation(msg) => Self::Validation(msg),
            BatchError::Decode { key, reason } => Self::Decode { key, reason },
            BatchError::NotNumeric { key } => Self::Decode {
                reason: "stored value is not numeric".into(),
                key,
            },
            BatchError::Store(store) => store.into(),
            BatchError::FlushPartial { committed, failed } => {
                Self::FlushPartial { committed, failed }
            }
            other => Self::Buffer(other),
        }
    }
}

impl From<TypeError> for ChaincodeError {
    fn from(e: TypeError) -> Self {
        Self::Validation(e.to_string())
    }
}

fn join_keys(failed: &[FlushFailure]) -> String {
    failed
        .iter()
        .map(|f| f.key.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result alias for chaincode operations.
pub type ChaincodeResult<T> = Result<T, ChaincodeError>;
