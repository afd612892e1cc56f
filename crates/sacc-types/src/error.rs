use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("key must be a non-empty string")]
    EmptyKey,

    #[error("key exceeds {max} bytes: {len}")]
    KeyTooLong { len: usize, max: usize },

    #[error("key contains a NUL byte")]
    KeyContainsNul,

    #[error("record decode failed: {0}")]
    Decode(String),

    #[error("record encode failed: {0}")]
    Encode(String),
}
