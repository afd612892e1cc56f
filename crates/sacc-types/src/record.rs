//! The JSON document stored under each key.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Object type tag written when the caller does not configure one.
pub const DEFAULT_DOC_TYPE: &str = "asset";

/// Value carried by a [`Record`].
///
/// Counters are numbers; content hashes and other opaque payloads are text.
/// Only numeric values can absorb buffered deltas.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordValue {
    Number(i64),
    Text(String),
}

impl RecordValue {
    /// Interpret an invocation argument: integers become numbers, anything
    /// else is kept as text.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(n) => Self::Number(n),
            Err(_) => Self::Text(raw.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl Default for RecordValue {
    fn default() -> Self {
        Self::Number(0)
    }
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// A record in the world state: `{"docType", "key", "value"}`.
///
/// `doc_type` distinguishes object kinds sharing one state database, which
/// is what rich-query selectors usually filter on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "docType")]
    pub doc_type: String,
    pub key: String,
    pub value: RecordValue,
}

impl Record {
    pub fn new(doc_type: impl Into<String>, key: impl Into<String>, value: RecordValue) -> Self {
        Self {
            doc_type: doc_type.into(),
            key: key.into(),
            value,
        }
    }

    /// A numeric record starting at zero.
    pub fn zeroed(doc_type: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(doc_type, key, RecordValue::default())
    }

    /// Serialize to the bytes stored in the world state.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TypeError> {
        serde_json::to_vec(self).map_err(|e| TypeError::Encode(e.to_string()))
    }

    /// Decode bytes read from the world state.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypeError> {
        serde_json::from_slice(bytes).map_err(|e| TypeError::Decode(e.to_string()))
    }
}
