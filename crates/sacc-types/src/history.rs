use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One committed mutation of a key.
///
/// A delete is recorded as a tombstone: `is_delete` is set and `value` is
/// `None`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub tx_id: String,
    pub value: Option<Vec<u8>>,
    pub timestamp: DateTime<Utc>,
    pub is_delete: bool,
}

impl HistoryEntry {
    pub fn write(tx_id: impl Into<String>, value: Vec<u8>, timestamp: DateTime<Utc>) -> Self {
        Self {
            tx_id: tx_id.into(),
            value: Some(value),
            timestamp,
            is_delete: false,
        }
    }

    pub fn tombstone(tx_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            tx_id: tx_id.into(),
            value: None,
            timestamp,
            is_delete: true,
        }
    }
}
