use serde::{Deserialize, Serialize};

/// A row yielded by range and rich query iterators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: Vec<u8>,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Pagination metadata returned alongside a bounded page.
///
/// `bookmark` is opaque to callers: pass it back unchanged to fetch the next
/// page. An empty bookmark requests the first page.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub fetched_records_count: usize,
    pub bookmark: String,
}
