//! Foundation types for the simple asset chaincode.
//!
//! Every other crate in the workspace speaks in these types:
//!
//! - [`Record`] / [`RecordValue`] -- the JSON document stored under a key
//! - [`KeyValue`] -- a row yielded by range and rich query iterators
//! - [`HistoryEntry`] -- one mutation of a key, tombstone-aware
//! - [`ResponseMetadata`] -- page count and continuation bookmark
//!
//! Keys are plain strings; [`validate_key`] is the single place that
//! decides whether a string may be used as one.

pub mod error;
pub mod history;
pub mod key;
pub mod query;
pub mod record;

pub use error::TypeError;
pub use history::HistoryEntry;
pub use key::{validate_key, MAX_KEY_LEN};
pub use query::{KeyValue, ResponseMetadata};
pub use record::{Record, RecordValue, DEFAULT_DOC_TYPE};
