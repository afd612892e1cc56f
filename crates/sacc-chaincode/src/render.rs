//! JSON shapes returned by query and history operations.

use serde::Serialize;
use serde_json::Value;

use sacc_store::IterGuard;
use sacc_types::{HistoryEntry, KeyValue, ResponseMetadata};

use crate::error::{ChaincodeError, ChaincodeResult};

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ListingRow {
    key: String,
    record: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PageMetadata {
    records_count: usize,
    bookmark: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Page {
    results: Vec<ListingRow>,
    response_metadata: PageMetadata,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct HistoryRow {
    tx_id: String,
    value: Option<Value>,
    timestamp: String,
    is_delete: bool,
}

fn to_value(value: impl Serialize) -> ChaincodeResult<Value> {
    serde_json::to_value(value).map_err(|e| ChaincodeError::Encode(e.to_string()))
}

fn listing_rows(mut rows: IterGuard<KeyValue>) -> ChaincodeResult<Vec<ListingRow>> {
    let mut out = Vec::new();
    for row in rows.by_ref() {
        let row = row?;
        let record = serde_json::from_slice(&row.value)
            .map_err(|e| ChaincodeError::decode(&row.key, e))?;
        out.push(ListingRow {
            key: row.key,
            record,
        });
    }
    rows.close()?;
    Ok(out)
}

/// `[{"Key": .., "Record": ..}, ...]`
pub fn listing(rows: IterGuard<KeyValue>) -> ChaincodeResult<Value> {
    to_value(listing_rows(rows)?)
}

/// `{"Results": [...], "ResponseMetadata": {"RecordsCount": n, "Bookmark": ..}}`
pub fn page(rows: IterGuard<KeyValue>, metadata: ResponseMetadata) -> ChaincodeResult<Value> {
    to_value(Page {
        results: listing_rows(rows)?,
        response_metadata: PageMetadata {
            records_count: metadata.fetched_records_count,
            bookmark: metadata.bookmark,
        },
    })
}

/// `[{"TxId", "Value", "Timestamp", "IsDelete"}, ...]`, oldest first.
pub fn history(key: &str, mut entries: IterGuard<HistoryEntry>) -> ChaincodeResult<Value> {
    let mut out = Vec::new();
    for entry in entries.by_ref() {
        let entry = entry?;
        let value = match entry.value {
            Some(bytes) => Some(
                serde_json::from_slice(&bytes).map_err(|e| ChaincodeError::decode(key, e))?,
            ),
            None => None,
        };
        out.push(HistoryRow {
            tx_id: entry.tx_id,
            value,
            timestamp: entry.timestamp.to_rfc3339(),
            is_delete: entry.is_delete,
        });
    }
    entries.close()?;
    to_value(out)
}

/// Serialize any payload.
pub fn json(value: impl Serialize) -> ChaincodeResult<Value> {
    to_value(value)
}
