//! Buffered increments.
//!
//! `batchRecord` folds a delta into the update buffer and returns at once
//! unless the flush policy fires. `batchFlush` and `batch` commit
//! immediately and fail if any key stays pending.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use sacc_batch::FlushReport;
use sacc_types::validate_key;

use crate::error::{ChaincodeError, ChaincodeResult};
use crate::handler::{parse_delta, HandlerContext, OperationHandler};
use crate::operation::OperationKind;
use crate::render;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Recorded {
    pending_order: Vec<String>,
    flush: Option<FlushReport>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PendingKey {
    key: String,
    delta: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Status {
    pending: Vec<PendingKey>,
    pending_keys: usize,
    pending_ops: u64,
    flushes: u64,
}

/// One element of a `batch` submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub key: String,
    pub value: i64,
}

fn finish_flush(report: FlushReport) -> ChaincodeResult<Value> {
    if !report.is_complete() {
        warn!(
            committed = report.committed.len(),
            failed = report.failed.len(),
            "flush left keys pending"
        );
    }
    let report = report.into_result()?;
    render::json(&report)
}

// ---------------------------------------------------------------------------
// batchRecord(key, delta)
// ---------------------------------------------------------------------------

/// Buffer a signed delta for a key.
///
/// If the delta triggers a flush, the flush report is included in the
/// payload; failed keys stay pending and the call still succeeds.
pub struct BatchRecordHandler;

impl OperationHandler for BatchRecordHandler {
    fn kind(&self) -> OperationKind {
        OperationKind::BatchRecord
    }

    fn arity(&self) -> usize {
        2
    }

    fn execute(&self, ctx: &HandlerContext<'_>, args: &[String]) -> ChaincodeResult<Value> {
        let delta = parse_delta(&args[1])?;
        let outcome = ctx.buffer.record(&args[0], delta)?;
        render::json(Recorded {
            pending_order: outcome.pending_order,
            flush: outcome.flush,
        })
    }
}

// ---------------------------------------------------------------------------
// batchFlush()
// ---------------------------------------------------------------------------

/// Commit everything pending now.
pub struct BatchFlushHandler;

impl OperationHandler for BatchFlushHandler {
    fn kind(&self) -> OperationKind {
        OperationKind::BatchFlush
    }

    fn arity(&self) -> usize {
        0
    }

    fn execute(&self, ctx: &HandlerContext<'_>, _args: &[String]) -> ChaincodeResult<Value> {
        finish_flush(ctx.buffer.flush()?)
    }
}

// ---------------------------------------------------------------------------
// batch(jsonArray)
// ---------------------------------------------------------------------------

/// Apply a client-coalesced array of `{"key", "value"}` increments.
///
/// Every entry is validated, including the pending sums it would produce,
/// before any is recorded. Recording and the flush that commits the
/// submission happen under one buffer lock.
pub struct BatchHandler;

impl BatchHandler {
    pub fn parse(raw: &str) -> ChaincodeResult<Vec<BatchEntry>> {
        let entries: Vec<BatchEntry> = serde_json::from_str(raw).map_err(|e| {
            ChaincodeError::Validation(format!("batch must be a JSON array of {{key, value}}: {e}"))
        })?;
        for (i, entry) in entries.iter().enumerate() {
            validate_key(&entry.key)
                .map_err(|e| ChaincodeError::Validation(format!("batch entry {i}: {e}")))?;
        }
        Ok(entries)
    }
}

impl OperationHandler for BatchHandler {
    fn kind(&self) -> OperationKind {
        OperationKind::Batch
    }

    fn arity(&self) -> usize {
        1
    }

    fn execute(&self, ctx: &HandlerContext<'_>, args: &[String]) -> ChaincodeResult<Value> {
        let deltas: Vec<(String, i64)> = Self::parse(&args[0])?
            .into_iter()
            .map(|entry| (entry.key, entry.value))
            .collect();
        let report = ctx.buffer.record_all_and_flush(&deltas)?;
        info!(entries = deltas.len(), "batch recorded");
        finish_flush(report)
    }
}

// ---------------------------------------------------------------------------
// batchStatus()
// ---------------------------------------------------------------------------

/// Pending keys with their deltas, plus buffer counters.
pub struct BatchStatusHandler;

impl OperationHandler for BatchStatusHandler {
    fn kind(&self) -> OperationKind {
        OperationKind::BatchStatus
    }

    fn arity(&self) -> usize {
        0
    }

    fn execute(&self, ctx: &HandlerContext<'_>, _args: &[String]) -> ChaincodeResult<Value> {
        let pending: Vec<PendingKey> = ctx
            .buffer
            .snapshot()?
            .into_iter()
            .map(|(key, delta)| PendingKey { key, delta })
            .collect();
        let stats = ctx.buffer.stats()?;
        render::json(Status {
            pending,
            pending_keys: stats.pending_keys,
            pending_ops: stats.pending_ops,
            flushes: ctx.buffer.flush_count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_client_batch() {
        let entries = BatchHandler::parse(r#"[{"key":"a","value":3},{"key":"b","value":-1}]"#).unwrap();
        assert_eq!(
            entries,
            vec![
                BatchEntry {
                    key: "a".into(),
                    value: 3
                },
                BatchEntry {
                    key: "b".into(),
                    value: -1
                },
            ]
        );
    }

    #[test]
    fn rejects_bad_entries() {
        assert!(BatchHandler::parse(r#"{"key":"a","value":1}"#).is_err());
        assert!(BatchHandler::parse(r#"[{"key":"a","value":"x"}]"#).is_err());
        let err = BatchHandler::parse(r#"[{"key":"a","value":1},{"key":"","value":1}]"#).unwrap_err();
        assert!(err.to_string().contains("batch entry 1"));
    }

    #[test]
    fn empty_batch_is_valid() {
        assert!(BatchHandler::parse("[]").unwrap().is_empty());
    }
}
