//! Deterministic, per-key flush of pending deltas.

use std::sync::Arc;

use sacc_store::WorldState;
use sacc_types::{Record, RecordValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::accumulator::DeltaAccumulator;
use crate::error::{BatchError, BatchResult};

/// A key whose delta reached the world state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CommittedKey {
    pub key: String,
    pub delta: i64,
    pub value: i64,
}

/// A key that stayed pending, with the reason its write failed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FlushFailure {
    pub key: String,
    pub error: String,
}

/// Outcome of one flush pass, in flush order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FlushReport {
    pub committed: Vec<CommittedKey>,
    pub failed: Vec<FlushFailure>,
}

impl FlushReport {
    /// Returns `true` if the pass touched no keys.
    pub fn is_empty(&self) -> bool {
        self.committed.is_empty() && self.failed.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn committed_keys(&self) -> Vec<&str> {
        self.committed.iter().map(|c| c.key.as_str()).collect()
    }

    /// Turn a report with failures into [`BatchError::FlushPartial`].
    pub fn into_result(self) -> BatchResult<FlushReport> {
        if self.failed.is_empty() {
            Ok(self)
        } else {
            Err(BatchError::FlushPartial {
                committed: self.committed.len(),
                failed: self.failed,
            })
        }
    }
}

/// Applies pending deltas to the world state.
///
/// Each key is an independent read-merge-write; there is no cross-key
/// atomicity. A failing key keeps its delta and pending position and is
/// retried by the next flush.
#[derive(Clone)]
pub struct FlushExecutor {
    store: Arc<dyn WorldState>,
    doc_type: String,
}

impl FlushExecutor {
    pub fn new(store: Arc<dyn WorldState>, doc_type: impl Into<String>) -> Self {
        Self {
            store,
            doc_type: doc_type.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn WorldState> {
        &self.store
    }

    pub fn doc_type(&self) -> &str {
        &self.doc_type
    }

    /// Flush every key pending at call time, in first-seen order.
    ///
    /// An empty accumulator yields an empty report without touching the
    /// store.
    pub fn flush(&self, acc: &mut DeltaAccumulator) -> FlushReport {
        let order = acc.pending_order().to_vec();
        let mut report = FlushReport::default();
        if order.is_empty() {
            return report;
        }

        for key in order {
            let delta = acc.peek(&key);
            match self.commit_key(&key, delta) {
                Ok(value) => {
                    acc.settle(&key);
                    debug!(key = %key, delta, value, "pending delta committed");
                    report.committed.push(CommittedKey { key, delta, value });
                }
                Err(e) => {
                    warn!(key = %key, delta, error = %e, "pending delta kept after failed write");
                    report.failed.push(FlushFailure {
                        key,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            committed = report.committed.len(),
            failed = report.failed.len(),
            still_pending = acc.pending_keys(),
            "flush complete"
        );
        report
    }

    /// Read the stored record, merge `delta`, write it back.
    fn commit_key(&self, key: &str, delta: i64) -> BatchResult<i64> {
        let current = self.load(key)?;
        let stored = current
            .value
            .as_number()
            .ok_or_else(|| BatchError::NotNumeric { key: key.into() })?;
        let value = stored
            .checked_add(delta)
            .ok_or_else(|| BatchError::Overflow { key: key.into() })?;

        let updated = Record {
            value: RecordValue::Number(value),
            ..current
        };
        let bytes = updated.to_bytes().map_err(|e| BatchError::Encode {
            key: key.into(),
            reason: e.to_string(),
        })?;
        self.store.put_state(key, &bytes)?;
        Ok(value)
    }

    /// The stored record, or a zeroed one if the key is absent.
    pub(crate) fn load(&self, key: &str) -> BatchResult<Record> {
        match self.store.get_state(key)? {
            Some(bytes) => Record::from_bytes(&bytes).map_err(|e| BatchError::Decode {
                key: key.into(),
                reason: e.to_string(),
            }),
            None => Ok(Record::zeroed(&self.doc_type, key)),
        }
    }
}

impl std::fmt::Debug for FlushExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlushExecutor")
            .field("doc_type", &self.doc_type)
            .finish()
    }
}
