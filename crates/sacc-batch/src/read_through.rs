//! Reads that see buffered deltas.

use sacc_types::{Record, RecordValue};

use crate::accumulator::DeltaAccumulator;
use crate::error::{BatchError, BatchResult};
use crate::executor::FlushExecutor;

/// Merges the world state with not-yet-flushed deltas.
///
/// Borrows the accumulator, so the caller decides the locking. Never
/// mutates anything. The merged value is exactly what the next flush would
/// write for the key, absent further records.
pub struct ReadThrough<'a> {
    executor: &'a FlushExecutor,
    pending: &'a DeltaAccumulator,
}

impl<'a> ReadThrough<'a> {
    pub fn new(executor: &'a FlushExecutor, pending: &'a DeltaAccumulator) -> Self {
        Self { executor, pending }
    }

    /// Stored numeric value (0 if absent) plus the pending delta.
    pub fn read(&self, key: &str) -> BatchResult<i64> {
        let record = self.executor.load(key)?;
        let stored = record
            .value
            .as_number()
            .ok_or_else(|| BatchError::NotNumeric { key: key.into() })?;
        stored
            .checked_add(self.pending.peek(key))
            .ok_or_else(|| BatchError::Overflow { key: key.into() })
    }

    /// The record a reader should see.
    ///
    /// - stored, nothing pending: the stored record as-is (text or number)
    /// - stored and pending: the numeric value merged with the delta
    /// - absent and pending: a new record holding the delta
    /// - absent, nothing pending: `None`
    pub fn read_record(&self, key: &str) -> BatchResult<Option<Record>> {
        let delta = self.pending.peek(key);
        let stored = self.executor.store().get_state(key)?;

        let record = match stored {
            Some(bytes) => Record::from_bytes(&bytes).map_err(|e| BatchError::Decode {
                key: key.into(),
                reason: e.to_string(),
            })?,
            None if delta == 0 => return Ok(None),
            None => Record::zeroed(self.executor.doc_type(), key),
        };
        if delta == 0 {
            return Ok(Some(record));
        }

        let base = record
            .value
            .as_number()
            .ok_or_else(|| BatchError::NotNumeric { key: key.into() })?;
        let value = base
            .checked_add(delta)
            .ok_or_else(|| BatchError::Overflow { key: key.into() })?;
        Ok(Some(Record {
            value: RecordValue::Number(value),
            ..record
        }))
    }
}
