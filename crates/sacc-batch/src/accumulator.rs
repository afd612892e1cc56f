//! In-memory delta accumulation.

use std::collections::HashMap;
use std::time::Instant;

use sacc_types::validate_key;

use crate::error::{BatchError, BatchResult};

/// Pending state for one key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingEntry {
    /// Sum of all deltas recorded since the key's last successful flush.
    pub delta: i64,
    /// Number of `record` calls folded into `delta`.
    pub ops: u64,
    /// When the key most recently became pending.
    pub first_recorded_at: Instant,
}

/// Key to pending delta, in first-seen order.
///
/// Not synchronized; [`UpdateBuffer`](crate::UpdateBuffer) owns one behind
/// a mutex.
///
/// Invariants, upheld by every method:
/// - a key is in `order` iff it has an entry, and every entry's delta is
///   non-zero;
/// - `order` has no duplicates;
/// - `pending_ops` equals the sum of the entries' `ops`.
#[derive(Debug, Default)]
pub struct DeltaAccumulator {
    entries: HashMap<String, PendingEntry>,
    order: Vec<String>,
    pending_ops: u64,
    last_recorded_at: Option<Instant>,
}

impl DeltaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `delta` into `key`'s pending sum and return the pending order.
    pub fn record(&mut self, key: &str, delta: i64) -> BatchResult<Vec<String>> {
        self.record_at(key, delta, Instant::now())
    }

    /// [`record`](Self::record) with an explicit clock reading.
    ///
    /// Validation happens before any mutation: an empty key or a sum that
    /// would overflow leaves the accumulator untouched. A sum that returns
    /// to exactly zero drops the key (and its operations) from the pending
    /// set; a zero delta on a non-pending key changes nothing.
    pub fn record_at(&mut self, key: &str, delta: i64, now: Instant) -> BatchResult<Vec<String>> {
        validate_key(key)?;

        let current = self.entries.get(key).copied();
        let sum = current
            .map_or(0, |e| e.delta)
            .checked_add(delta)
            .ok_or_else(|| BatchError::Validation(format!("pending delta for {key} would overflow")))?;

        match current {
            None if delta == 0 => {}
            None => {
                self.entries.insert(
                    key.to_string(),
                    PendingEntry {
                        delta: sum,
                        ops: 1,
                        first_recorded_at: now,
                    },
                );
                self.order.push(key.to_string());
                self.pending_ops += 1;
                self.last_recorded_at = Some(now);
            }
            Some(entry) if sum == 0 => {
                self.pending_ops -= entry.ops;
                self.remove_entry(key);
            }
            Some(entry) => {
                self.entries.insert(
                    key.to_string(),
                    PendingEntry {
                        delta: sum,
                        ops: entry.ops + 1,
                        ..entry
                    },
                );
                self.pending_ops += 1;
                self.last_recorded_at = Some(now);
            }
        }

        Ok(self.order.clone())
    }

    /// Fold every `(key, delta)` pair in, in order, or none of them.
    ///
    /// All keys and every running sum are checked before the first pair is
    /// applied, so a rejected batch leaves the accumulator untouched.
    pub fn record_all_at(
        &mut self,
        entries: &[(String, i64)],
        now: Instant,
    ) -> BatchResult<Vec<String>> {
        let mut sums: HashMap<&str, i64> = HashMap::new();
        for (key, delta) in entries {
            validate_key(key)?;
            let sum = sums.entry(key.as_str()).or_insert_with(|| self.peek(key));
            *sum = sum.checked_add(*delta).ok_or_else(|| {
                BatchError::Validation(format!("pending delta for {key} would overflow"))
            })?;
        }
        for (key, delta) in entries {
            self.record_at(key, *delta, now)?;
        }
        Ok(self.order.clone())
    }

    /// Pending delta for `key`, or 0.
    pub fn peek(&self, key: &str) -> i64 {
        self.entries.get(key).map_or(0, |e| e.delta)
    }

    pub fn entry(&self, key: &str) -> Option<&PendingEntry> {
        self.entries.get(key)
    }

    /// Pending keys in first-seen order.
    pub fn pending_order(&self) -> &[String] {
        &self.order
    }

    /// Pending keys with their deltas, in first-seen order.
    pub fn snapshot(&self) -> Vec<(String, i64)> {
        self.order
            .iter()
            .map(|k| (k.clone(), self.peek(k)))
            .collect()
    }

    /// Number of distinct pending keys.
    pub fn pending_keys(&self) -> usize {
        self.order.len()
    }

    /// Number of `record` calls folded into the pending set.
    pub fn pending_ops(&self) -> u64 {
        self.pending_ops
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// When the most recent delta was folded in, if anything is pending.
    pub fn last_recorded_at(&self) -> Option<Instant> {
        self.last_recorded_at
    }

    /// When the longest-waiting pending key became pending.
    pub fn oldest_pending_at(&self) -> Option<Instant> {
        self.order
            .first()
            .and_then(|k| self.entries.get(k))
            .map(|e| e.first_recorded_at)
    }

    /// Clear `key` after its write succeeded. Returns the settled entry.
    pub fn settle(&mut self, key: &str) -> Option<PendingEntry> {
        let entry = self.entries.get(key).copied()?;
        self.pending_ops -= entry.ops;
        self.remove_entry(key);
        Some(entry)
    }

    fn remove_entry(&mut self, key: &str) {
        self.entries.remove(key);
        self.order.retain(|k| k != key);
        if self.order.is_empty() {
            self.last_recorded_at = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use proptest::prelude::*;

    use super::*;

    // -----------------------------------------------------------------------
    // Coalescing
    // -----------------------------------------------------------------------

    #[test]
    fn coalesces_in_first_seen_order() {
        let mut acc = DeltaAccumulator::new();
        acc.record("apple", 3).unwrap();
        acc.record("banana", 1).unwrap();
        let order = acc.record("apple", 2).unwrap();

        assert_eq!(order, vec!["apple", "banana"]);
        assert_eq!(acc.peek("apple"), 5);
        assert_eq!(acc.peek("banana"), 1);
        assert_eq!(acc.pending_keys(), 2);
        assert_eq!(acc.pending_ops(), 3);
    }

    #[test]
    fn peek_absent_is_zero() {
        let acc = DeltaAccumulator::new();
        assert_eq!(acc.peek("nothing"), 0);
        assert!(acc.is_empty());
    }

    #[test]
    fn negative_deltas_accumulate() {
        let mut acc = DeltaAccumulator::new();
        acc.record("k", -4).unwrap();
        acc.record("k", 1).unwrap();
        assert_eq!(acc.peek("k"), -3);
    }

    #[test]
    fn sum_returning_to_zero_drops_key() {
        let mut acc = DeltaAccumulator::new();
        acc.record("a", 3).unwrap();
        acc.record("b", 1).unwrap();
        let order = acc.record("a", -3).unwrap();

        assert_eq!(order, vec!["b"]);
        assert!(acc.entry("a").is_none());
        assert_eq!(acc.pending_ops(), 1);
    }

    #[test]
    fn zero_delta_on_idle_key_is_noop() {
        let mut acc = DeltaAccumulator::new();
        let order = acc.record("a", 0).unwrap();
        assert!(order.is_empty());
        assert_eq!(acc.pending_ops(), 0);
        assert!(acc.last_recorded_at().is_none());
    }

    #[test]
    fn re_pending_key_moves_to_back() {
        let mut acc = DeltaAccumulator::new();
        acc.record("a", 1).unwrap();
        acc.record("b", 1).unwrap();
        acc.record("a", -1).unwrap();
        let order = acc.record("a", 2).unwrap();
        assert_eq!(order, vec!["b", "a"]);
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    #[test]
    fn empty_key_rejected_without_mutation() {
        let mut acc = DeltaAccumulator::new();
        acc.record("a", 1).unwrap();
        let err = acc.record("", 5).unwrap_err();
        assert!(matches!(err, BatchError::Validation(_)));
        assert_eq!(acc.pending_order(), ["a"]);
        assert_eq!(acc.pending_ops(), 1);
    }

    #[test]
    fn overflow_rejected_without_mutation() {
        let mut acc = DeltaAccumulator::new();
        acc.record("a", i64::MAX).unwrap();
        let err = acc.record("a", 1).unwrap_err();
        assert!(matches!(err, BatchError::Validation(_)));
        assert_eq!(acc.peek("a"), i64::MAX);
        assert_eq!(acc.pending_ops(), 1);
    }

    #[test]
    fn record_all_applies_in_order() {
        let mut acc = DeltaAccumulator::new();
        acc.record("b", 1).unwrap();
        let entries = vec![("a".to_string(), 2), ("b".to_string(), 3), ("a".to_string(), -1)];
        let order = acc.record_all_at(&entries, Instant::now()).unwrap();
        assert_eq!(order, vec!["b", "a"]);
        assert_eq!(acc.peek("a"), 1);
        assert_eq!(acc.peek("b"), 4);
        assert_eq!(acc.pending_ops(), 4);
    }

    #[test]
    fn record_all_overflow_records_nothing() {
        let mut acc = DeltaAccumulator::new();
        acc.record("z", 7).unwrap();
        let entries = vec![
            ("x".to_string(), 1),
            ("a".to_string(), i64::MAX),
            ("a".to_string(), 1),
        ];
        let err = acc.record_all_at(&entries, Instant::now()).unwrap_err();
        assert!(matches!(err, BatchError::Validation(_)));
        assert_eq!(acc.snapshot(), vec![("z".to_string(), 7)]);
        assert_eq!(acc.pending_ops(), 1);
    }

    #[test]
    fn record_all_checks_against_existing_pending() {
        let mut acc = DeltaAccumulator::new();
        acc.record("a", i64::MIN).unwrap();
        let entries = vec![("b".to_string(), 1), ("a".to_string(), -1)];
        assert!(acc.record_all_at(&entries, Instant::now()).is_err());
        assert_eq!(acc.peek("b"), 0);
        assert_eq!(acc.peek("a"), i64::MIN);
    }

    #[test]
    fn record_all_bad_key_records_nothing() {
        let mut acc = DeltaAccumulator::new();
        let entries = vec![("a".to_string(), 1), (String::new(), 1)];
        assert!(acc.record_all_at(&entries, Instant::now()).is_err());
        assert!(acc.is_empty());
    }

    // -----------------------------------------------------------------------
    // Settling and timing
    // -----------------------------------------------------------------------

    #[test]
    fn settle_clears_entry_and_ops() {
        let mut acc = DeltaAccumulator::new();
        acc.record("a", 1).unwrap();
        acc.record("a", 1).unwrap();
        acc.record("b", 1).unwrap();

        let settled = acc.settle("a").unwrap();
        assert_eq!(settled.delta, 2);
        assert_eq!(settled.ops, 2);
        assert_eq!(acc.peek("a"), 0);
        assert_eq!(acc.pending_order(), ["b"]);
        assert_eq!(acc.pending_ops(), 1);
        assert!(acc.settle("a").is_none());
    }

    #[test]
    fn tracks_oldest_and_latest() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(10);
        let t2 = t0 + Duration::from_millis(20);
        let mut acc = DeltaAccumulator::new();
        acc.record_at("a", 1, t0).unwrap();
        acc.record_at("b", 1, t1).unwrap();
        acc.record_at("a", 1, t2).unwrap();

        assert_eq!(acc.oldest_pending_at(), Some(t0));
        assert_eq!(acc.last_recorded_at(), Some(t2));

        acc.settle("a");
        assert_eq!(acc.oldest_pending_at(), Some(t1));
        acc.settle("b");
        assert_eq!(acc.oldest_pending_at(), None);
        assert_eq!(acc.last_recorded_at(), None);
    }

    #[test]
    fn snapshot_pairs_keys_with_deltas() {
        let mut acc = DeltaAccumulator::new();
        acc.record("x", 2).unwrap();
        acc.record("y", -1).unwrap();
        assert_eq!(
            acc.snapshot(),
            vec![("x".to_string(), 2), ("y".to_string(), -1)]
        );
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    proptest! {
        #[test]
        fn delta_is_sum_of_records(deltas in proptest::collection::vec(-1_000i64..1_000, 1..50)) {
            let mut acc = DeltaAccumulator::new();
            for d in &deltas {
                acc.record("k", *d).unwrap();
            }
            let sum: i64 = deltas.iter().sum();
            prop_assert_eq!(acc.peek("k"), sum);
            prop_assert_eq!(acc.pending_order().contains(&"k".to_string()), sum != 0);
        }

        #[test]
        fn order_is_deduplicated_first_seen(
            ops in proptest::collection::vec((0usize..6, 1i64..10), 1..60)
        ) {
            let keys = ["a", "b", "c", "d", "e", "f"];
            let mut acc = DeltaAccumulator::new();
            let mut first_seen: Vec<&str> = Vec::new();
            for (i, d) in &ops {
                acc.record(keys[*i], *d).unwrap();
                if !first_seen.contains(&keys[*i]) {
                    first_seen.push(keys[*i]);
                }
            }
            prop_assert_eq!(acc.pending_order(), first_seen.as_slice());
            prop_assert_eq!(acc.pending_ops(), ops.len() as u64);
        }
    }
}
