use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use sacc_store::WorldState;
use sacc_types::Record;
use tracing::debug;

use crate::accumulator::DeltaAccumulator;
use crate::config::BatchConfig;
use crate::error::{BatchError, BatchResult};
use crate::executor::{FlushExecutor, FlushReport};
use crate::policy::{FlushPolicy, PendingStats};
use crate::read_through::ReadThrough;

/// What a `record` call did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordOutcome {
    /// Pending order when `record` returned (after any triggered flush).
    pub pending_order: Vec<String>,
    /// The flush this call triggered, if the policy fired.
    pub flush: Option<FlushReport>,
}

/// The update buffer: accumulator, policy, executor and read-through
/// behind a single mutex.
///
/// One instance is created per process and shared by reference (usually an
/// `Arc`) with every invocation. The lock is held across the coalescing
/// step, the policy check and any flush it triggers, so concurrent callers
/// are serialized and a reader never sees a half-applied flush of a key.
pub struct UpdateBuffer {
    state: Mutex<DeltaAccumulator>,
    executor: FlushExecutor,
    policy: Box<dyn FlushPolicy>,
    flushes: AtomicU64,
}

impl UpdateBuffer {
    pub fn new(store: Arc<dyn WorldState>, doc_type: impl Into<String>, config: &BatchConfig) -> Self {
        Self::with_policy(store, doc_type, config.build_policy())
    }

    pub fn with_policy(
        store: Arc<dyn WorldState>,
        doc_type: impl Into<String>,
        policy: Box<dyn FlushPolicy>,
    ) -> Self {
        Self {
            state: Mutex::new(DeltaAccumulator::new()),
            executor: FlushExecutor::new(store, doc_type),
            policy,
            flushes: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> BatchResult<MutexGuard<'_, DeltaAccumulator>> {
        self.state.lock().map_err(|_| BatchError::LockPoisoned)
    }

    /// Fold `delta` into `key`, then flush if the policy says so.
    ///
    /// A triggered flush completes before this returns. Its per-key
    /// failures are reported in the outcome, not as an error: the delta was
    /// recorded either way.
    pub fn record(&self, key: &str, delta: i64) -> BatchResult<RecordOutcome> {
        let mut acc = self.lock()?;
        let now = Instant::now();
        let pending_order = acc.record_at(key, delta, now)?;
        debug!(key, delta, pending = pending_order.len(), "delta recorded");

        if self.policy.should_flush(&PendingStats::observe(&acc, now)) {
            let report = self.run_flush(&mut acc);
            return Ok(RecordOutcome {
                pending_order: acc.pending_order().to_vec(),
                flush: Some(report),
            });
        }
        Ok(RecordOutcome {
            pending_order,
            flush: None,
        })
    }

    /// Record every `(key, delta)` pair, then flush, under one lock.
    ///
    /// The pairs are validated together first: an invalid key or a pending
    /// sum that would overflow rejects the whole batch with nothing
    /// recorded. No other caller can interleave between recording and the
    /// flush.
    pub fn record_all_and_flush(&self, entries: &[(String, i64)]) -> BatchResult<FlushReport> {
        let mut acc = self.lock()?;
        let pending = acc.record_all_at(entries, Instant::now())?;
        debug!(entries = entries.len(), pending = pending.len(), "batch recorded");
        Ok(self.run_flush(&mut acc))
    }

    /// Run `op` with the buffer locked and, if it succeeds, drop `key`'s
    /// pending delta. Returns `op`'s value and the discarded delta.
    ///
    /// A flush cannot run between `op` and the discard, so a key removed
    /// from the world state by `op` is not recreated from its old delta.
    pub fn discard_with<T, E>(
        &self,
        key: &str,
        op: impl FnOnce() -> Result<T, E>,
    ) -> Result<(T, i64), E>
    where
        E: From<BatchError>,
    {
        let mut acc = self.lock()?;
        let value = op()?;
        let dropped = acc.settle(key).map_or(0, |entry| entry.delta);
        if dropped != 0 {
            debug!(key, dropped, "pending delta discarded");
        }
        Ok((value, dropped))
    }

    /// Pending delta for `key`, or 0.
    pub fn peek(&self, key: &str) -> BatchResult<i64> {
        Ok(self.lock()?.peek(key))
    }

    /// Flush everything pending now, regardless of policy.
    pub fn flush(&self) -> BatchResult<FlushReport> {
        let mut acc = self.lock()?;
        Ok(self.run_flush(&mut acc))
    }

    /// Flush only if the policy fires for the current clock reading.
    ///
    /// Drives time-based triggers from outside a `record` call.
    pub fn flush_if_due(&self) -> BatchResult<Option<FlushReport>> {
        self.flush_if_due_at(Instant::now())
    }

    pub fn flush_if_due_at(&self, now: Instant) -> BatchResult<Option<FlushReport>> {
        let mut acc = self.lock()?;
        let stats = PendingStats::observe(&acc, now);
        if stats.is_empty() || !self.policy.should_flush(&stats) {
            return Ok(None);
        }
        Ok(Some(self.run_flush(&mut acc)))
    }

    /// Stored value plus pending delta.
    pub fn read(&self, key: &str) -> BatchResult<i64> {
        let acc = self.lock()?;
        ReadThrough::new(&self.executor, &acc).read(key)
    }

    /// The record as a reader should see it; see [`ReadThrough::read_record`].
    pub fn read_record(&self, key: &str) -> BatchResult<Option<Record>> {
        let acc = self.lock()?;
        ReadThrough::new(&self.executor, &acc).read_record(key)
    }

    /// Pending keys with their deltas, in flush order.
    pub fn snapshot(&self) -> BatchResult<Vec<(String, i64)>> {
        Ok(self.lock()?.snapshot())
    }

    /// Current pending counters.
    pub fn stats(&self) -> BatchResult<PendingStats> {
        Ok(PendingStats::observe(&*self.lock()?, Instant::now()))
    }

    /// Non-empty flush passes run so far.
    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn policy(&self) -> &dyn FlushPolicy {
        self.policy.as_ref()
    }

    fn run_flush(&self, acc: &mut DeltaAccumulator) -> FlushReport {
        let report = self.executor.flush(acc);
        if !report.is_empty() {
            self.flushes.fetch_add(1, Ordering::SeqCst);
        }
        report
    }
}

impl std::fmt::Debug for UpdateBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateBuffer")
            .field("executor", &self.executor)
            .field("policy", &self.policy)
            .field("flushes", &self.flush_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sacc_store::InMemoryWorldState;

    use super::*;
    use crate::policy::{CountThreshold, IdleTimeout, ManualOnly};

    fn buffer(policy: Box<dyn FlushPolicy>) -> (Arc<InMemoryWorldState>, UpdateBuffer) {
        let store = Arc::new(InMemoryWorldState::new());
        let buf = UpdateBuffer::with_policy(store.clone(), "asset", policy);
        (store, buf)
    }

    #[test]
    fn below_threshold_stays_buffered() {
        let (store, buf) = buffer(Box::new(CountThreshold::keys(3)));
        let out = buf.record("a", 1).unwrap();
        assert!(out.flush.is_none());
        assert_eq!(out.pending_order, vec!["a"]);
        assert_eq!(store.put_count(), 0);
        assert_eq!(buf.read("a").unwrap(), 1);
    }

    #[test]
    fn threshold_flushes_before_record_returns() {
        let (store, buf) = buffer(Box::new(CountThreshold::keys(2)));
        buf.record("a", 1).unwrap();
        let out = buf.record("b", 1).unwrap();

        let report = out.flush.expect("threshold should trigger a flush");
        assert_eq!(report.committed_keys(), vec!["a", "b"]);
        assert!(out.pending_order.is_empty());
        assert_eq!(store.put_count(), 2);
        assert_eq!(buf.peek("a").unwrap(), 0);
        assert_eq!(buf.flush_count(), 1);
    }

    #[test]
    fn operations_basis_counts_repeats() {
        let (store, buf) = buffer(Box::new(CountThreshold::operations(3)));
        buf.record("a", 1).unwrap();
        buf.record("a", 1).unwrap();
        let out = buf.record("a", 1).unwrap();
        assert!(out.flush.is_some());
        assert_eq!(store.put_count(), 1);
        assert_eq!(buf.read("a").unwrap(), 3);
    }

    #[test]
    fn second_flush_is_a_noop() {
        let (store, buf) = buffer(Box::new(ManualOnly));
        buf.record("a", 2).unwrap();
        assert_eq!(buf.flush().unwrap().committed_keys(), vec!["a"]);
        let writes = store.put_count();
        assert!(buf.flush().unwrap().is_empty());
        assert_eq!(store.put_count(), writes);
        assert_eq!(buf.flush_count(), 1);
    }

    #[test]
    fn idle_trigger_fires_only_when_due() {
        let (store, buf) = buffer(Box::new(IdleTimeout {
            idle: Duration::from_millis(500),
        }));
        buf.record("a", 1).unwrap();
        let now = Instant::now();
        assert!(buf.flush_if_due_at(now).unwrap().is_none());
        let report = buf
            .flush_if_due_at(now + Duration::from_secs(1))
            .unwrap()
            .expect("idle window elapsed");
        assert_eq!(report.committed_keys(), vec!["a"]);
        assert_eq!(store.put_count(), 1);
        assert!(buf
            .flush_if_due_at(now + Duration::from_secs(2))
            .unwrap()
            .is_none());
    }

    #[test]
    fn validation_failure_leaves_buffer_unchanged() {
        let (_store, buf) = buffer(Box::new(ManualOnly));
        buf.record("a", 1).unwrap();
        assert!(matches!(buf.record("", 1), Err(BatchError::Validation(_))));
        assert_eq!(buf.snapshot().unwrap(), vec![("a".to_string(), 1)]);
    }

    #[test]
    fn record_all_and_flush_commits_together() {
        let (store, buf) = buffer(Box::new(ManualOnly));
        buf.record("b", 1).unwrap();
        let entries = vec![("a".to_string(), 2), ("b".to_string(), 3)];
        let report = buf.record_all_and_flush(&entries).unwrap();
        assert_eq!(report.committed_keys(), vec!["b", "a"]);
        assert_eq!(buf.read("b").unwrap(), 4);
        assert_eq!(store.put_count(), 2);
        assert!(buf.snapshot().unwrap().is_empty());
    }

    #[test]
    fn rejected_batch_leaves_buffer_and_store_alone() {
        let (store, buf) = buffer(Box::new(ManualOnly));
        let entries = vec![("a".to_string(), i64::MAX), ("a".to_string(), 1)];
        assert!(matches!(
            buf.record_all_and_flush(&entries),
            Err(BatchError::Validation(_))
        ));
        assert!(buf.snapshot().unwrap().is_empty());
        assert_eq!(store.put_count(), 0);
        assert_eq!(buf.flush_count(), 0);
    }

    #[test]
    fn discard_with_drops_delta_only_on_success() {
        let (_store, buf) = buffer(Box::new(ManualOnly));
        buf.record("a", 5).unwrap();

        let failed: Result<((), i64), BatchError> =
            buf.discard_with("a", || Err(BatchError::Validation("no".into())));
        assert!(failed.is_err());
        assert_eq!(buf.peek("a").unwrap(), 5);

        let (value, dropped) = buf.discard_with("a", || Ok::<_, BatchError>(7)).unwrap();
        assert_eq!((value, dropped), (7, 5));
        assert_eq!(buf.peek("a").unwrap(), 0);
        assert!(buf.stats().unwrap().is_empty());
    }

    #[test]
    fn triggered_flush_failure_is_reported_not_raised() {
        let (store, buf) = buffer(Box::new(CountThreshold::keys(2)));
        store.fail_writes_for("a");
        buf.record("a", 1).unwrap();
        let out = buf.record("b", 1).unwrap();
        let report = out.flush.unwrap();
        assert_eq!(report.failed[0].key, "a");
        assert_eq!(out.pending_order, vec!["a"]);
        assert_eq!(buf.peek("a").unwrap(), 1);
    }

    #[test]
    fn read_record_sees_pending() {
        let (_store, buf) = buffer(Box::new(ManualOnly));
        buf.record("n", 4).unwrap();
        let record = buf.read_record("n").unwrap().unwrap();
        assert_eq!(record.value, sacc_types::RecordValue::Number(4));
        assert!(buf.read_record("other").unwrap().is_none());
    }

    #[test]
    fn concurrent_records_are_serialized() {
        use std::thread;

        let store = Arc::new(InMemoryWorldState::new());
        let buf = Arc::new(UpdateBuffer::new(
            store.clone(),
            "asset",
            &BatchConfig::count_only(4),
        ));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let buf = Arc::clone(&buf);
                thread::spawn(move || {
                    for i in 0..250 {
                        let key = format!("k{}", (t + i) % 6);
                        buf.record(&key, 1).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread should not panic");
        }

        let total: i64 = (0..6).map(|k| buf.read(&format!("k{k}")).unwrap()).sum();
        assert_eq!(total, 8 * 250);
        buf.flush().unwrap();
        let stored: i64 = (0..6).map(|k| buf.read(&format!("k{k}")).unwrap()).sum();
        assert_eq!(stored, 8 * 250);
    }

    mod props {
        use proptest::prelude::*;

        use super::*;

        fn key_strategy() -> impl Strategy<Value = String> {
            prop::sample::select(vec!["a", "b", "c", "d"]).prop_map(String::from)
        }

        proptest! {
            #[test]
            fn reads_equal_recorded_sums_across_flushes(
                ops in prop::collection::vec((key_strategy(), -5i64..=5, any::<bool>()), 1..60),
                threshold in 1u64..5,
            ) {
                let store = Arc::new(InMemoryWorldState::new());
                store.fail_writes_for("d");
                let buf = UpdateBuffer::with_policy(
                    store.clone(),
                    "asset",
                    Box::new(CountThreshold::keys(threshold)),
                );
                let mut expected = std::collections::HashMap::new();

                for (key, delta, flush) in &ops {
                    buf.record(key, *delta).unwrap();
                    *expected.entry(key.clone()).or_insert(0i64) += delta;
                    if *flush {
                        buf.flush().unwrap();
                    }
                    prop_assert!(buf.stats().unwrap().pending_keys < threshold as usize
                        || buf.snapshot().unwrap().iter().any(|(k, _)| k == "d"));
                }
                for (key, sum) in &expected {
                    prop_assert_eq!(buf.read(key).unwrap(), *sum);
                }

                store.clear_faults();
                let report = buf.flush().unwrap();
                prop_assert!(report.is_complete());
                prop_assert!(buf.snapshot().unwrap().is_empty());
                for (key, sum) in &expected {
                    prop_assert_eq!(buf.read(key).unwrap(), *sum);
                }
            }
        }
    }
}
