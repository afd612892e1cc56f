//! In-memory world state for tests, the CLI, and the standalone server.
//!
//! [`InMemoryWorldState`] keeps records in a `BTreeMap` (so range scans come
//! out ordered) and per-key history in a `HashMap`, both behind one
//! `RwLock`. Scans materialize a snapshot, so iterators never observe
//! writes made after they were opened.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use sacc_types::{HistoryEntry, KeyValue, ResponseMetadata};
use tracing::debug;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::iter::{BoxedIter, VecIterator};
use crate::selector::Selector;
use crate::traits::WorldState;

#[derive(Default)]
struct StateInner {
    records: BTreeMap<String, Vec<u8>>,
    history: HashMap<String, Vec<HistoryEntry>>,
}

/// Injected failures, for exercising error paths.
#[derive(Default)]
struct Faults {
    fail_writes: HashSet<String>,
    fail_scans_after: Option<usize>,
}

/// An in-memory implementation of [`WorldState`].
///
/// Data is lost when the store is dropped.
pub struct InMemoryWorldState {
    inner: RwLock<StateInner>,
    faults: RwLock<Faults>,
    open_iterators: Arc<AtomicUsize>,
    puts: AtomicU64,
}

impl InMemoryWorldState {
    /// Create a new empty world state.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StateInner::default()),
            faults: RwLock::new(Faults::default()),
            open_iterators: Arc::new(AtomicUsize::new(0)),
            puts: AtomicU64::new(0),
        }
    }

    /// Number of live records.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read_inner()?.records.len())
    }

    /// Returns `true` if no records are stored.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Iterators handed out and not yet closed.
    pub fn open_iterators(&self) -> usize {
        self.open_iterators.load(Ordering::SeqCst)
    }

    /// Successful `put_state` calls since creation.
    pub fn put_count(&self) -> u64 {
        self.puts.load(Ordering::SeqCst)
    }

    /// Make every subsequent `put_state` on `key` fail.
    pub fn fail_writes_for(&self, key: impl Into<String>) {
        if let Ok(mut faults) = self.faults.write() {
            faults.fail_writes.insert(key.into());
        }
    }

    /// Make scan iterators fail after yielding `n` rows.
    pub fn fail_scans_after(&self, n: usize) {
        if let Ok(mut faults) = self.faults.write() {
            faults.fail_scans_after = Some(n);
        }
    }

    /// Remove all injected failures.
    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.faults.write() {
            *faults = Faults::default();
        }
    }

    fn read_inner(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, StateInner>> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write_inner(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, StateInner>> {
        self.inner.write().map_err(|_| StoreError::LockPoisoned)
    }

    fn iterator<T: Send + 'static>(&self, items: Vec<T>) -> BoxedIter<T> {
        let it = VecIterator::new(items, Arc::clone(&self.open_iterators));
        let fail_after = self.faults.read().ok().and_then(|f| f.fail_scans_after);
        match fail_after {
            Some(n) => Box::new(it.failing_after(n)),
            None => Box::new(it),
        }
    }

    fn range_rows(&self, start: &str, end: &str) -> StoreResult<Vec<KeyValue>> {
        if !start.is_empty() && !end.is_empty() && start > end {
            return Err(StoreError::Query(format!(
                "range start {start:?} sorts after end {end:?}"
            )));
        }
        let lower = if start.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Included(start.to_string())
        };
        let upper = if end.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Excluded(end.to_string())
        };
        let state = self.read_inner()?;
        Ok(state
            .records
            .range((lower, upper))
            .map(|(k, v)| KeyValue::new(k.clone(), v.clone()))
            .collect())
    }

    fn query_rows(&self, query: &str) -> StoreResult<Vec<KeyValue>> {
        let selector = Selector::parse(query)?;
        let state = self.read_inner()?;
        Ok(state
            .records
            .iter()
            .filter(|(_, v)| selector.matches(v))
            .map(|(k, v)| KeyValue::new(k.clone(), v.clone()))
            .collect())
    }

    fn paginate(
        &self,
        rows: Vec<KeyValue>,
        page_size: usize,
        bookmark: &str,
    ) -> StoreResult<(BoxedIter<KeyValue>, ResponseMetadata)> {
        if page_size == 0 {
            return Err(StoreError::InvalidArgument(
                "page size must be positive".into(),
            ));
        }
        let after = decode_bookmark(bookmark)?;
        let page: Vec<KeyValue> = rows
            .into_iter()
            .filter(|row| match after.as_deref() {
                Some(a) => row.key.as_str() > a,
                None => true,
            })
            .take(page_size)
            .collect();
        let next_bookmark = match page.last() {
            Some(last) => encode_bookmark(&last.key),
            None => bookmark.to_string(),
        };
        let metadata = ResponseMetadata {
            fetched_records_count: page.len(),
            bookmark: next_bookmark,
        };
        Ok((self.iterator(page), metadata))
    }
}

impl Default for InMemoryWorldState {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldState for InMemoryWorldState {
    fn get_state(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let state = self.read_inner()?;
        Ok(state.records.get(key).cloned())
    }

    fn put_state(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let injected = self
            .faults
            .read()
            .map(|f| f.fail_writes.contains(key))
            .unwrap_or(false);
        if injected {
            return Err(StoreError::backend(key, "injected write failure"));
        }

        let mut state = self.write_inner()?;
        state.records.insert(key.to_string(), value.to_vec());
        let entry = HistoryEntry::write(next_tx_id(), value.to_vec(), Utc::now());
        state.history.entry(key.to_string()).or_default().push(entry);
        self.puts.fetch_add(1, Ordering::SeqCst);
        debug!(key, bytes = value.len(), "state written");
        Ok(())
    }

    fn del_state(&self, key: &str) -> StoreResult<()> {
        let mut state = self.write_inner()?;
        if state.records.remove(key).is_some() {
            let entry = HistoryEntry::tombstone(next_tx_id(), Utc::now());
            state.history.entry(key.to_string()).or_default().push(entry);
            debug!(key, "state deleted");
        }
        Ok(())
    }

    fn get_state_by_range(&self, start: &str, end: &str) -> StoreResult<BoxedIter<KeyValue>> {
        let rows = self.range_rows(start, end)?;
        Ok(self.iterator(rows))
    }

    fn get_state_by_range_with_pagination(
        &self,
        start: &str,
        end: &str,
        page_size: usize,
        bookmark: &str,
    ) -> StoreResult<(BoxedIter<KeyValue>, ResponseMetadata)> {
        let rows = self.range_rows(start, end)?;
        self.paginate(rows, page_size, bookmark)
    }

    fn get_query_result(&self, query: &str) -> StoreResult<BoxedIter<KeyValue>> {
        let rows = self.query_rows(query)?;
        Ok(self.iterator(rows))
    }

    fn get_query_result_with_pagination(
        &self,
        query: &str,
        page_size: usize,
        bookmark: &str,
    ) -> StoreResult<(BoxedIter<KeyValue>, ResponseMetadata)> {
        let rows = self.query_rows(query)?;
        self.paginate(rows, page_size, bookmark)
    }

    fn get_history_for_key(&self, key: &str) -> StoreResult<BoxedIter<HistoryEntry>> {
        let state = self.read_inner()?;
        let entries = state.history.get(key).cloned().unwrap_or_default();
        drop(state);
        Ok(self.iterator(entries))
    }
}

impl std::fmt::Debug for InMemoryWorldState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryWorldState")
            .field("record_count", &self.len())
            .field("open_iterators", &self.open_iterators())
            .finish()
    }
}

fn next_tx_id() -> String {
    Uuid::now_v7().simple().to_string()
}

fn encode_bookmark(key: &str) -> String {
    hex::encode(key.as_bytes())
}

fn decode_bookmark(bookmark: &str) -> StoreResult<Option<String>> {
    if bookmark.is_empty() {
        return Ok(None);
    }
    let bytes = hex::decode(bookmark)
        .map_err(|_| StoreError::Query(format!("malformed bookmark: {bookmark}")))?;
    String::from_utf8(bytes)
        .map(Some)
        .map_err(|_| StoreError::Query(format!("malformed bookmark: {bookmark}")))
}
