use sacc_types::{HistoryEntry, KeyValue, ResponseMetadata};

use crate::error::{StoreError, StoreResult};
use crate::iter::BoxedIter;

/// The world state: authoritative key-value storage for records.
///
/// All implementations must satisfy these invariants:
/// - Point operations are individually durable and consistent; there is no
///   multi-key transaction at this boundary.
/// - Range scans are ordered by key and cover `[start, end)`; an empty
///   bound is unbounded on that side.
/// - Every put and delete appends to the key's history, deletes as
///   tombstones.
/// - Returned iterators are snapshots; later writes do not affect them.
/// - All backend errors are propagated, never silently ignored.
pub trait WorldState: Send + Sync {
    /// Read the bytes stored under `key`.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    fn get_state(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Create or overwrite `key`.
    fn put_state(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Remove `key`. Deleting an absent key is a no-op.
    fn del_state(&self, key: &str) -> StoreResult<()>;

    /// Ordered scan over `[start, end)`.
    fn get_state_by_range(&self, start: &str, end: &str) -> StoreResult<BoxedIter<KeyValue>>;

    /// One page of a range scan. The page holds at most `page_size` rows,
    /// starting after the row named by `bookmark`.
    fn get_state_by_range_with_pagination(
        &self,
        start: &str,
        end: &str,
        page_size: usize,
        bookmark: &str,
    ) -> StoreResult<(BoxedIter<KeyValue>, ResponseMetadata)>;

    /// Ad hoc query in the backend's query syntax.
    ///
    /// Backends without rich query support keep the default, which returns
    /// [`StoreError::NotSupported`].
    fn get_query_result(&self, _query: &str) -> StoreResult<BoxedIter<KeyValue>> {
        Err(StoreError::NotSupported("rich query"))
    }

    /// One page of an ad hoc query.
    fn get_query_result_with_pagination(
        &self,
        _query: &str,
        _page_size: usize,
        _bookmark: &str,
    ) -> StoreResult<(BoxedIter<KeyValue>, ResponseMetadata)> {
        Err(StoreError::NotSupported("paginated rich query"))
    }

    /// Every committed mutation of `key`, oldest first.
    fn get_history_for_key(&self, key: &str) -> StoreResult<BoxedIter<HistoryEntry>>;
}
