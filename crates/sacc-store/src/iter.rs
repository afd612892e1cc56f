//! The scan iterator contract and its scoped-close guard.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::error::{StoreError, StoreResult};

/// A cursor over scan results.
///
/// Implementations may hold backend resources (snapshots, connections), so
/// [`close`](Self::close) must run on every exit path. Closing twice is a
/// no-op.
pub trait StateIterator<T>: Send {
    /// Returns `true` while another item can be fetched.
    fn has_next(&self) -> bool;

    /// Fetch the next item. Fails if the scan breaks part-way, or with
    /// [`StoreError::IteratorExhausted`] when called past the end.
    fn next(&mut self) -> StoreResult<T>;

    /// Release the iterator's resources.
    fn close(&mut self) -> StoreResult<()>;
}

/// Boxed iterator as returned by [`WorldState`](crate::WorldState) scans.
pub type BoxedIter<T> = Box<dyn StateIterator<T>>;

/// Owns an iterator and closes it when dropped.
///
/// Use this instead of a raw [`BoxedIter`] so that `?` early returns and
/// panics still release the iterator. Implements [`Iterator`] over
/// `StoreResult<T>`.
pub struct IterGuard<T> {
    inner: Option<BoxedIter<T>>,
}

impl<T> IterGuard<T> {
    pub fn new(inner: BoxedIter<T>) -> Self {
        Self { inner: Some(inner) }
    }

    pub fn has_next(&self) -> bool {
        self.inner.as_ref().is_some_and(|it| it.has_next())
    }

    /// Close now and surface the close error, if any.
    pub fn close(mut self) -> StoreResult<()> {
        match self.inner.take() {
            Some(mut it) => it.close(),
            None => Ok(()),
        }
    }

    /// Drain every remaining item, then close.
    ///
    /// The first failing `next` aborts the drain; the iterator is still
    /// closed on the way out.
    pub fn collect_all(mut self) -> StoreResult<Vec<T>> {
        let mut items = Vec::new();
        for item in self.by_ref() {
            items.push(item?);
        }
        self.close()?;
        Ok(items)
    }
}

impl<T> Iterator for IterGuard<T> {
    type Item = StoreResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let it = self.inner.as_mut()?;
        if !it.has_next() {
            return None;
        }
        Some(it.next())
    }
}

impl<T> Drop for IterGuard<T> {
    fn drop(&mut self) {
        if let Some(mut it) = self.inner.take() {
            if let Err(e) = it.close() {
                warn!(error = %e, "failed to close state iterator");
            }
        }
    }
}

/// Iterator over a materialized snapshot.
///
/// Shares an open-iterator counter with the backend that created it; the
/// counter is decremented exactly once, on the first close.
pub struct VecIterator<T> {
    items: VecDeque<T>,
    open: Arc<AtomicUsize>,
    closed: bool,
    fail_after: Option<usize>,
    yielded: usize,
}

impl<T> VecIterator<T> {
    pub fn new(items: Vec<T>, open: Arc<AtomicUsize>) -> Self {
        open.fetch_add(1, Ordering::SeqCst);
        Self {
            items: items.into(),
            open,
            closed: false,
            fail_after: None,
            yielded: 0,
        }
    }

    /// Make `next` fail once `n` items have been yielded.
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }
}

impl<T: Send> StateIterator<T> for VecIterator<T> {
    fn has_next(&self) -> bool {
        !self.closed && !self.items.is_empty()
    }

    fn next(&mut self) -> StoreResult<T> {
        if self.closed {
            return Err(StoreError::IteratorExhausted);
        }
        if self.fail_after.is_some_and(|n| self.yielded >= n) {
            return Err(StoreError::Query(format!(
                "scan interrupted after {} rows",
                self.yielded
            )));
        }
        let item = self
            .items
            .pop_front()
            .ok_or(StoreError::IteratorExhausted)?;
        self.yielded += 1;
        Ok(item)
    }

    fn close(&mut self) -> StoreResult<()> {
        if !self.closed {
            self.closed = true;
            self.items.clear();
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[test]
    fn yields_in_order_then_exhausts() {
        let open = counter();
        let mut it = VecIterator::new(vec![1, 2], Arc::clone(&open));
        assert!(it.has_next());
        assert_eq!(it.next().unwrap(), 1);
        assert_eq!(it.next().unwrap(), 2);
        assert!(!it.has_next());
        assert_eq!(it.next(), Err(StoreError::IteratorExhausted));
        it.close().unwrap();
        assert_eq!(open.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn close_is_idempotent() {
        let open = counter();
        let mut it = VecIterator::new(vec![1], Arc::clone(&open));
        it.close().unwrap();
        it.close().unwrap();
        assert_eq!(open.load(Ordering::SeqCst), 0);
        assert!(!it.has_next());
    }

    #[test]
    fn guard_closes_on_drop() {
        let open = counter();
        {
            let guard = IterGuard::new(Box::new(VecIterator::new(vec![1, 2, 3], Arc::clone(&open))));
            assert!(guard.has_next());
            assert_eq!(open.load(Ordering::SeqCst), 1);
        }
        assert_eq!(open.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn collect_all_drains_and_closes() {
        let open = counter();
        let guard = IterGuard::new(Box::new(VecIterator::new(vec!["a", "b"], Arc::clone(&open))));
        assert_eq!(guard.collect_all().unwrap(), vec!["a", "b"]);
        assert_eq!(open.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn collect_all_closes_on_error_path() {
        let open = counter();
        let it = VecIterator::new(vec![1, 2, 3], Arc::clone(&open)).failing_after(1);
        let err = IterGuard::new(Box::new(it)).collect_all().unwrap_err();
        assert!(matches!(err, StoreError::Query(_)));
        assert_eq!(open.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn question_mark_early_return_still_closes() {
        fn first_two(open: &Arc<AtomicUsize>) -> StoreResult<Vec<i32>> {
            let it = VecIterator::new(vec![1, 2, 3], Arc::clone(open)).failing_after(1);
            let mut guard = IterGuard::new(Box::new(it));
            let mut out = Vec::new();
            for _ in 0..2 {
                let item = guard.next().ok_or(StoreError::IteratorExhausted)??;
                out.push(item);
            }
            Ok(out)
        }

        let open = counter();
        assert!(first_two(&open).is_err());
        assert_eq!(open.load(Ordering::SeqCst), 0);
    }
}
