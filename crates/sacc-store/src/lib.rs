//! World state adapter for the simple asset chaincode.
//!
//! The world state is the authoritative key-value store behind every
//! record. This crate defines the boundary the rest of the workspace codes
//! against and ships one backend.
//!
//! # Surface
//!
//! - point operations: get, put, delete
//! - ordered range scans over `[start, end)`
//! - rich (selector) queries, when the backend supports them
//! - bounded pages of either, resumed with an opaque bookmark
//! - tombstone-aware history of a key
//!
//! # Iterators
//!
//! Scans return a boxed [`StateIterator`]. Iterators hold backend resources
//! and must be closed on every exit path; wrap them in an [`IterGuard`],
//! which closes on drop.
//!
//! # Backends
//!
//! - [`InMemoryWorldState`] -- `BTreeMap`-based store for tests, the CLI, and
//!   the standalone server

pub mod error;
pub mod iter;
pub mod memory;
pub mod selector;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use iter::{BoxedIter, IterGuard, StateIterator, VecIterator};
pub use memory::InMemoryWorldState;
pub use selector::Selector;
pub use traits::WorldState;
