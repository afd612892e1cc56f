//! Write-coalescing update buffer.
//!
//! Many small per-key increments are absorbed in memory and committed to
//! the world state as infrequent, coalesced writes.
//!
//! # Pieces
//!
//! - [`DeltaAccumulator`] -- key to pending signed delta, plus the
//!   first-seen pending order and a pending-operation count
//! - [`FlushPolicy`] -- replaceable predicate deciding when to commit
//!   ([`CountThreshold`], [`IdleTimeout`], [`MaxAge`], [`AnyOf`])
//! - [`FlushExecutor`] -- applies pending deltas key by key, in order
//! - [`ReadThrough`] -- stored value merged with the pending delta
//! - [`UpdateBuffer`] -- all of the above behind one mutex
//!
//! # Rules
//!
//! 1. A key is pending iff its accumulated delta is non-zero.
//! 2. A key's entry is reset only when that key's write succeeds.
//! 3. Flushes have no cross-key atomicity: a failed key stays pending,
//!    keys already written stay written.
//! 4. Buffered deltas are not durable; a crash before flush loses them.

pub mod accumulator;
pub mod buffer;
pub mod config;
pub mod error;
pub mod executor;
pub mod policy;
pub mod read_through;

pub use accumulator::{DeltaAccumulator, PendingEntry};
pub use buffer::{RecordOutcome, UpdateBuffer};
pub use config::BatchConfig;
pub use error::{BatchError, BatchResult};
pub use executor::{CommittedKey, FlushExecutor, FlushFailure, FlushReport};
pub use policy::{
    AnyOf, CountThreshold, FlushPolicy, IdleTimeout, ManualOnly, MaxAge, PendingStats,
    ThresholdBasis,
};
pub use read_through::ReadThrough;
