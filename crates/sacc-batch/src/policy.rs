//! Flush triggers.
//!
//! A policy is a pure predicate over [`PendingStats`]. The buffer evaluates
//! it after every `record` and whenever `flush_if_due` is called, so
//! count-based and time-based triggers plug in without touching the
//! accumulator or the executor.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::accumulator::DeltaAccumulator;

/// What the policy gets to look at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PendingStats {
    pub pending_keys: usize,
    pub pending_ops: u64,
    /// Time since the newest pending record, if anything is pending.
    pub since_last_record: Option<Duration>,
    /// Time since the longest-waiting key became pending.
    pub since_oldest_pending: Option<Duration>,
}

impl PendingStats {
    pub fn observe(acc: &DeltaAccumulator, now: Instant) -> Self {
        Self {
            pending_keys: acc.pending_keys(),
            pending_ops: acc.pending_ops(),
            since_last_record: acc
                .last_recorded_at()
                .map(|t| now.saturating_duration_since(t)),
            since_oldest_pending: acc
                .oldest_pending_at()
                .map(|t| now.saturating_duration_since(t)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending_keys == 0
    }
}

/// Decides when accumulated state must be committed.
pub trait FlushPolicy: Send + Sync + fmt::Debug {
    fn should_flush(&self, stats: &PendingStats) -> bool;
}

/// Which counter a [`CountThreshold`] compares.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdBasis {
    /// Distinct pending keys.
    #[default]
    Keys,
    /// `record` calls folded into the pending set.
    Operations,
}

/// Flush once the pending count reaches `threshold`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CountThreshold {
    pub threshold: u64,
    pub basis: ThresholdBasis,
}

impl CountThreshold {
    /// Count distinct keys. A zero threshold is raised to 1.
    pub fn keys(threshold: u64) -> Self {
        Self {
            threshold: threshold.max(1),
            basis: ThresholdBasis::Keys,
        }
    }

    /// Count operations. A zero threshold is raised to 1.
    pub fn operations(threshold: u64) -> Self {
        Self {
            threshold: threshold.max(1),
            basis: ThresholdBasis::Operations,
        }
    }

    pub fn should_flush_count(&self, pending_count: u64) -> bool {
        pending_count >= self.threshold
    }
}

impl FlushPolicy for CountThreshold {
    fn should_flush(&self, stats: &PendingStats) -> bool {
        let count = match self.basis {
            ThresholdBasis::Keys => stats.pending_keys as u64,
            ThresholdBasis::Operations => stats.pending_ops,
        };
        self.should_flush_count(count)
    }
}

/// Flush when nothing has been recorded for `idle`.
///
/// Every record pushes the deadline back, like a debounce timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdleTimeout {
    pub idle: Duration,
}

impl FlushPolicy for IdleTimeout {
    fn should_flush(&self, stats: &PendingStats) -> bool {
        stats.since_last_record.is_some_and(|d| d >= self.idle)
    }
}

/// Flush when any pending key has waited for `age`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaxAge {
    pub age: Duration,
}

impl FlushPolicy for MaxAge {
    fn should_flush(&self, stats: &PendingStats) -> bool {
        stats.since_oldest_pending.is_some_and(|d| d >= self.age)
    }
}

/// Never triggers; flushes happen only when asked for.
#[derive(Clone, Copy, Debug, Default)]
pub struct ManualOnly;

impl FlushPolicy for ManualOnly {
    fn should_flush(&self, _stats: &PendingStats) -> bool {
        false
    }
}

/// Triggers when any member triggers.
#[derive(Debug, Default)]
pub struct AnyOf {
    policies: Vec<Box<dyn FlushPolicy>>,
}

impl AnyOf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, policy: impl FlushPolicy + 'static) -> Self {
        self.policies.push(Box::new(policy));
        self
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl FlushPolicy for AnyOf {
    fn should_flush(&self, stats: &PendingStats) -> bool {
        self.policies.iter().any(|p| p.should_flush(stats))
    }
}
