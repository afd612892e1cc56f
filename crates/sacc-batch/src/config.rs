use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::policy::{AnyOf, CountThreshold, FlushPolicy, IdleTimeout, MaxAge, ThresholdBasis};

/// Configuration for the update buffer's flush triggers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Pending count that forces a flush inside `record`.
    pub threshold: u64,
    /// Whether `threshold` counts distinct keys or operations.
    pub basis: ThresholdBasis,
    /// Flush after this many milliseconds without a new record; 0 disables.
    pub idle_flush_ms: u64,
    /// Flush once any key has been pending this many milliseconds; 0
    /// disables.
    pub max_age_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            threshold: 25,
            basis: ThresholdBasis::Keys,
            idle_flush_ms: 500,
            max_age_ms: 0,
        }
    }
}

impl BatchConfig {
    /// Count trigger only; time-based triggers disabled.
    pub fn count_only(threshold: u64) -> Self {
        Self {
            threshold,
            idle_flush_ms: 0,
            max_age_ms: 0,
            ..Default::default()
        }
    }

    pub fn idle_flush(&self) -> Option<Duration> {
        (self.idle_flush_ms > 0).then(|| Duration::from_millis(self.idle_flush_ms))
    }

    pub fn max_age(&self) -> Option<Duration> {
        (self.max_age_ms > 0).then(|| Duration::from_millis(self.max_age_ms))
    }

    /// Build the composite policy this configuration describes.
    pub fn build_policy(&self) -> Box<dyn FlushPolicy> {
        let count = CountThreshold {
            threshold: self.threshold.max(1),
            basis: self.basis,
        };
        let mut policy = AnyOf::new().with(count);
        if let Some(idle) = self.idle_flush() {
            policy = policy.with(IdleTimeout { idle });
        }
        if let Some(age) = self.max_age() {
            policy = policy.with(MaxAge { age });
        }
        Box::new(policy)
    }
}
