//! Reloadable handles for process-wide configuration.
//!
//! The rule set and pricing table are loaded once at startup and read by
//! every concurrent evaluation. Evaluations take an `Arc` snapshot at call
//! start and never observe a mid-call swap; `reload` is the one writer and
//! lives off the hot path.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use verdict_core::{PricingTable, RuleSet};

/// An atomically-swappable, generation-counted configuration value.
pub struct Reloadable<T> {
    current: RwLock<Arc<T>>,
    generation: AtomicU64,
}

impl<T> Reloadable<T> {
    pub fn new(initial: T) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
            generation: AtomicU64::new(1),
        }
    }

    /// Snapshot the current value. The returned `Arc` stays valid across a
    /// concurrent reload; callers pin one snapshot per evaluation.
    pub fn snapshot(&self) -> Arc<T> {
        self.current.read().clone()
    }

    /// Swap in a new value and return the new generation number.
    pub fn reload(&self, value: T) -> u64 {
        *self.current.write() = Arc::new(value);
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// How many times the value has been loaded (1 = initial load).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

pub type SharedRules = Reloadable<RuleSet>;
pub type SharedPricing = Reloadable<PricingTable>;

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_core::RuleSet;

    #[test]
    fn test_snapshot_survives_reload() {
        let shared = SharedRules::new(RuleSet::builtin());
        let before = shared.snapshot();
        assert_eq!(shared.generation(), 1);

        let generation = shared.reload(RuleSet::empty());
        assert_eq!(generation, 2);

        // The old snapshot is untouched; new snapshots see the swap.
        assert!(!before.is_empty());
        assert!(shared.snapshot().is_empty());
    }

    #[test]
    fn test_generation_counts_loads() {
        let shared = SharedPricing::new(PricingTable::builtin());
        shared.reload(PricingTable::builtin());
        shared.reload(PricingTable::builtin());
        assert_eq!(shared.generation(), 3);
    }
}
