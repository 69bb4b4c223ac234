//! Monotonic sequence numbers for probes and incarnations.

use std::sync::atomic::{AtomicU64, Ordering};

/// A thread/task-safe monotonically increasing counter.
///
/// Starts at 0; the first call to [`SequenceGenerator::increment`] returns
/// 1. Wraps on overflow rather than saturating: saturating would silently
/// stop producing unique values under sustained load, while wrapping only
/// risks an ancient id reappearing after 2^64 operations, which is
/// acceptable given probe waiters and incarnation entries are short-lived.
#[derive(Debug, Default)]
pub struct SequenceGenerator {
    value: AtomicU64,
}

impl SequenceGenerator {
    /// Create a new generator starting at 0.
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    /// Produce the next value in the sequence.
    pub fn increment(&self) -> u64 {
        self.value.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
    }

    /// Read the current value without advancing it.
    pub fn current(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_value_is_one() {
        let seq = SequenceGenerator::new();
        assert_eq!(seq.increment(), 1);
        assert_eq!(seq.increment(), 2);
    }

    #[test]
    fn wraps_on_overflow() {
        let seq = SequenceGenerator {
            value: AtomicU64::new(u64::MAX),
        };
        assert_eq!(seq.increment(), 0);
    }
}
