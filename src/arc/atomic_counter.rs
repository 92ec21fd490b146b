use crate::sync::AtomicUsize;
use crate::sync::Ordering::SeqCst;

/// Word-sized counter whose every access is sequentially consistent.
///
/// Exactly-once destruction depends on all threads agreeing on the order of
/// the strong and weak transitions, so no weaker ordering is offered.
pub(crate) struct AtomicCounter {
    value: AtomicUsize,
}

impl AtomicCounter {
    pub(crate) fn new(value: usize) -> Self {
        Self {
            value: AtomicUsize::new(value),
        }
    }

    /// Returns the value after the increment.
    pub(crate) fn increment(&self) -> usize {
        let previous = self.value.fetch_add(1, SeqCst);
        if previous > usize::MAX / 2 {
            std::process::abort();
        }
        previous + 1
    }

    /// Returns the value after the decrement.
    pub(crate) fn decrement(&self) -> usize {
        let previous = self.value.fetch_sub(1, SeqCst);
        if previous == 0 {
            panic!("attempted to decrement a counter of 0 {:p}", self);
        }
        previous - 1
    }

    pub(crate) fn load(&self) -> usize {
        self.value.load(SeqCst)
    }

    /// Overwrites the count. Handles never reset a live count, so only tests
    /// use this to stage a counter in a given state.
    #[cfg(test)]
    pub(crate) fn store(&self, value: usize) {
        self.value.store(value, SeqCst);
    }

    /// On failure the error carries the value actually observed, so a retry
    /// loop can continue without another load.
    pub(crate) fn compare_exchange(&self, expected: usize, desired: usize) -> Result<usize, usize> {
        self.value.compare_exchange(expected, desired, SeqCst, SeqCst)
    }
}
