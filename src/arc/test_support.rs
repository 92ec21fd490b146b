use std::cell::Cell;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::Arc;

/// Payload that counts how many times it has been dropped.
pub(crate) struct DropCounter {
    drops: Arc<AtomicUsize>,
}

impl DropCounter {
    pub(crate) fn new() -> (Self, Arc<AtomicUsize>) {
        let drops = Arc::new(AtomicUsize::new(0));
        (
            Self {
                drops: drops.clone(),
            },
            drops,
        )
    }

    pub(crate) fn with_counter(drops: &Arc<AtomicUsize>) -> Self {
        Self {
            drops: drops.clone(),
        }
    }
}

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Relaxed);
    }
}

thread_local! {
    static RELEASED_REGIONS: Cell<usize> = const { Cell::new(0) };
}

/// Called by the control block each time it hands a region back to the
/// allocator: an external payload box, a block box, or a combined region.
pub(crate) fn record_region_released() {
    RELEASED_REGIONS.with(|count| count.set(count.get() + 1));
}

/// Regions released so far on the calling thread.
pub(crate) fn released_regions() -> usize {
    RELEASED_REGIONS.with(Cell::get)
}
