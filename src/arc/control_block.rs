use std::alloc::{dealloc, Layout};
use std::ptr::{self, NonNull};

use log::trace;

use crate::arc::atomic_counter::AtomicCounter;
use crate::sync::AtomicBool;
use crate::sync::Ordering::SeqCst;

/// Where the payload lives relative to its control block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Storage {
    /// The payload shares one allocation of this layout with the block.
    Embedded(Layout),
    /// The payload is a separate `Box<T>`, and so is the block.
    External,
}

/// Lifetime bookkeeping shared by every handle descended from one root.
///
/// `strong` counts `SharedHandle`s. `weak` counts `WeakHandle`s plus one unit
/// held on behalf of all strong handles together, so the block outlives the
/// payload for as long as anyone can still ask whether it expired.
pub(crate) struct ControlBlock<T> {
    payload: NonNull<T>,
    strong: AtomicCounter,
    weak: AtomicCounter,
    expired: AtomicBool,
    storage: Storage,
}

impl<T> ControlBlock<T> {
    /// The header of a fresh block: one strong handle, one phantom weak unit.
    pub(crate) fn header(payload: NonNull<T>, storage: Storage) -> Self {
        Self {
            payload,
            strong: AtomicCounter::new(1),
            weak: AtomicCounter::new(1),
            expired: AtomicBool::new(false),
            storage,
        }
    }

    /// Takes ownership of an already boxed payload and boxes a block for it.
    pub(crate) fn new_external(payload: Box<T>) -> NonNull<Self> {
        let payload = NonNull::from(Box::leak(payload));
        NonNull::from(Box::leak(Box::new(Self::header(payload, Storage::External))))
    }

    pub(crate) fn payload(&self) -> NonNull<T> {
        self.payload
    }

    #[cfg(test)]
    pub(crate) fn storage(&self) -> Storage {
        self.storage
    }

    pub(crate) fn strong_count(&self) -> usize {
        self.strong.load()
    }

    pub(crate) fn weak_count(&self) -> usize {
        self.weak.load()
    }

    pub(crate) fn is_expired(&self) -> bool {
        self.expired.load(SeqCst)
    }

    /// Only valid while the caller already holds a strong reference, which
    /// rules out a concurrent strong->0 transition.
    pub(crate) fn try_increment_strong(&self) -> bool {
        self.strong.increment();
        true
    }

    /// Takes a strong reference only if the payload is still alive.
    ///
    /// Liveness check and increment are one compare-exchange, so a concurrent
    /// last drop either happens before (and we fail) or after (and it is not
    /// the last drop any more). Returns the new strong count on success.
    pub(crate) fn try_upgrade(&self) -> Option<usize> {
        let mut current = self.strong.load();
        loop {
            if current == 0 {
                return None;
            }
            if current > usize::MAX / 2 {
                std::process::abort();
            }
            match self.strong.compare_exchange(current, current + 1) {
                Ok(_) => return Some(current + 1),
                Err(observed) => current = observed,
            }
        }
    }

    /// Succeeds even after expiry: a weak handle stays a valid handle.
    pub(crate) fn increment_weak(&self) {
        self.weak.increment();
    }

    /// Releases one strong reference. The thread that takes `strong` to zero
    /// destroys the payload and then gives up the phantom weak unit.
    ///
    /// # Safety
    ///
    /// `this` must point to a live block and the caller must own one of its
    /// strong references, which is consumed.
    pub(crate) unsafe fn decrement_strong(this: NonNull<Self>) {
        let block = unsafe { this.as_ref() };
        if block.strong.decrement() != 0 {
            return;
        }
        block.expired.store(true, SeqCst);
        // Safety: strong just reached zero on this thread and never rises from
        // zero again, so nothing else can reach the payload.
        unsafe { block.destroy_payload() };
        trace!("payload destroyed ({:?} storage)", block.storage);
        // Now that there are no strong handles left, drop the phantom weak
        // unit that represented all of them.
        unsafe { Self::decrement_weak(this) };
    }

    /// Releases one weak reference, freeing the block when it was the last.
    ///
    /// # Safety
    ///
    /// `this` must point to a live block and the caller must own one of its
    /// weak references (or the phantom unit), which is consumed.
    pub(crate) unsafe fn decrement_weak(this: NonNull<Self>) {
        let block = unsafe { this.as_ref() };
        // While any strong handle exists the phantom unit keeps this above
        // zero, so a zero here implies expiry.
        if block.weak.decrement() == 0 && block.is_expired() {
            unsafe { Self::free(this) };
        }
    }

    unsafe fn destroy_payload(&self) {
        match self.storage {
            Storage::Embedded(_) => unsafe { ptr::drop_in_place(self.payload.as_ptr()) },
            Storage::External => {
                drop(unsafe { Box::from_raw(self.payload.as_ptr()) });
                #[cfg(test)]
                crate::arc::test_support::record_region_released();
            }
        }
    }

    unsafe fn free(this: NonNull<Self>) {
        let storage = unsafe { this.as_ref() }.storage;
        match storage {
            Storage::Embedded(layout) => unsafe {
                // The payload is already gone; only the header needs dropping
                // before the whole combined region is released in one go.
                ptr::drop_in_place(this.as_ptr());
                dealloc(this.as_ptr().cast::<u8>(), layout);
            },
            Storage::External => drop(unsafe { Box::from_raw(this.as_ptr()) }),
        }
        #[cfg(test)]
        crate::arc::test_support::record_region_released();
        trace!("control block freed ({:?} storage)", storage);
    }
}
