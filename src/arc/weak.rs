use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;

use crate::arc::control_block::ControlBlock;
use crate::arc::shared::SharedHandle;

/// Non-owning observer of a `SharedHandle`'s payload.
///
/// Keeps the control block, not the payload, alive. Use `lock` to get a
/// strong handle back while the payload still exists.
pub struct WeakHandle<T> {
    block: Option<NonNull<ControlBlock<T>>>,
    _marker: PhantomData<ControlBlock<T>>,
}

unsafe impl<T: Send + Sync> Send for WeakHandle<T> {}

unsafe impl<T: Send + Sync> Sync for WeakHandle<T> {}

impl<T> WeakHandle<T> {
    pub const fn null() -> Self {
        Self {
            block: None,
            _marker: PhantomData,
        }
    }

    fn control(&self) -> Option<&ControlBlock<T>> {
        // Safety: our weak reference keeps the block allocated.
        self.block.map(|block| unsafe { &*block.as_ptr() })
    }

    pub fn is_null(&self) -> bool {
        self.block.is_none()
    }

    /// Whether the payload still existed at the moment of the check.
    pub fn is_valid(&self) -> bool {
        self.control().is_some_and(|block| !block.is_expired())
    }

    /// Returns a strong handle to the payload, or a null handle if it has
    /// already been destroyed.
    pub fn lock(&self) -> SharedHandle<T> {
        let Some(block) = self.block else {
            return SharedHandle::null();
        };
        match unsafe { block.as_ref() }.try_upgrade() {
            // Safety: try_upgrade took the strong reference we hand over.
            Some(_) => unsafe { SharedHandle::from_block(block) },
            None => SharedHandle::null(),
        }
    }

    pub fn upgrade(&self) -> Option<SharedHandle<T>> {
        let shared = self.lock();
        (!shared.is_null()).then_some(shared)
    }

    /// Strong handles currently alive; 0 once expired or for a null handle.
    pub fn use_count(&self) -> usize {
        self.control().map_or(0, ControlBlock::strong_count)
    }

    /// Weak handles sharing this block, excluding the unit held by strong
    /// handles while any exist. A racy snapshot.
    pub fn weak_count(&self) -> usize {
        self.control().map_or(0, |block| {
            let weak = block.weak_count();
            if block.is_expired() {
                weak
            } else {
                weak.saturating_sub(1)
            }
        })
    }

    pub fn assign(&mut self, other: &Self) {
        let mut incoming = other.clone();
        mem::swap(&mut self.block, &mut incoming.block);
    }

    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.block == other.block
    }
}

impl<T> From<&SharedHandle<T>> for WeakHandle<T> {
    fn from(shared: &SharedHandle<T>) -> Self {
        let block = shared.block();
        if let Some(block) = block {
            unsafe { block.as_ref() }.increment_weak();
        }
        Self {
            block,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for WeakHandle<T> {
    fn clone(&self) -> Self {
        if let Some(block) = self.control() {
            block.increment_weak();
        }
        Self {
            block: self.block,
            _marker: PhantomData,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.assign(source);
    }
}

impl<T> Drop for WeakHandle<T> {
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            // Safety: this handle owned one weak reference.
            unsafe { ControlBlock::decrement_weak(block) };
        }
    }
}

impl<T> Default for WeakHandle<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> fmt::Debug for WeakHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("WeakHandle(null)");
        }
        f.debug_struct("WeakHandle")
            .field("valid", &self.is_valid())
            .finish()
    }
}
