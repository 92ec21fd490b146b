use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::Deref;
use std::ptr::{self, NonNull};

use crate::arc::control_block::ControlBlock;
use crate::arc::weak::WeakHandle;
use crate::error::HandleError;

/// Shared ownership of a heap value.
///
/// Every live, non-null `SharedHandle` counts once towards its block's strong
/// count. The payload is destroyed when the last of them is dropped. A null
/// handle owns nothing and panics on dereference.
pub struct SharedHandle<T> {
    block: Option<NonNull<ControlBlock<T>>>,
    _marker: PhantomData<ControlBlock<T>>,
}

unsafe impl<T: Send + Sync> Send for SharedHandle<T> {}

unsafe impl<T: Send + Sync> Sync for SharedHandle<T> {}

impl<T> SharedHandle<T> {
    pub const fn null() -> Self {
        Self {
            block: None,
            _marker: PhantomData,
        }
    }

    /// Boxes `value` and wraps it. The control block is allocated separately;
    /// use `make_shared_with` for a single allocation.
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }

    pub fn from_box(value: Box<T>) -> Self {
        // Safety: a freshly created block holds exactly one strong reference.
        unsafe { Self::from_block(ControlBlock::new_external(value)) }
    }

    /// Takes ownership of a raw pointer obtained from `Box::into_raw`.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `Box::<T>::into_raw` and must not be owned by
    /// anything else. A null `ptr` yields a null handle.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        if ptr.is_null() {
            return Self::null();
        }
        Self::from_box(unsafe { Box::from_raw(ptr) })
    }

    /// Adopts one strong reference the caller already owns.
    pub(crate) unsafe fn from_block(block: NonNull<ControlBlock<T>>) -> Self {
        Self {
            block: Some(block),
            _marker: PhantomData,
        }
    }

    pub(crate) fn block(&self) -> Option<NonNull<ControlBlock<T>>> {
        self.block
    }

    fn control(&self) -> Option<&ControlBlock<T>> {
        // Safety: while we hold a strong reference the block is alive.
        self.block.map(|block| unsafe { &*block.as_ptr() })
    }

    pub fn is_null(&self) -> bool {
        self.block.is_none()
    }

    /// Returns the payload.
    ///
    /// # Panics
    ///
    /// Panics if the handle is null.
    pub fn get(&self) -> &T {
        match self.try_get() {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    pub fn try_get(&self) -> Result<&T, HandleError> {
        let block = self.control().ok_or(HandleError::NullHandle)?;
        // Safety: the payload lives as long as any strong reference does.
        Ok(unsafe { block.payload().as_ref() })
    }

    /// Address of the payload, or null for a null handle.
    pub fn as_ptr(&self) -> *const T {
        match self.control() {
            Some(block) => block.payload().as_ptr(),
            None => ptr::null(),
        }
    }

    /// Number of strong handles sharing the payload; 0 for a null handle.
    ///
    /// A snapshot: other threads may change it before the caller looks.
    pub fn use_count(&self) -> usize {
        self.control().map_or(0, ControlBlock::strong_count)
    }

    pub fn unique(&self) -> bool {
        self.use_count() == 1
    }

    /// Number of weak handles, not counting the unit held by the strong
    /// handles. Diagnostic only.
    pub fn weak_count(&self) -> usize {
        self.control().map_or(0, |block| block.weak_count() - 1)
    }

    pub fn downgrade(&self) -> WeakHandle<T> {
        WeakHandle::from(self)
    }

    /// Makes `self` share `other`'s payload.
    ///
    /// The new reference is taken before the old one is released, so
    /// assigning a handle to itself (or to a copy of itself) is harmless.
    pub fn assign(&mut self, other: &Self) {
        let mut incoming = other.clone();
        self.swap(&mut incoming);
    }

    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.block, &mut other.block);
    }

    /// Releases this handle's reference, leaving it null.
    pub fn reset(&mut self) {
        drop(mem::take(self));
    }

    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.block == other.block
    }
}

impl<T> Clone for SharedHandle<T> {
    fn clone(&self) -> Self {
        if let Some(block) = self.control() {
            // We hold a strong reference, so the block cannot be expired.
            block.try_increment_strong();
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

impl<T> Drop for SharedHandle<T> {
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            // Safety: this handle owned one strong reference.
            unsafe { ControlBlock::decrement_strong(block) };
        }
    }
}

impl<T> Deref for SharedHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.get()
    }
}

impl<T> Default for SharedHandle<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> From<Box<T>> for SharedHandle<T> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_get() {
            Ok(value) => f
                .debug_struct("SharedHandle")
                .field("value", value)
                .field("use_count", &self.use_count())
                .finish(),
            Err(_) => f.write_str("SharedHandle(null)"),
        }
    }
}
