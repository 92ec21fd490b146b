//! Atomically reference-counted shared ownership with weak observers.
//!
//! A [`SharedHandle`] owns its payload together with every other handle
//! cloned from it; the payload is destroyed exactly once, by whichever thread
//! drops the last one. A [`WeakHandle`] keeps only the bookkeeping alive and
//! can be promoted back with [`WeakHandle::lock`] for as long as the payload
//! exists.
//!
//! Handles are created either by wrapping an existing boxed value
//! ([`SharedHandle::new`], [`SharedHandle::from_box`]) or through the combined
//! allocation path ([`make_shared`], [`make_shared_with`], [`make_shared!`])
//! which places the bookkeeping and the payload in one allocation.
//!
//! The handles only manage the lifetime of the pointer relationship. Access to
//! the payload's contents is not synchronized; wrap the payload in a lock if
//! it needs mutation from several threads.

mod arc;
mod error;
mod sync;

pub use arc::{
    make_shared, make_shared_with, try_make_shared, try_make_shared_with, Construct,
    SharedHandle, WeakHandle,
};
pub use error::HandleError;
