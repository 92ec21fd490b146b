// Under the `shuttle` feature every counter goes through shuttle's atomics so
// its scheduler can interleave the upgrade and last-drop paths. Those atomics
// only work inside `shuttle::check_*`, so that feature is for the shuttle
// tests alone.
#[cfg(not(feature = "shuttle"))]
pub use std::sync::atomic::{AtomicBool, AtomicUsize};

#[cfg(feature = "shuttle")]
pub use shuttle::sync::atomic::{AtomicBool, AtomicUsize};

pub use std::sync::atomic::Ordering;
