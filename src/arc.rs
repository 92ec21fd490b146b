mod atomic_counter;
mod control_block;
mod make_shared;
mod shared;
mod weak;

#[cfg(test)]
mod stress;
#[cfg(test)]
mod test_support;

pub use make_shared::{make_shared, make_shared_with, try_make_shared, try_make_shared_with, Construct};
pub use shared::SharedHandle;
pub use weak::WeakHandle;
