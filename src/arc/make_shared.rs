use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::mem;
use std::ptr::NonNull;

use log::error;

use crate::arc::control_block::{ControlBlock, Storage};
use crate::arc::shared::SharedHandle;
use crate::error::HandleError;

/// Builds `Self` from a tuple of constructor arguments.
///
/// `make_shared` and the `make_shared!` macro accept any arity the payload
/// type implements this for; `()` through 4-tuples are the usual set.
pub trait Construct<Args>: Sized {
    fn construct(args: Args) -> Self;
}

impl<T: Default> Construct<()> for T {
    fn construct(_: ()) -> Self {
        T::default()
    }
}

impl<T> Construct<(T,)> for T {
    fn construct((value,): (T,)) -> Self {
        value
    }
}

/// Creates a `SharedHandle` whose payload is built from `args`, in a single
/// allocation shared with the control block.
///
/// ```
/// use shared_handle::{make_shared, Construct};
///
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// impl Construct<(i32, i32)> for Point {
///     fn construct((x, y): (i32, i32)) -> Self {
///         Point { x, y }
///     }
/// }
///
/// let point = make_shared::<Point, _>((1, 2));
/// let other = make_shared!(Point, 3, 4);
/// assert_eq!((point.x, other.y), (1, 4));
///
/// let zero = make_shared!(u32);
/// assert_eq!(*zero, 0);
/// ```
pub fn make_shared<T: Construct<A>, A>(args: A) -> SharedHandle<T> {
    make_shared_with(|| T::construct(args))
}

pub fn try_make_shared<T: Construct<A>, A>(args: A) -> Result<SharedHandle<T>, HandleError> {
    try_make_shared_with(|| T::construct(args))
}

/// Allocates the control block and payload storage together and builds the
/// payload in place from `init`.
///
/// Running out of memory is fatal here, as it is for `Box::new`.
pub fn make_shared_with<T, F: FnOnce() -> T>(init: F) -> SharedHandle<T> {
    let (base, layout, offset) = match allocate::<T>() {
        Ok(parts) => parts,
        Err(HandleError::AllocFailed { size, align }) => {
            error!("combined allocation of {} bytes (align {}) failed", size, align);
            // Safety: size and align were taken from a valid layout.
            handle_alloc_error(unsafe { Layout::from_size_align_unchecked(size, align) })
        }
        Err(err) => panic!("make_shared: {err}"),
    };
    unsafe { emplace(base, layout, offset, init) }
}

/// Like `make_shared_with`, but reports allocation failure instead of
/// aborting.
pub fn try_make_shared_with<T, F: FnOnce() -> T>(init: F) -> Result<SharedHandle<T>, HandleError> {
    let (base, layout, offset) = allocate::<T>()?;
    Ok(unsafe { emplace(base, layout, offset, init) })
}

/// Layout of a control block followed by its payload, plus the payload's
/// offset: the first multiple of `align_of::<T>()` past the header.
pub(crate) fn combined_layout<T>() -> Result<(Layout, usize), HandleError> {
    let (layout, offset) = Layout::new::<ControlBlock<T>>()
        .extend(Layout::new::<T>())
        .map_err(|_| HandleError::LayoutOverflow)?;
    Ok((layout.pad_to_align(), offset))
}

fn allocate<T>() -> Result<(NonNull<u8>, Layout, usize), HandleError> {
    let (layout, offset) = combined_layout::<T>()?;
    // Safety: the layout always contains the header, so it is never zero-sized.
    let base = unsafe { alloc(layout) };
    match NonNull::new(base) {
        Some(base) => Ok((base, layout, offset)),
        None => Err(HandleError::AllocFailed {
            size: layout.size(),
            align: layout.align(),
        }),
    }
}

/// Writes the payload at `base + offset` and the header at `base`.
///
/// Safety: `base` must be a fresh allocation of `layout`, as returned by
/// `allocate::<T>()` together with `offset`.
unsafe fn emplace<T, F: FnOnce() -> T>(
    base: NonNull<u8>,
    layout: Layout,
    offset: usize,
    init: F,
) -> SharedHandle<T> {
    // Releases the allocation if `init` panics.
    struct Unwind {
        base: NonNull<u8>,
        layout: Layout,
    }

    impl Drop for Unwind {
        fn drop(&mut self) {
            unsafe { dealloc(self.base.as_ptr(), self.layout) };
        }
    }

    let guard = Unwind { base, layout };
    let payload = unsafe { NonNull::new_unchecked(base.as_ptr().add(offset)) }.cast::<T>();
    unsafe { payload.as_ptr().write(init()) };
    mem::forget(guard);

    let block = base.cast::<ControlBlock<T>>();
    unsafe {
        block
            .as_ptr()
            .write(ControlBlock::header(payload, Storage::Embedded(layout)))
    };
    // Safety: the header was just written with one strong reference for us.
    unsafe { SharedHandle::from_block(block) }
}

/// Combined-allocation constructor with positional arguments.
///
/// `make_shared!(T)` builds from `()`, `make_shared!(T, a, b)` from `(a, b)`,
/// using `T`'s `Construct` impl for that arity.
#[macro_export]
macro_rules! make_shared {
    ($ty:ty) => {
        $crate::make_shared::<$ty, _>(())
    };
    ($ty:ty, $($arg:expr),+ $(,)?) => {
        $crate::make_shared::<$ty, _>(($($arg,)+))
    };
}
