//! Pluggable memory resources.
//!
//! Every dynamically-sized part of a parsed tree (string bytes, array
//! elements, object entries) is obtained from a [`MemoryResource`]. Three
//! strategies ship with the crate:
//!
//! - [`SystemResource`]: a passthrough to the global allocator.
//! - [`MonotonicResource`]: a bump allocator over a chain of growing blocks;
//!   deallocation is a no-op and everything is returned at once.
//! - [`PoolResource`]: power-of-two size classes with free lists, backed by
//!   an upstream resource.
//!
//! Resources are shared through [`Storage`], a reference-counted handle that
//! every container clones. The handle is neither `Send` nor `Sync`: a single
//! resource must never be used from two threads at once.

mod monotonic;
mod pool;
mod system;

use alloc::rc::Rc;
use core::{alloc::Layout, fmt, ops::Deref, ptr::NonNull};

pub use monotonic::MonotonicResource;
pub use pool::PoolResource;
pub use system::SystemResource;
use thiserror::Error;

/// The resource could not satisfy an allocation request.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[error("memory allocation failed")]
pub struct AllocError;

/// Identifies the strategy behind a [`MemoryResource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// [`SystemResource`].
    System,
    /// [`MonotonicResource`].
    Monotonic,
    /// [`PoolResource`].
    Pool,
    /// Any resource implemented outside this crate.
    Custom,
}

/// A polymorphic allocation strategy.
///
/// Implementations take `&self` and keep their bookkeeping in cells, because
/// a resource is shared by every node of the trees allocated from it.
pub trait MemoryResource {
    /// Allocates at least `layout.size()` bytes aligned to `layout.align()`.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] when the underlying allocator fails.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Returns memory to the resource.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by [`allocate`](Self::allocate) on this
    /// same resource with the same `layout`, and must not have been
    /// deallocated already.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// Whether memory allocated from `self` may be deallocated by `other`.
    fn is_equal(&self, other: &dyn MemoryResource) -> bool;

    /// The strategy implemented by this resource.
    fn kind(&self) -> ResourceKind {
        ResourceKind::Custom
    }

    /// `true` when [`deallocate`](Self::deallocate) does nothing, so callers
    /// may skip it entirely.
    fn is_deallocate_trivial(&self) -> bool {
        false
    }
}

/// A shared handle to a [`MemoryResource`].
///
/// Cloning the handle is cheap. Containers keep a clone, so the resource
/// stays alive until the last node allocated from it is dropped. The
/// lifetime `'r` bounds borrowed state inside the resource (for example the
/// caller-supplied buffer of a [`MonotonicResource`]); it is `'static` for
/// heap-only resources.
#[derive(Clone)]
pub struct Storage<'r> {
    resource: Rc<dyn MemoryResource + 'r>,
}

impl<'r> Storage<'r> {
    /// Moves `resource` into a new shared handle.
    pub fn new<R: MemoryResource + 'r>(resource: R) -> Self {
        Self {
            resource: Rc::new(resource),
        }
    }

    /// A handle to the global allocator.
    #[must_use]
    pub fn system() -> Self {
        Self::new(SystemResource)
    }

    /// Whether memory from `self` can be released through `other`.
    #[must_use]
    pub fn same_resource(&self, other: &Storage<'_>) -> bool {
        core::ptr::addr_eq(Rc::as_ptr(&self.resource), Rc::as_ptr(&other.resource))
            || self.resource.is_equal(&*other.resource)
    }
}

impl Default for Storage<'_> {
    fn default() -> Self {
        Self::system()
    }
}

impl<'r, R: MemoryResource + 'r> From<Rc<R>> for Storage<'r> {
    fn from(resource: Rc<R>) -> Self {
        Self { resource }
    }
}

impl<'r> Deref for Storage<'r> {
    type Target = dyn MemoryResource + 'r;

    fn deref(&self) -> &Self::Target {
        &*self.resource
    }
}

impl fmt::Debug for Storage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("kind", &self.resource.kind())
            .finish_non_exhaustive()
    }
}

/// A well-aligned, non-null pointer for zero-sized requests.
pub(crate) fn dangling(layout: Layout) -> NonNull<u8> {
    // `align` is a non-zero power of two.
    NonNull::new(core::ptr::without_provenance_mut(layout.align())).unwrap_or(NonNull::dangling())
}

/// Identity comparison between a concrete resource and a trait object.
pub(crate) fn same_object<T>(this: &T, other: &dyn MemoryResource) -> bool {
    core::ptr::addr_eq(this, other)
}
