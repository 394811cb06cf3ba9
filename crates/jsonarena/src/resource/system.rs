use core::{alloc::Layout, ptr::NonNull};

use super::{AllocError, MemoryResource, ResourceKind, dangling};

/// Passthrough to the global allocator.
///
/// Stateless: every `SystemResource` can free memory allocated by any other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemResource;

impl MemoryResource for SystemResource {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            return Ok(dangling(layout));
        }
        // SAFETY: `layout` has a non-zero size.
        let ptr = unsafe { alloc::alloc::alloc(layout) };
        NonNull::new(ptr).ok_or(AllocError)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }
        // SAFETY: the caller guarantees `ptr` came from `allocate` with `layout`.
        unsafe { alloc::alloc::dealloc(ptr.as_ptr(), layout) }
    }

    fn is_equal(&self, other: &dyn MemoryResource) -> bool {
        other.kind() == ResourceKind::System
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::System
    }
}
