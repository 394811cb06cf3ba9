use core::{alloc::Layout, cell::Cell, fmt, ptr::NonNull};

use log::trace;

use super::{AllocError, MemoryResource, ResourceKind, Storage, dangling, same_object};

/// log2 of the smallest size class.
const MIN_CLASS_SHIFT: u32 = 4;
const CLASS_COUNT: usize = 9;
/// Requests above this size bypass the free lists.
const MAX_CLASS_SIZE: usize = 1 << (MIN_CLASS_SHIFT as usize + CLASS_COUNT - 1);
/// Alignment of every pooled block; stricter requests bypass the pool.
const POOL_ALIGN: usize = 16;

/// Link stored inside a block while it sits on a free list.
struct FreeBlock {
    next: Option<NonNull<FreeBlock>>,
}

/// A size-class allocator that recycles freed blocks.
///
/// Requests are rounded up to a power of two between 16 and 4096 bytes.
/// Freed blocks go back on the free list of their class and are handed out
/// again before anything new is requested from upstream. Blocks are never
/// split or merged. Larger or over-aligned requests go straight to upstream.
pub struct PoolResource<'u> {
    upstream: Storage<'u>,
    free: [Cell<Option<NonNull<FreeBlock>>>; CLASS_COUNT],
    free_blocks: Cell<usize>,
    upstream_allocations: Cell<usize>,
}

impl PoolResource<'static> {
    /// A pool over the global allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::with_upstream(Storage::system())
    }
}

impl Default for PoolResource<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'u> PoolResource<'u> {
    /// A pool that requests new blocks from `upstream`.
    #[must_use]
    pub fn with_upstream(upstream: Storage<'u>) -> Self {
        Self {
            upstream,
            free: [const { Cell::new(None) }; CLASS_COUNT],
            free_blocks: Cell::new(0),
            upstream_allocations: Cell::new(0),
        }
    }

    /// Number of blocks waiting on the free lists.
    #[must_use]
    pub fn free_blocks(&self) -> usize {
        self.free_blocks.get()
    }

    /// Number of allocations forwarded to upstream so far.
    #[must_use]
    pub fn upstream_allocations(&self) -> usize {
        self.upstream_allocations.get()
    }

    fn class_of(layout: Layout) -> Option<usize> {
        if layout.align() > POOL_ALIGN || layout.size() > MAX_CLASS_SIZE {
            return None;
        }
        let size = layout.size().max(1 << MIN_CLASS_SHIFT).next_power_of_two();
        Some((size.trailing_zeros() - MIN_CLASS_SHIFT) as usize)
    }

    fn class_layout(class: usize) -> Layout {
        // SAFETY: power-of-two alignment, size far below `isize::MAX`.
        unsafe { Layout::from_size_align_unchecked(1 << (class + MIN_CLASS_SHIFT as usize), POOL_ALIGN) }
    }

    fn upstream_allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        let ptr = self.upstream.allocate(layout)?;
        self.upstream_allocations.set(self.upstream_allocations.get() + 1);
        Ok(ptr)
    }
}

impl MemoryResource for PoolResource<'_> {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            return Ok(dangling(layout));
        }
        let Some(class) = Self::class_of(layout) else {
            return self.upstream_allocate(layout);
        };
        match self.free[class].get() {
            Some(block) => {
                // SAFETY: blocks on a free list hold a valid link.
                self.free[class].set(unsafe { block.as_ref().next });
                self.free_blocks.set(self.free_blocks.get() - 1);
                trace!("pool reused a {}-byte block", Self::class_layout(class).size());
                Ok(block.cast())
            }
            None => self.upstream_allocate(Self::class_layout(class)),
        }
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }
        let Some(class) = Self::class_of(layout) else {
            // SAFETY: oversized blocks came straight from upstream with `layout`.
            unsafe { self.upstream.deallocate(ptr, layout) };
            return;
        };
        let block = ptr.cast::<FreeBlock>();
        // SAFETY: the block is at least 16 bytes, 16-aligned, and no longer in
        // use by the caller.
        unsafe {
            block.as_ptr().write(FreeBlock {
                next: self.free[class].get(),
            });
        }
        self.free[class].set(Some(block));
        self.free_blocks.set(self.free_blocks.get() + 1);
    }

    fn is_equal(&self, other: &dyn MemoryResource) -> bool {
        same_object(self, other)
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Pool
    }
}

impl Drop for PoolResource<'_> {
    fn drop(&mut self) {
        for (class, head) in self.free.iter().enumerate() {
            let mut next = head.take();
            while let Some(block) = next {
                // SAFETY: free-listed blocks are owned by the pool and were
                // allocated from upstream with the class layout.
                unsafe {
                    next = block.as_ref().next;
                    self.upstream.deallocate(block.cast(), Self::class_layout(class));
                }
            }
        }
        self.free_blocks.set(0);
    }
}

impl fmt::Debug for PoolResource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolResource")
            .field("free_blocks", &self.free_blocks.get())
            .field("upstream_allocations", &self.upstream_allocations.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(size: usize) -> Layout {
        Layout::from_size_align(size, 8).unwrap()
    }

    #[test]
    fn size_classes_round_up() {
        assert_eq!(PoolResource::class_of(layout(1)), Some(0));
        assert_eq!(PoolResource::class_of(layout(16)), Some(0));
        assert_eq!(PoolResource::class_of(layout(17)), Some(1));
        assert_eq!(PoolResource::class_of(layout(4096)), Some(8));
        assert_eq!(PoolResource::class_of(layout(4097)), None);
        assert_eq!(
            PoolResource::class_of(Layout::from_size_align(32, 64).unwrap()),
            None
        );
    }

    #[test]
    fn freed_blocks_are_reused_within_their_class() {
        let pool = PoolResource::new();
        let a = pool.allocate(layout(24)).unwrap();
        unsafe { pool.deallocate(a, layout(24)) };
        assert_eq!(pool.free_blocks(), 1);

        // A different class does not take the freed block.
        let b = pool.allocate(layout(100)).unwrap();
        assert_ne!(a, b);
        assert_eq!(pool.upstream_allocations(), 2);

        // Same class (17..=32 bytes) does.
        let c = pool.allocate(layout(30)).unwrap();
        assert_eq!(a, c);
        assert_eq!(pool.free_blocks(), 0);
        assert_eq!(pool.upstream_allocations(), 2);

        unsafe {
            pool.deallocate(b, layout(100));
            pool.deallocate(c, layout(30));
        }
        assert_eq!(pool.free_blocks(), 2);
    }

    #[test]
    fn oversized_requests_pass_through() {
        let pool = PoolResource::new();
        let big = layout(10_000);
        let ptr = pool.allocate(big).unwrap();
        unsafe { pool.deallocate(ptr, big) };
        assert_eq!(pool.free_blocks(), 0);
        assert_eq!(pool.upstream_allocations(), 1);
    }
}
