use core::{alloc::Layout, cell::RefCell, fmt, marker::PhantomData, ptr::NonNull};

use log::debug;

use super::{AllocError, MemoryResource, ResourceKind, Storage, dangling, same_object};

/// Smallest dynamic block, whatever size the caller asks for.
const MIN_BLOCK_SIZE: usize = 1024;
/// Doubling stops here; larger blocks are only made for larger requests.
const MAX_BLOCK_SIZE: usize = 1 << 30;
/// Alignment of every dynamic block and of the data area behind its header.
const BLOCK_ALIGN: usize = 16;

#[repr(C)]
struct BlockHeader {
    next: Option<NonNull<BlockHeader>>,
    /// Total size of the upstream allocation, header included.
    size: usize,
}

const HEADER_SIZE: usize = size_of::<BlockHeader>().next_multiple_of(BLOCK_ALIGN);

/// The part of a block that allocations are bumped out of.
#[derive(Clone, Copy)]
struct Region {
    base: Option<NonNull<u8>>,
    len: usize,
    used: usize,
}

impl Region {
    const EMPTY: Region = Region {
        base: None,
        len: 0,
        used: 0,
    };

    fn bump(&mut self, layout: Layout) -> Option<NonNull<u8>> {
        let base = self.base?;
        // SAFETY: `used <= len`, so the cursor stays inside the region.
        let cursor = unsafe { base.as_ptr().add(self.used) };
        let start = self.used.checked_add(cursor.align_offset(layout.align()))?;
        let end = start.checked_add(layout.size())?;
        if end > self.len {
            return None;
        }
        self.used = end;
        // SAFETY: `start < end <= len`, inside the region.
        Some(unsafe { base.add(start) })
    }
}

struct Arena {
    region: Region,
    /// Most recently allocated block; each header links to the previous one.
    head: Option<NonNull<BlockHeader>>,
    next_size: usize,
    blocks: usize,
    bytes_allocated: usize,
}

/// A bump allocator over a chain of growing blocks.
///
/// Allocation advances a cursor through the current block, starting a new
/// block (at least twice the size of the previous one) when it runs out.
/// [`deallocate`](MemoryResource::deallocate) does nothing: memory is
/// returned all at once by [`release`](Self::release) or on drop, in time
/// linear in the number of blocks.
///
/// An optional caller-supplied buffer is used before any block is requested
/// from upstream. It is borrowed for `'buf` and never freed.
///
/// ```
/// use jsonarena::{MonotonicResource, Storage, parse_with};
///
/// let mut buffer = [0u8; 4096];
/// let storage = Storage::new(MonotonicResource::with_buffer(&mut buffer));
/// let value = parse_with(r#"{"k":[1,2,3]}"#, storage)?;
/// assert_eq!(value.to_string(), r#"{"k":[1,2,3]}"#);
/// # Ok::<(), jsonarena::ParserError>(())
/// ```
pub struct MonotonicResource<'buf> {
    arena: RefCell<Arena>,
    initial: Region,
    upstream: Storage<'buf>,
    _buffer: PhantomData<&'buf mut [u8]>,
}

impl MonotonicResource<'static> {
    /// A resource whose first block is 1024 bytes.
    ///
    /// Never allocates.
    #[must_use]
    pub fn new() -> Self {
        Self::with_initial_size(MIN_BLOCK_SIZE)
    }

    /// A resource whose first dynamic block holds at least `initial_size`
    /// bytes (never less than 1024).
    ///
    /// Never allocates.
    #[must_use]
    pub fn with_initial_size(initial_size: usize) -> Self {
        Self::with_upstream(initial_size, Storage::system())
    }
}

impl Default for MonotonicResource<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'buf> MonotonicResource<'buf> {
    /// Serves allocations from `buffer` first, then from the global
    /// allocator once it is exhausted.
    #[must_use]
    pub fn with_buffer(buffer: &'buf mut [u8]) -> Self {
        let mut resource = Self::with_upstream(MIN_BLOCK_SIZE, Storage::system());
        resource.initial = Region {
            base: NonNull::new(buffer.as_mut_ptr()),
            len: buffer.len(),
            used: 0,
        };
        resource.arena.get_mut().region = resource.initial;
        resource
    }

    /// Like [`with_initial_size`](MonotonicResource::with_initial_size), but
    /// blocks are requested from `upstream`.
    #[must_use]
    pub fn with_upstream(initial_size: usize, upstream: Storage<'buf>) -> Self {
        Self {
            arena: RefCell::new(Arena {
                region: Region::EMPTY,
                head: None,
                next_size: clamp_block_size(initial_size),
                blocks: 0,
                bytes_allocated: 0,
            }),
            initial: Region::EMPTY,
            upstream,
            _buffer: PhantomData,
        }
    }

    /// Raises the size of the first dynamic block.
    ///
    /// Has no effect once a block has been allocated, or when `size` is not
    /// larger than the current setting.
    pub fn reserve(&self, size: usize) {
        let mut arena = self.arena.borrow_mut();
        if arena.head.is_none() {
            arena.next_size = arena.next_size.max(clamp_block_size(size));
        }
    }

    /// Returns every dynamic block to upstream.
    ///
    /// The caller-supplied buffer, if any, becomes available again from its
    /// start. Only possible while no tree is borrowing the resource.
    pub fn release(&mut self) {
        let arena = self.arena.get_mut();
        let mut next = arena.head.take();
        let blocks = arena.blocks;
        while let Some(block) = next {
            // SAFETY: every header was written by `grow` and is freed once.
            unsafe {
                let BlockHeader { next: previous, size } = block.as_ptr().read();
                next = previous;
                self.upstream
                    .deallocate(block.cast(), Layout::from_size_align_unchecked(size, BLOCK_ALIGN));
            }
        }
        arena.region = self.initial;
        arena.blocks = 0;
        arena.bytes_allocated = 0;
        if blocks > 0 {
            debug!("monotonic resource released {blocks} blocks");
        }
    }

    /// Number of dynamic blocks currently held.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.arena.borrow().blocks
    }

    /// Total bytes handed out since construction or the last release.
    #[must_use]
    pub fn bytes_allocated(&self) -> usize {
        self.arena.borrow().bytes_allocated
    }

    fn grow(&self, arena: &mut Arena, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        let needed = layout
            .size()
            .checked_add(layout.align())
            .and_then(usize::checked_next_power_of_two)
            .ok_or(AllocError)?;
        let data_size = arena.next_size.max(needed);
        let total = HEADER_SIZE.checked_add(data_size).ok_or(AllocError)?;
        let block_layout = Layout::from_size_align(total, BLOCK_ALIGN).map_err(|_| AllocError)?;
        let raw = self.upstream.allocate(block_layout)?;

        let header = raw.cast::<BlockHeader>();
        // SAFETY: `raw` is a fresh allocation of `total >= HEADER_SIZE` bytes
        // aligned for `BlockHeader`.
        unsafe {
            header.as_ptr().write(BlockHeader {
                next: arena.head,
                size: total,
            });
        }
        arena.head = Some(header);
        arena.blocks += 1;
        arena.region = Region {
            // SAFETY: the data area starts right after the header.
            base: Some(unsafe { raw.add(HEADER_SIZE) }),
            len: data_size,
            used: 0,
        };
        arena.next_size = data_size.saturating_mul(2).min(MAX_BLOCK_SIZE).max(arena.next_size);
        debug!(
            "monotonic resource grew to {} blocks (new block {data_size} bytes)",
            arena.blocks
        );

        arena.region.bump(layout).ok_or(AllocError)
    }
}

fn clamp_block_size(size: usize) -> usize {
    size.clamp(MIN_BLOCK_SIZE, MAX_BLOCK_SIZE)
        .checked_next_power_of_two()
        .unwrap_or(MAX_BLOCK_SIZE)
}

impl MemoryResource for MonotonicResource<'_> {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            return Ok(dangling(layout));
        }
        let mut arena = self.arena.borrow_mut();
        let ptr = match arena.region.bump(layout) {
            Some(ptr) => ptr,
            None => self.grow(&mut arena, layout)?,
        };
        arena.bytes_allocated += layout.size();
        Ok(ptr)
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {}

    fn is_equal(&self, other: &dyn MemoryResource) -> bool {
        same_object(self, other)
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Monotonic
    }

    fn is_deallocate_trivial(&self) -> bool {
        true
    }
}

impl Drop for MonotonicResource<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for MonotonicResource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arena = self.arena.borrow();
        f.debug_struct("MonotonicResource")
            .field("blocks", &arena.blocks)
            .field("next_size", &arena.next_size)
            .field("bytes_allocated", &arena.bytes_allocated)
            .field("has_buffer", &self.initial.base.is_some())
            .finish()
    }
}
