//! A growable buffer whose memory comes from a [`Storage`] handle.

use core::{alloc::Layout, fmt, marker::PhantomData, ptr, ptr::NonNull, slice};

use crate::resource::{AllocError, Storage};

/// A minimal `Vec` that allocates through a memory resource.
///
/// Growth is fallible: every operation that may allocate returns
/// [`AllocError`] instead of aborting. Old buffers are handed back to the
/// resource unless its deallocation is trivial.
pub(crate) struct StorageVec<'r, T> {
    ptr: NonNull<T>,
    len: usize,
    cap: usize,
    storage: Storage<'r>,
    _owns: PhantomData<T>,
}

impl<'r, T> StorageVec<'r, T> {
    const MIN_CAPACITY: usize = if size_of::<T>() == 1 { 8 } else { 4 };

    /// An empty vector; does not allocate.
    pub(crate) fn new(storage: Storage<'r>) -> Self {
        Self {
            ptr: NonNull::dangling(),
            len: 0,
            cap: 0,
            storage,
            _owns: PhantomData,
        }
    }

    /// A vector with room for exactly `capacity` elements.
    pub(crate) fn with_capacity(capacity: usize, storage: Storage<'r>) -> Result<Self, AllocError> {
        let mut vec = Self::new(storage);
        if capacity > 0 {
            vec.grow_to(capacity)?;
        }
        Ok(vec)
    }

    pub(crate) fn storage(&self) -> &Storage<'r> {
        &self.storage
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn as_slice(&self) -> &[T] {
        // SAFETY: the first `len` slots are initialized; `ptr` is dangling
        // but aligned when `len == 0`.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Removes and returns the last element.
    pub(crate) fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        // SAFETY: slot `len` was initialized and is now outside the live
        // range, so it is read exactly once.
        Some(unsafe { self.ptr.as_ptr().add(self.len).read() })
    }

    /// Ensures room for `additional` more elements.
    pub(crate) fn try_reserve(&mut self, additional: usize) -> Result<(), AllocError> {
        let required = self.len.checked_add(additional).ok_or(AllocError)?;
        if required <= self.cap {
            return Ok(());
        }
        let doubled = self.cap.saturating_mul(2);
        self.grow_to(required.max(doubled).max(Self::MIN_CAPACITY))
    }

    /// Appends `value`; on failure the value is dropped and the vector is
    /// unchanged.
    pub(crate) fn push(&mut self, value: T) -> Result<(), AllocError> {
        self.try_reserve(1)?;
        // SAFETY: `len < cap` after the reservation.
        unsafe { self.ptr.as_ptr().add(self.len).write(value) };
        self.len += 1;
        Ok(())
    }

    fn grow_to(&mut self, capacity: usize) -> Result<(), AllocError> {
        let layout = Layout::array::<T>(capacity).map_err(|_| AllocError)?;
        let fresh = self.storage.allocate(layout)?.cast::<T>();
        // SAFETY: the new buffer holds at least `len` elements and cannot
        // overlap a live allocation of the same resource.
        unsafe {
            ptr::copy_nonoverlapping(self.ptr.as_ptr(), fresh.as_ptr(), self.len);
            self.free_buffer();
        }
        self.ptr = fresh;
        self.cap = capacity;
        Ok(())
    }

    /// Returns the current buffer to the resource without touching elements.
    ///
    /// # Safety
    ///
    /// The buffer must not be used afterwards.
    unsafe fn free_buffer(&mut self) {
        if self.cap == 0 || self.storage.is_deallocate_trivial() {
            return;
        }
        if let Ok(layout) = Layout::array::<T>(self.cap) {
            // SAFETY: the buffer was allocated from `storage` with this layout.
            unsafe { self.storage.deallocate(self.ptr.cast(), layout) };
        }
    }
}

impl<T: Copy> StorageVec<'_, T> {
    pub(crate) fn extend_from_slice(&mut self, items: &[T]) -> Result<(), AllocError> {
        self.try_reserve(items.len())?;
        // SAFETY: room for `items.len()` more elements was just reserved, and
        // `items` cannot alias our uninitialized tail.
        unsafe {
            ptr::copy_nonoverlapping(items.as_ptr(), self.ptr.as_ptr().add(self.len), items.len());
        }
        self.len += items.len();
        Ok(())
    }
}

impl<T> Drop for StorageVec<'_, T> {
    fn drop(&mut self) {
        // SAFETY: the first `len` elements are initialized and dropped once;
        // the buffer is freed afterwards and never touched again.
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(self.ptr.as_ptr(), self.len));
            self.free_buffer();
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for StorageVec<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}
