use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::slice;

/// Eight-byte aligned length-prefixed heap allocation.
///
/// `length` is the number of meaningful bytes in `payload`; it is distinct
/// from the allocation's capacity and may be raised or lowered within it.
pub struct Buffer {
    ptr: NonNull<u8>,
    capacity: usize,
    length: usize,
}

const ALIGNMENT: usize = 8;

// SAFETY: `Buffer` owns its allocation exclusively; there is no shared
// mutable state that would make sending it across threads unsound.
unsafe impl Send for Buffer {}

impl Buffer {
    fn layout(capacity: usize) -> Layout {
        Layout::from_size_align(capacity.max(1), ALIGNMENT).expect("valid buffer layout")
    }

    /// Allocates a zeroed buffer of `capacity` bytes and sets the meaningful
    /// length to `capacity` (the caller may shrink it with `set_length`).
    pub fn with_capacity(capacity: usize) -> Self {
        let layout = Self::layout(capacity);
        // SAFETY: layout has non-zero size (we max(1) above) and valid alignment.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).unwrap_or_else(|| alloc::handle_alloc_error(layout));
        Self {
            ptr,
            capacity,
            length: capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Sets the meaningful length. Panics if `n` exceeds the allocation's
    /// capacity, matching the invariant that length is always within the
    /// backing allocation.
    pub fn set_length(&mut self, n: usize) {
        assert!(n <= self.capacity, "length {n} exceeds capacity {}", self.capacity);
        self.length = n;
    }

    pub fn payload(&self) -> &[u8] {
        // SAFETY: `length <= capacity` is an invariant maintained by
        // `set_length`/construction, and `ptr` is valid for `capacity` bytes.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.length) }
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.length) }
    }

    /// The full backing allocation, irrespective of meaningful length. Used
    /// by receivers that need to read into capacity before knowing length.
    pub fn capacity_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.capacity) }
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        // SAFETY: `ptr`/`capacity` describe exactly the allocation made in
        // `with_capacity`, with the same layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), Self::layout(self.capacity)) }
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("length", &self.length)
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_zeroed_and_sized() {
        let b = Buffer::with_capacity(16);
        assert_eq!(b.length(), 16);
        assert_eq!(b.capacity(), 16);
        assert_eq!(b.payload(), &[0u8; 16]);
    }

    #[test]
    fn set_length_shrinks_within_capacity() {
        let mut b = Buffer::with_capacity(16);
        b.set_length(4);
        assert_eq!(b.payload().len(), 4);
        assert_eq!(b.capacity(), 16);
    }

    #[test]
    #[should_panic]
    fn set_length_beyond_capacity_panics() {
        let mut b = Buffer::with_capacity(4);
        b.set_length(5);
    }

    #[test]
    fn payload_pointer_is_eight_byte_aligned() {
        let b = Buffer::with_capacity(3);
        assert_eq!(b.payload_mut().as_mut_ptr() as usize % ALIGNMENT, 0);
    }
}
