use std::{cmp, iter::FusedIterator, marker::PhantomData, ptr, ptr::NonNull};

use log::{debug, trace, warn};

use crate::{
  align,
  align::ALIGNMENT,
  block::{HEADER_SIZE, Header},
  error::{HeapError, Result},
  heap::HeapGrower,
};

/// A first-fit allocator over an explicit, circular free list.
///
/// Every block starts with a [`Header`]. Free blocks are threaded through
/// their headers into a doubly-linked ring anchored at a sentinel that sits
/// at the very bottom of the heap and is never handed out:
///
/// ```text
///        ┌──────────────────────────────────────────────┐
///        ▼                                              │
///   ┌──────────┐ next ┌──────────┐ next ┌──────────┐ next
///   │ sentinel │─────▶│ freed 2nd│─────▶│ freed 1st│────┘
///   └──────────┘◀─────└──────────┘◀─────└──────────┘
///                prev              prev
/// ```
///
/// Allocation walks the ring from the sentinel and takes the first block
/// large enough; if none is, the heap grows. Freed blocks are pushed right
/// behind the sentinel. Blocks are never split nor merged, and the heap never
/// shrinks.
pub struct FreeListAllocator<G: HeapGrower> {
  pub(crate) heap: G,
  pub(crate) sentinel: NonNull<Header>,
}

impl<G: HeapGrower> FreeListAllocator<G> {
  /// Takes the first header-sized region of `heap` for the sentinel.
  ///
  /// # Errors
  ///
  /// `HeapError::OutOfMemory` if the heap cannot grow by a single header.
  pub fn new(mut heap: G) -> Result<Self> {
    let sentinel = heap
      .grow(HEADER_SIZE)
      .ok_or(HeapError::OutOfMemory { requested: HEADER_SIZE })?
      .cast::<Header>();

    unsafe {
      let raw = sentinel.as_ptr();
      raw.write(Header::new(HEADER_SIZE));
      (*raw).next = raw;
      (*raw).prev = raw;
    }

    debug!("sentinel placed at {:p}", sentinel);

    Ok(Self { heap, sentinel })
  }

  /// Returns a 16-byte aligned region of at least `size` bytes, or null.
  ///
  /// A zero-sized request yields null without touching the heap.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> *mut u8 {
    if size == 0 {
      return ptr::null_mut();
    }

    match self.allocate_block(size) {
      Ok(block) => {
        let payload = unsafe { Header::payload(block) };
        trace!("allocate({}) -> {:p}", size, payload);
        payload
      }
      Err(err) => {
        warn!("allocate({}) failed: {}", size, err);
        ptr::null_mut()
      }
    }
  }

  /// Hands a block back to the free list.
  ///
  /// Null is ignored.
  ///
  /// # Safety
  ///
  /// `payload` must be null or a live allocation of this allocator. Freeing
  /// it twice or freeing a foreign pointer is undefined behavior.
  pub unsafe fn deallocate(
    &mut self,
    payload: *mut u8,
  ) {
    if payload.is_null() {
      return;
    }

    unsafe {
      let block = Header::from_payload(payload);
      (*block).set_allocated(false);
      self.push_front(block);
    }

    trace!("deallocate({:p})", payload);
  }

  /// Resizes an allocation by freeing it and allocating again.
  ///
  /// Null `payload` behaves like [`allocate`](Self::allocate), a zero `size`
  /// like [`deallocate`](Self::deallocate). The freed block sits at the head
  /// of the list, so requests it can still satisfy usually land on the same
  /// address. When the new allocation fails the old block stays released and
  /// null is returned.
  ///
  /// # Safety
  ///
  /// Same contract as [`deallocate`](Self::deallocate).
  pub unsafe fn reallocate(
    &mut self,
    payload: *mut u8,
    size: usize,
  ) -> *mut u8 {
    if payload.is_null() {
      return self.allocate(size);
    }
    if size == 0 {
      unsafe { self.deallocate(payload) };
      return ptr::null_mut();
    }

    let old_size = unsafe { self.usable_size(payload) };
    unsafe { self.deallocate(payload) };

    let moved = self.allocate(size);
    if moved.is_null() {
      warn!("reallocate({:p}, {}) lost the original block", payload, size);
      return ptr::null_mut();
    }

    // `copy` has memmove semantics, so reusing the same block is a no-op.
    unsafe { ptr::copy(payload, moved, cmp::min(old_size, size)) };

    trace!("reallocate({:p}, {}) -> {:p}", payload, size, moved);
    moved
  }

  /// Allocates `count * size` zeroed bytes.
  ///
  /// The product is not checked for overflow outside debug builds.
  pub fn clear_allocate(
    &mut self,
    count: usize,
    size: usize,
  ) -> *mut u8 {
    debug_assert!(
      count.checked_mul(size).is_some(),
      "clear_allocate({count}, {size}) overflows"
    );
    let total = count.wrapping_mul(size);

    let payload = self.allocate(total);
    if !payload.is_null() {
      unsafe { ptr::write_bytes(payload, 0, total) };
    }
    payload
  }

  /// Payload capacity of an allocated block, surplus from reuse included.
  ///
  /// # Safety
  ///
  /// `payload` must be a live allocation of this allocator.
  pub unsafe fn usable_size(
    &self,
    payload: *mut u8,
  ) -> usize {
    unsafe { (*Header::from_payload(payload)).raw_size() - HEADER_SIZE }
  }

  /// Lowest heap address; the sentinel lives here.
  pub fn heap_lo(&self) -> *mut u8 {
    self.heap.lo()
  }

  /// Highest valid heap address.
  pub fn heap_hi(&self) -> *mut u8 {
    self.heap.hi()
  }

  pub fn heap_size(&self) -> usize {
    (self.heap_hi() as usize).wrapping_sub(self.heap_lo() as usize).wrapping_add(1)
  }

  /// Free blocks in search order, sentinel excluded.
  pub fn free_blocks(&self) -> FreeBlocks<'_> {
    let sentinel = self.sentinel.as_ptr();
    FreeBlocks {
      sentinel,
      current: unsafe { (*sentinel).next },
      _allocator: PhantomData,
    }
  }

  fn allocate_block(
    &mut self,
    size: usize,
  ) -> Result<*mut Header> {
    let required = request_size(size)?;

    if let Some(block) = self.find_fit(required) {
      unsafe {
        self.unlink(block);
        (*block).set_allocated(true);
      }
      return Ok(block);
    }

    self.extend(required)
  }

  /// First free block whose size covers `required`.
  fn find_fit(
    &self,
    required: usize,
  ) -> Option<*mut Header> {
    let sentinel = self.sentinel.as_ptr();

    unsafe {
      let mut current = (*sentinel).next;

      while current != sentinel {
        if (*current).raw_size() >= required {
          return Some(current);
        }
        current = (*current).next;
      }
    }

    None
  }

  fn extend(
    &mut self,
    required: usize,
  ) -> Result<*mut Header> {
    let block = self
      .heap
      .grow(required)
      .ok_or(HeapError::OutOfMemory { requested: required })?
      .cast::<Header>()
      .as_ptr();

    unsafe {
      block.write(Header::new(required));
      (*block).set_allocated(true);
    }

    debug!("heap grew by {} bytes, block at {:p}", required, block);
    Ok(block)
  }

  /// # Safety
  /// `block` must be on the free list.
  unsafe fn unlink(
    &mut self,
    block: *mut Header,
  ) {
    unsafe {
      let prev = (*block).prev;
      let next = (*block).next;
      (*prev).next = next;
      (*next).prev = prev;
    }
  }

  /// # Safety
  /// `block` must be a valid header that is not on the free list.
  unsafe fn push_front(
    &mut self,
    block: *mut Header,
  ) {
    let sentinel = self.sentinel.as_ptr();

    unsafe {
      (*block).next = (*sentinel).next;
      (*block).prev = sentinel;
      (*sentinel).next = block;
      (*(*block).next).prev = block;
    }
  }
}

/// Total block size for a payload of `size` bytes.
fn request_size(size: usize) -> Result<usize> {
  size
    .checked_add(HEADER_SIZE)
    .filter(|total| *total <= usize::MAX - (ALIGNMENT - 1))
    .map(|total| align!(total))
    .ok_or(HeapError::SizeOverflow { requested: size })
}

/// A block sitting on the free list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeBlock {
  /// Where the payload would start if the block were handed out.
  pub payload: *mut u8,
  /// Block size, header included.
  pub size: usize,
}

/// Iterator returned by [`FreeListAllocator::free_blocks`].
pub struct FreeBlocks<'a> {
  sentinel: *mut Header,
  current: *mut Header,
  _allocator: PhantomData<&'a ()>,
}

impl Iterator for FreeBlocks<'_> {
  type Item = FreeBlock;

  fn next(&mut self) -> Option<Self::Item> {
    if self.current == self.sentinel {
      return None;
    }

    unsafe {
      let block = FreeBlock {
        payload: Header::payload(self.current),
        size: (*self.current).raw_size(),
      };
      self.current = (*self.current).next;
      Some(block)
    }
  }
}

impl FusedIterator for FreeBlocks<'_> {}
