//! Heap consistency checks.

use std::collections::HashSet;

#[cfg(any(debug_assertions, feature = "heap-check"))]
use log::error;

use crate::{
  align::{ALIGNMENT, is_aligned},
  block::{HEADER_SIZE, Header},
  error::Corruption,
  freelist::FreeListAllocator,
  heap::HeapGrower,
};

impl<G: HeapGrower> FreeListAllocator<G> {
  /// Reports whether the heap is consistent, logging the first problem
  /// found together with `line`.
  ///
  /// Only does work in debug builds or with the `heap-check` feature;
  /// otherwise it always passes.
  pub fn check_heap(
    &self,
    line: u32,
  ) -> bool {
    #[cfg(any(debug_assertions, feature = "heap-check"))]
    if let Err(corruption) = self.validate() {
      error!("heap check failed (line {}): {}", line, corruption);
      return false;
    }

    #[cfg(not(any(debug_assertions, feature = "heap-check")))]
    let _ = line;

    true
  }

  /// Walks the free list, then the heap itself when it is contiguous, and
  /// returns the first broken invariant.
  pub fn validate(&self) -> Result<(), Corruption> {
    let sentinel = self.sentinel.as_ptr();

    if sentinel as *mut u8 != self.heap.lo() {
      return Err(Corruption::Sentinel { addr: sentinel as usize });
    }
    let head = unsafe { &*sentinel };
    if head.is_allocated() || head.raw_size() != HEADER_SIZE {
      return Err(Corruption::Sentinel { addr: sentinel as usize });
    }

    let listed = self.walk_free_list()?;

    if self.heap.is_contiguous() {
      let found = self.walk_heap()?;
      if found != listed {
        return Err(Corruption::FreeCountMismatch { listed, found });
      }
    }

    Ok(())
  }

  /// Follows `next` links around the ring and returns how many free blocks
  /// it holds besides the sentinel.
  fn walk_free_list(&self) -> Result<usize, Corruption> {
    let sentinel = self.sentinel.as_ptr();
    let mut visited = HashSet::new();
    let mut current = sentinel;

    loop {
      let next = unsafe { (*current).next };
      self.check_node(next as usize)?;

      if next == sentinel {
        break;
      }
      if !visited.insert(next as usize) {
        return Err(Corruption::Cycle { addr: next as usize });
      }

      let block = unsafe { &*next };
      if block.prev != current {
        return Err(Corruption::BrokenLink { addr: next as usize });
      }
      if block.is_allocated() {
        return Err(Corruption::AllocatedOnFreeList { addr: next as usize });
      }
      self.check_size(next as usize, block.raw_size())?;

      current = next;
    }

    if unsafe { (*sentinel).prev } != current {
      return Err(Corruption::BrokenLink { addr: sentinel as usize });
    }

    Ok(visited.len())
  }

  /// Steps through every block by address and returns how many are free.
  fn walk_heap(&self) -> Result<usize, Corruption> {
    let sentinel = self.sentinel.as_ptr() as usize;
    let end = (self.heap.hi() as usize).wrapping_add(1);
    let mut addr = sentinel;
    let mut free = 0;

    while addr < end {
      self.check_node(addr)?;

      let block = unsafe { &*(addr as *const Header) };
      let size = block.raw_size();
      self.check_size(addr, size)?;

      if addr != sentinel && !block.is_allocated() {
        free += 1;
      }
      addr += size;
    }

    Ok(free)
  }

  /// A header at `addr` must be aligned and fully inside the heap.
  fn check_node(
    &self,
    addr: usize,
  ) -> Result<(), Corruption> {
    if !is_aligned(addr) {
      return Err(Corruption::Misaligned { addr });
    }
    if !self.contains(addr, HEADER_SIZE) {
      return Err(Corruption::OutOfBounds { addr });
    }
    Ok(())
  }

  fn check_size(
    &self,
    addr: usize,
    size: usize,
  ) -> Result<(), Corruption> {
    if size < HEADER_SIZE || size % ALIGNMENT != 0 {
      return Err(Corruption::BadSize { addr, size });
    }
    if !self.contains(addr, size) {
      return Err(Corruption::OutOfBounds { addr });
    }
    Ok(())
  }

  fn contains(
    &self,
    addr: usize,
    len: usize,
  ) -> bool {
    let lo = self.heap.lo() as usize;
    let hi = self.heap.hi() as usize;

    addr >= lo
      && addr
        .checked_add(len - 1)
        .is_some_and(|last| last <= hi)
  }
}
