//! Heap-growth primitives.
//!
//! The allocator never talks to the operating system directly: it asks a
//! [`HeapGrower`] for more bytes at the high-water mark and for the current
//! bounds of the region it has handed out so far.

use std::{
  alloc::{self, Layout},
  env,
  ptr::NonNull,
};

use log::{debug, warn};

use crate::{
  align::ALIGNMENT,
  error::{HeapError, Result},
};

/// A monotonically growing memory region.
///
/// # Safety
///
/// Implementors promise that every region returned by [`grow`](Self::grow)
/// is valid for reads and writes, exclusively owned by the caller, starts on
/// an [`ALIGNMENT`] boundary and stays mapped for as long as the grower lives.
/// [`lo`](Self::lo) and [`hi`](Self::hi) must enclose every such region.
pub unsafe trait HeapGrower {
  /// Extends the heap by `increment` bytes and returns the start of the new
  /// region, or `None` when the heap cannot grow.
  fn grow(
    &mut self,
    increment: usize,
  ) -> Option<NonNull<u8>>;

  /// First byte of the heap.
  fn lo(&self) -> *mut u8;

  /// Last valid byte of the heap.
  fn hi(&self) -> *mut u8;

  /// Whether every byte in `lo..=hi` came out of [`grow`](Self::grow).
  ///
  /// Only contiguous heaps can be walked block by block.
  fn is_contiguous(&self) -> bool {
    true
  }
}

const ARENA_SIZE_VAR: &str = "LISTALLOC_ARENA_SIZE";

/// Sizing of an [`ArenaHeap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaConfig {
  /// Upper bound in bytes the arena may grow to.
  pub capacity: usize,
}

impl Default for ArenaConfig {
  fn default() -> Self {
    Self {
      capacity: 20 * 1024 * 1024,
    }
  }
}

impl ArenaConfig {
  pub const fn with_capacity(capacity: usize) -> Self {
    Self { capacity }
  }

  /// Reads the capacity from `LISTALLOC_ARENA_SIZE`, falling back to the
  /// default when the variable is unset or not a number.
  pub fn from_env() -> Self {
    match env::var(ARENA_SIZE_VAR) {
      Ok(value) => Self::parse(&value).unwrap_or_else(|| {
        warn!("ignoring {ARENA_SIZE_VAR}={value:?}: not a byte count");
        Self::default()
      }),
      Err(_) => Self::default(),
    }
  }

  fn parse(value: &str) -> Option<Self> {
    value.trim().parse().ok().map(Self::with_capacity)
  }
}

/// A fixed-capacity region reserved up front and handed out front to back.
///
/// ```text
///   base                     brk                         base + capacity
///   ┌────────────────────────┬─────────────────────────────┐
///   │     grown so far       │        still reserved       │
///   └────────────────────────┴─────────────────────────────┘
/// ```
///
/// Growing past the capacity fails. The reservation is released on drop.
pub struct ArenaHeap {
  base: NonNull<u8>,
  brk: usize,
  layout: Layout,
}

impl ArenaHeap {
  pub fn new(config: ArenaConfig) -> Result<Self> {
    let overflow = HeapError::SizeOverflow { requested: config.capacity };
    let capacity = config
      .capacity
      .max(ALIGNMENT)
      .checked_add(ALIGNMENT - 1)
      .ok_or(overflow)?
      & !(ALIGNMENT - 1);
    let layout = Layout::from_size_align(capacity, ALIGNMENT).map_err(|_| overflow)?;

    let base = NonNull::new(unsafe { alloc::alloc(layout) })
      .ok_or(HeapError::OutOfMemory { requested: capacity })?;

    debug!("reserved arena of {} bytes at {:p}", capacity, base);

    Ok(Self { base, brk: 0, layout })
  }

  pub fn with_capacity(capacity: usize) -> Result<Self> {
    Self::new(ArenaConfig::with_capacity(capacity))
  }

  /// An arena sized by [`ArenaConfig::from_env`].
  pub fn from_env() -> Result<Self> {
    Self::new(ArenaConfig::from_env())
  }

  pub const fn capacity(&self) -> usize {
    self.layout.size()
  }
}

unsafe impl HeapGrower for ArenaHeap {
  fn grow(
    &mut self,
    increment: usize,
  ) -> Option<NonNull<u8>> {
    if increment > self.capacity() - self.brk {
      return None;
    }

    let start = unsafe { self.base.add(self.brk) };
    self.brk += increment;
    Some(start)
  }

  fn lo(&self) -> *mut u8 {
    self.base.as_ptr()
  }

  fn hi(&self) -> *mut u8 {
    self.base.as_ptr().wrapping_add(self.brk).wrapping_sub(1)
  }
}

impl Drop for ArenaHeap {
  fn drop(&mut self) {
    unsafe { alloc::dealloc(self.base.as_ptr(), self.layout) };
  }
}

#[cfg(unix)]
pub use self::sbrk::SbrkHeap;

#[cfg(unix)]
mod sbrk {
  use std::ptr::{self, NonNull};

  use libc::{c_void, intptr_t, sbrk};

  use super::HeapGrower;
  use crate::align;

  /// The process data segment, grown with `sbrk(2)`.
  ///
  /// ```text
  ///   High Address ┌─────────────────────┐
  ///                │       Stack         │ ↓ grows down
  ///                │                     │
  ///                │       Heap          │ ↑ grows up (sbrk)
  ///                ├─────────────────────┤ ← Program Break
  ///   Low Address  └─────────────────────┘
  /// ```
  ///
  /// Other users of the break (the system `malloc`, for one) may interleave
  /// their own regions with ours, so the heap is not walkable by address.
  ///
  /// A misaligned break is padded up to [`ALIGNMENT`](crate::align::ALIGNMENT)
  /// before growing; the padding is given back when the growth fails.
  pub struct SbrkHeap {
    lo: *mut u8,
  }

  impl SbrkHeap {
    pub const fn new() -> Self {
      Self { lo: ptr::null_mut() }
    }
  }

  impl Default for SbrkHeap {
    fn default() -> Self {
      Self::new()
    }
  }

  fn failed(address: *mut c_void) -> bool {
    address == usize::MAX as *mut c_void
  }

  unsafe impl HeapGrower for SbrkHeap {
    fn grow(
      &mut self,
      increment: usize,
    ) -> Option<NonNull<u8>> {
      let increment = intptr_t::try_from(increment).ok()?;

      unsafe {
        let brk = sbrk(0);
        if failed(brk) {
          return None;
        }

        let padding = align!(brk as usize) - brk as usize;
        if padding != 0 && failed(sbrk(padding as intptr_t)) {
          return None;
        }

        let address = sbrk(increment);
        if failed(address) {
          if padding != 0 {
            sbrk(-(padding as intptr_t));
          }
          return None;
        }

        if self.lo.is_null() {
          self.lo = address as *mut u8;
        }

        NonNull::new(address as *mut u8)
      }
    }

    fn lo(&self) -> *mut u8 {
      self.lo
    }

    fn hi(&self) -> *mut u8 {
      (unsafe { sbrk(0) } as *mut u8).wrapping_sub(1)
    }

    fn is_contiguous(&self) -> bool {
      false
    }
  }
}
