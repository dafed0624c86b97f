use std::{mem, ptr};

/// Bit 0 of the size word; set while the block is handed out.
const ALLOCATED: usize = 1;

/// Bytes reserved in front of every payload.
pub const HEADER_SIZE: usize = crate::align!(mem::size_of::<Header>());

/// Metadata living at the start of every block the allocator manages.
///
/// ```text
///   ┌──────────────────────────┬───────────────────────────┐
///   │ size | A   next   prev   │        payload            │
///   └──────────────────────────┴───────────────────────────┘
///   ▲                          ▲
///   header                     header + HEADER_SIZE
/// ```
///
/// `next` and `prev` only mean something while the block is free.
#[repr(C)]
pub struct Header {
  size: usize,
  pub next: *mut Header,
  pub prev: *mut Header,
}

impl Header {
  /// A block of `raw_size` bytes, free and unlinked.
  pub const fn new(raw_size: usize) -> Self {
    Self {
      size: raw_size,
      next: ptr::null_mut(),
      prev: ptr::null_mut(),
    }
  }

  /// Block size in bytes, header included, with the flag masked off.
  #[inline]
  pub const fn raw_size(&self) -> usize {
    self.size & !ALLOCATED
  }

  #[inline]
  pub const fn is_allocated(&self) -> bool {
    self.size & ALLOCATED != 0
  }

  #[inline]
  pub const fn set_allocated(
    &mut self,
    allocated: bool,
  ) {
    if allocated {
      self.size |= ALLOCATED;
    } else {
      self.size &= !ALLOCATED;
    }
  }

  /// Address of the payload that follows `header`.
  ///
  /// # Safety
  /// `header` must point into the managed heap with at least `HEADER_SIZE`
  /// bytes behind it.
  #[inline]
  pub unsafe fn payload(header: *mut Header) -> *mut u8 {
    unsafe { (header as *mut u8).add(HEADER_SIZE) }
  }

  /// Recovers the header from a payload pointer.
  ///
  /// # Safety
  /// `payload` must have been produced by [`Header::payload`].
  #[inline]
  pub unsafe fn from_payload(payload: *mut u8) -> *mut Header {
    unsafe { payload.sub(HEADER_SIZE) as *mut Header }
  }
}
