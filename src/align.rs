/// Alignment every block and payload handed out by the allocator honors.
pub const ALIGNMENT: usize = 16;

/// Rounds the given value up to the next multiple of [`ALIGNMENT`].
///
/// # Examples
///
/// ```rust
/// use listalloc::align;
///
/// assert_eq!(align!(0), 0);
/// assert_eq!(align!(1), 16);
/// assert_eq!(align!(16), 16);
/// assert_eq!(align!(132), 144);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + $crate::align::ALIGNMENT - 1) & !($crate::align::ALIGNMENT - 1)
  };
}

/// Whether `addr` sits on an [`ALIGNMENT`] boundary.
#[inline]
pub const fn is_aligned(addr: usize) -> bool {
  addr & (ALIGNMENT - 1) == 0
}
