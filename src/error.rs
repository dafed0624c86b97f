use thiserror::Error;

/// Failures of the heap-growth path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeapError {
  #[error("heap cannot grow by {requested} bytes")]
  OutOfMemory { requested: usize },
  #[error("request of {requested} bytes overflows the block size")]
  SizeOverflow { requested: usize },
}

/// The first heap invariant found broken by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Corruption {
  #[error("block {addr:#x} lies outside the heap")]
  OutOfBounds { addr: usize },
  #[error("block {addr:#x} is not 16-byte aligned")]
  Misaligned { addr: usize },
  #[error("block {addr:#x} has invalid size {size}")]
  BadSize { addr: usize, size: usize },
  #[error("free block {addr:#x} is marked allocated")]
  AllocatedOnFreeList { addr: usize },
  #[error("links around {addr:#x} are not reciprocal")]
  BrokenLink { addr: usize },
  #[error("block {addr:#x} appears twice on the free list")]
  Cycle { addr: usize },
  #[error("sentinel at {addr:#x} was overwritten")]
  Sentinel { addr: usize },
  #[error("free list holds {listed} blocks but the heap has {found} free")]
  FreeCountMismatch { listed: usize, found: usize },
}

pub type Result<T> = core::result::Result<T, HeapError>;
