//! # listalloc - An Explicit Free-List Memory Allocator
//!
//! This crate provides a `malloc`/`free`/`realloc`/`calloc` style allocator
//! built on a monotonically growing heap. Freed blocks are kept on an
//! **explicit free list** and recycled with a **first-fit** search.
//!
//! ## Overview
//!
//! ```text
//!   Heap Layout:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                            HEAP MEMORY                               │
//!   │                                                                      │
//!   │   ┌─────┬───────┬──────┬─────────┬───────┬─────────────────────────┐ │
//!   │   │  S  │  A1   │  F1  │   A2    │  F2   │      not grown yet      │ │
//!   │   └─────┴───────┴──────┴─────────┴───────┴─────────────────────────┘ │
//!   │   ▲                                      ▲                           │
//!   │   │                                      │                           │
//!   │ Sentinel                             High-water                      │
//!   │ (heap lo)                               mark                         │
//!   │                                                                      │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   S  = sentinel, anchors the free list, never handed out
//!   A* = allocated blocks
//!   F* = freed blocks, linked through their headers: S ⇄ F2 ⇄ F1 ⇄ S
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   listalloc
//!   ├── align      - Alignment macro (align!) and the 16-byte contract
//!   ├── block      - Block header and the size/flag packing (internal)
//!   ├── check      - Heap validator (internal)
//!   ├── error      - HeapError and Corruption
//!   ├── freelist   - FreeListAllocator implementation
//!   └── heap       - HeapGrower trait, ArenaHeap and SbrkHeap
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use listalloc::{ArenaHeap, FreeListAllocator};
//!
//! let heap = ArenaHeap::with_capacity(64 * 1024).unwrap();
//! let mut allocator = FreeListAllocator::new(heap).unwrap();
//!
//! let ptr = allocator.allocate(100);
//! assert!(!ptr.is_null());
//!
//! unsafe {
//!   ptr.write_bytes(7, 100);
//!   let ptr = allocator.reallocate(ptr, 50);
//!   assert_eq!(*ptr.add(49), 7);
//!   allocator.deallocate(ptr);
//! }
//!
//! assert!(allocator.check_heap(line!()));
//! ```
//!
//! ## How It Works
//!
//! Every block starts with a header:
//!
//! ```text
//!   Single Block:
//!   ┌───────────────────────┬────────────────────────────────┐
//!   │    Block Header       │         User Data              │
//!   │  ┌─────────────────┐  │                                │
//!   │  │ size | A        │  │  ┌──────────────────────────┐  │
//!   │  │ next: free only │  │  │                          │  │
//!   │  │ prev: free only │  │  │  size - 32 bytes usable  │  │
//!   │  └─────────────────┘  │  │                          │  │
//!   │      32 bytes         │  └──────────────────────────┘  │
//!   └───────────────────────┴────────────────────────────────┘
//!                           ▲
//!                           └── Pointer returned to user
//! ```
//!
//! `size` counts the whole block, is always a multiple of 16, and borrows
//! its lowest bit as the allocated flag `A`.
//!
//! - **allocate** walks the free list from the sentinel and takes the first
//!   block that is large enough. When none is, the heap grows by exactly the
//!   block size.
//! - **deallocate** clears the flag and pushes the block right behind the
//!   sentinel, so the most recently freed block is tried first.
//! - **reallocate** frees, allocates, then copies. Shrinking or slightly
//!   growing requests usually get the very same block back.
//! - **clear_allocate** allocates and zero-fills.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: No synchronization primitives
//! - **No splitting**: A large free block is handed out whole
//! - **No coalescing**: Neighbouring free blocks are never merged
//! - **No shrinking**: Memory is recycled, never returned
//! - **No validation**: Double free and foreign pointers are undefined
//!
//! ## Safety
//!
//! Headers live inside the managed memory, so the allocator works on raw
//! pointers. Handing a pointer back (`deallocate`, `reallocate`) is `unsafe`:
//! the caller vouches that it came from this allocator and is still live.

pub mod align;
mod block;
mod check;
mod error;
mod freelist;
pub mod heap;

pub use block::HEADER_SIZE;
pub use error::{Corruption, HeapError, Result};
pub use freelist::{FreeBlock, FreeBlocks, FreeListAllocator};
#[cfg(unix)]
pub use heap::SbrkHeap;
pub use heap::{ArenaConfig, ArenaHeap, HeapGrower};
