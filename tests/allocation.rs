//! Integration tests for the free-list allocator

use std::{ptr, slice};

use listalloc::{ArenaHeap, FreeListAllocator, HEADER_SIZE};

fn allocator() -> FreeListAllocator<ArenaHeap> {
  let heap = ArenaHeap::with_capacity(1 << 20).unwrap();
  FreeListAllocator::new(heap).unwrap()
}

fn in_heap(
  allocator: &FreeListAllocator<ArenaHeap>,
  ptr: *mut u8,
  len: usize,
) -> bool {
  let lo = allocator.heap_lo() as usize;
  let hi = allocator.heap_hi() as usize;
  let addr = ptr as usize;

  addr >= lo && addr + len - 1 <= hi
}

/// Small linear congruential generator so workloads are reproducible.
struct Lcg(u64);

impl Lcg {
  fn next(&mut self) -> u64 {
    self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    self.0 >> 33
  }
}

#[test]
fn test_scenario() {
  let mut allocator = allocator();

  let a = allocator.allocate(100);
  let b = allocator.allocate(200);
  assert!(!a.is_null() && !b.is_null());
  assert!(a < b);
  assert!(a as usize + 100 <= b as usize - HEADER_SIZE);

  unsafe { allocator.deallocate(a) };

  let c = allocator.allocate(50);
  assert_eq!(c, a);

  let d = allocator.allocate(9999);
  assert!(d > b);
  assert!(in_heap(&allocator, d, 9999));
  assert!(allocator.check_heap(line!()));
}

#[test]
fn test_payloads_are_aligned_and_in_bounds() {
  let mut allocator = allocator();

  for size in 1..=300 {
    let ptr = allocator.allocate(size);
    assert!(!ptr.is_null());
    assert_eq!(ptr as usize % 16, 0, "size {size} misaligned");
    assert!(in_heap(&allocator, ptr, size), "size {size} out of bounds");
  }
}

#[test]
fn test_zero_size_is_null() {
  let mut allocator = allocator();
  assert!(allocator.allocate(0).is_null());

  let ptr = allocator.allocate(64);
  assert!(allocator.allocate(0).is_null());
  unsafe { allocator.deallocate(ptr) };
  assert!(allocator.allocate(0).is_null());
  assert_eq!(allocator.free_blocks().count(), 1);
}

#[test]
fn test_free_then_allocate_reuses_address() {
  let mut allocator = allocator();
  let _other = allocator.allocate(24);

  for size in [1, 15, 16, 17, 100, 4096] {
    let ptr = allocator.allocate(size);
    unsafe { allocator.deallocate(ptr) };
    assert_eq!(allocator.allocate(size), ptr);
  }
}

#[test]
fn test_heap_never_shrinks() {
  let mut allocator = allocator();

  let ptr = allocator.allocate(1000);
  let grown = allocator.heap_size();
  unsafe { allocator.deallocate(ptr) };

  assert_eq!(allocator.heap_size(), grown);
}

#[test]
fn test_oversized_block_is_not_split() {
  let mut allocator = allocator();

  let big = allocator.allocate(1000);
  unsafe { allocator.deallocate(big) };
  let small = allocator.allocate(1);

  assert_eq!(small, big);
  assert_eq!(allocator.free_blocks().count(), 0);
  assert!(unsafe { allocator.usable_size(small) } >= 1000);
}

#[test]
fn test_reallocate_null_allocates() {
  let mut first = allocator();
  let mut second = allocator();

  let allocated = first.allocate(77);
  let reallocated = unsafe { second.reallocate(ptr::null_mut(), 77) };

  assert!(!reallocated.is_null());
  assert_eq!(
    allocated as usize - first.heap_lo() as usize,
    reallocated as usize - second.heap_lo() as usize
  );
  assert_eq!(first.heap_size(), second.heap_size());
}

#[test]
fn test_reallocate_zero_frees() {
  let mut allocator = allocator();

  let ptr = allocator.allocate(32);
  let result = unsafe { allocator.reallocate(ptr, 0) };

  assert!(result.is_null());
  let free: Vec<_> = allocator.free_blocks().map(|block| block.payload).collect();
  assert_eq!(free, vec![ptr]);
}

#[test]
fn test_reallocate_shrink_preserves_prefix() {
  let mut allocator = allocator();

  let ptr = allocator.allocate(128);
  unsafe {
    for i in 0..128 {
      ptr.add(i).write(i as u8);
    }
  }

  let shrunk = unsafe { allocator.reallocate(ptr, 40) };
  assert_eq!(shrunk, ptr);

  let bytes = unsafe { slice::from_raw_parts(shrunk, 40) };
  assert!(bytes.iter().enumerate().all(|(i, &byte)| byte == i as u8));
  assert!(allocator.check_heap(line!()));
}

#[test]
fn test_reallocate_grow_preserves_content() {
  let mut allocator = allocator();

  let ptr = allocator.allocate(20);
  unsafe { ptr::write_bytes(ptr, 0xc3, 20) };
  let _pin = allocator.allocate(8);

  let grown = unsafe { allocator.reallocate(ptr, 2000) };
  assert_ne!(grown, ptr);

  let bytes = unsafe { slice::from_raw_parts(grown, 20) };
  assert!(bytes.iter().all(|&byte| byte == 0xc3));
}

#[test]
fn test_clear_allocate_is_zeroed() {
  let mut allocator = allocator();

  let dirty = allocator.allocate(400);
  unsafe {
    ptr::write_bytes(dirty, 0xee, 400);
    allocator.deallocate(dirty);
  }

  let ptr = allocator.clear_allocate(10, 40);
  assert_eq!(ptr, dirty);

  let bytes = unsafe { slice::from_raw_parts(ptr, 400) };
  assert!(bytes.iter().all(|&byte| byte == 0));
}

#[test]
fn test_exhausted_arena_returns_null() {
  let heap = ArenaHeap::with_capacity(512).unwrap();
  let mut allocator = FreeListAllocator::new(heap).unwrap();

  let mut live = Vec::new();
  loop {
    let ptr = allocator.allocate(48);
    if ptr.is_null() {
      break;
    }
    live.push(ptr);
  }

  assert!(!live.is_empty());
  assert!(allocator.clear_allocate(4, 16).is_null());
  assert!(unsafe { allocator.reallocate(ptr::null_mut(), 48) }.is_null());

  unsafe { allocator.deallocate(live[0]) };
  assert_eq!(allocator.allocate(48), live[0]);
}

#[test]
fn test_random_workload_keeps_heap_consistent() {
  let heap = ArenaHeap::with_capacity(8 << 20).unwrap();
  let mut allocator = FreeListAllocator::new(heap).unwrap();
  let mut rng = Lcg(0x5eed);
  let mut live: Vec<(*mut u8, usize, u8)> = Vec::new();

  for round in 0..2000 {
    match rng.next() % 3 {
      0 | 1 if live.len() < 64 => {
        let size = 1 + (rng.next() % 512) as usize;
        let ptr = allocator.allocate(size);
        assert!(!ptr.is_null());
        let tag = round as u8;
        unsafe { ptr::write_bytes(ptr, tag, size) };
        live.push((ptr, size, tag));
      }
      2 if !live.is_empty() => {
        let index = rng.next() as usize % live.len();
        let (ptr, size, tag) = live.swap_remove(index);
        let bytes = unsafe { slice::from_raw_parts(ptr, size) };
        assert!(bytes.iter().all(|&byte| byte == tag), "block {ptr:p} was clobbered");
        unsafe { allocator.deallocate(ptr) };
      }
      _ => {
        let index = rng.next() as usize % live.len().max(1);
        if let Some(entry) = live.get_mut(index) {
          let size = 1 + (rng.next() % 512) as usize;
          let kept = entry.1.min(size);
          let ptr = unsafe { allocator.reallocate(entry.0, size) };
          assert!(!ptr.is_null());
          let bytes = unsafe { slice::from_raw_parts(ptr, kept) };
          assert!(bytes.iter().all(|&byte| byte == entry.2));
          unsafe { ptr::write_bytes(ptr, entry.2, size) };
          *entry = (ptr, size, entry.2);
        }
      }
    }

    if round % 100 == 0 {
      assert!(allocator.check_heap(line!()), "round {round}");
    }
  }

  assert!(allocator.check_heap(line!()));
}
