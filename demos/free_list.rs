//! Walks through the allocator over the real program break.
//!
//! `sbrk(2)` is a unix interface, so on other targets this demo only says so.

#[cfg(not(unix))]
fn main() {
  eprintln!("this demo grows the heap with sbrk(2), which needs a unix target");
}

#[cfg(unix)]
fn main() {
  walkthrough::run();
}

#[cfg(unix)]
mod walkthrough {
  use std::{env, io::Read, ptr};

  use libc::sbrk;
  use listalloc::{FreeListAllocator, SbrkHeap};

  /// Waits for ENTER when the demo runs with `--step`, so the heap can be
  /// inspected with `pmap`, `gdb` and friends between steps.
  fn pause(step: bool) {
    if step {
      println!("\n>>> Press ENTER to continue...");
      let _ = std::io::stdin().bytes().next();
    }
  }

  fn print_program_break(label: &str) {
    println!(
      "[{}] PID = {}, program break (sbrk(0)) = {:?}",
      label,
      std::process::id(),
      unsafe { sbrk(0) },
    );
  }

  fn print_free_list(allocator: &FreeListAllocator<SbrkHeap>) {
    let blocks: Vec<_> = allocator
      .free_blocks()
      .map(|block| format!("{:p} ({} bytes)", block.payload, block.size))
      .collect();
    println!("    free list: [{}]", blocks.join(", "));
  }

  pub fn run() {
    let step = env::args().any(|arg| arg == "--step");

    print_program_break("start");
    let mut allocator = match FreeListAllocator::new(SbrkHeap::new()) {
      Ok(allocator) => allocator,
      Err(err) => {
        eprintln!("cannot set up the heap: {err}");
        return;
      }
    };
    print_program_break("after init");
    pause(step);

    // 1) Two allocations land back to back at the top of the heap.
    let a = allocator.allocate(100);
    let b = allocator.allocate(200);
    println!("\n[1] allocate(100) = {:p}, allocate(200) = {:p}", a, b);
    unsafe { ptr::write_bytes(a, 0xAB, 100) };
    pause(step);

    // 2) Freeing `a` puts it at the head of the free list.
    unsafe { allocator.deallocate(a) };
    println!("\n[2] deallocate({:p})", a);
    print_free_list(&allocator);
    pause(step);

    // 3) A smaller request takes the freed block whole.
    let c = allocator.allocate(50);
    println!(
      "\n[3] allocate(50) = {:p}, reused a? {}, usable size = {}",
      c,
      c == a,
      unsafe { allocator.usable_size(c) }
    );
    print_free_list(&allocator);
    pause(step);

    // 4) Nothing on the list fits, so the break moves.
    print_program_break("before large alloc");
    let d = allocator.allocate(64 * 1024);
    println!("\n[4] allocate(64 KiB) = {:p}", d);
    print_program_break("after large alloc");
    pause(step);

    // 5) Shrinking in place: the block is freed and immediately taken back.
    let e = unsafe { allocator.reallocate(d, 1024) };
    println!("\n[5] reallocate({:p}, 1024) = {:p}", d, e);

    // 6) Zeroed memory.
    let f = allocator.clear_allocate(16, 8);
    if !f.is_null() {
      println!("\n[6] clear_allocate(16, 8) = {:p}, first byte = {}", f, unsafe { *f });
    }

    println!("\n[7] heap check: {}", if allocator.check_heap(line!()) { "ok" } else { "CORRUPT" });
    print_program_break("end");
  }
}
