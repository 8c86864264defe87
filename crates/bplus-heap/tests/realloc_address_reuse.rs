//! Integration test: a tracked heap whose platform allocator hands a
//! just-released address straight to another thread.
//!
//! The test binary installs a global allocator with a one-slot shared
//! free list for small blocks, so the address a realloc moves away from
//! is the next one another thread's `alloc` receives. Every valid free
//! must still succeed and the registry must end empty.

use std::alloc::{GlobalAlloc, Layout, System};
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;
use std::thread;

use bplus_heap::{Heap, HeapConfig, HEADER_SIZE, MIN_ALIGN};

const SMALL: usize = 32;
const ROUNDS: usize = 2000;

/// Recycles blocks of exactly one layout through a shared slot.
struct SharedSlot;

static SLOT: AtomicPtr<u8> = AtomicPtr::new(ptr::null_mut());

fn recycled(layout: Layout) -> bool {
    layout.size() == HEADER_SIZE + SMALL && layout.align() == MIN_ALIGN
}

unsafe impl GlobalAlloc for SharedSlot {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if recycled(layout) {
            let p = SLOT.swap(ptr::null_mut(), Ordering::AcqRel);
            if !p.is_null() {
                return p;
            }
        }
        unsafe { System.alloc(layout) }
    }

    unsafe fn dealloc(&self, p: *mut u8, layout: Layout) {
        if recycled(layout) {
            let prev = SLOT.swap(p, Ordering::AcqRel);
            if !prev.is_null() {
                unsafe { System.dealloc(prev, layout) };
            }
            return;
        }
        unsafe { System.dealloc(p, layout) }
    }
}

#[global_allocator]
static GLOBAL: SharedSlot = SharedSlot;

#[test]
fn moved_block_address_reused_by_other_thread() {
    let heap = Arc::new(
        Heap::new(HeapConfig {
            track_allocations: true,
            ..HeapConfig::default()
        })
        .unwrap(),
    );

    let workers: Vec<_> = (0..4)
        .map(|t| {
            let heap = Arc::clone(&heap);
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    let p = heap.alloc(SMALL).unwrap();
                    if t < 2 {
                        let q = unsafe { heap.realloc(p, 100_000).unwrap() };
                        unsafe { heap.free(q).unwrap() };
                    } else {
                        unsafe { heap.free(p).unwrap() };
                    }
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    let stats = heap.stats();
    assert_eq!(stats.live_blocks, 0);
    assert_eq!(stats.live_bytes, 0);
    assert!(heap.live_blocks().unwrap().is_empty());
}
