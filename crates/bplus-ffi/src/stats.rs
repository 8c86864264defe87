//! C-compatible heap statistics and the leak report.

use bplus_heap::HeapStats;

use crate::runtime::heap;
use crate::status::{set_last_error, BplusStatus};

/// C-compatible snapshot of the runtime heap counters.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BplusHeapStats {
    /// Payload bytes currently allocated.
    /// Fixed-width `u64` for ABI portability (not `usize`).
    pub live_bytes: u64,
    /// High-water mark of `live_bytes`.
    pub peak_live_bytes: u64,
    /// Blocks currently allocated.
    pub live_blocks: u64,
    /// Successful allocations since the heap was created.
    pub total_allocations: u64,
    /// Successful frees since the heap was created.
    pub total_frees: u64,
    /// Allocation requests that failed.
    pub failed_allocations: u64,
    /// Payload bytes ever handed out, including realloc growth.
    pub total_bytes_allocated: u64,
    /// Payload bytes ever given back, including realloc shrinkage.
    pub total_bytes_freed: u64,
}

// 8×u64 = 64 bytes, align 8.
const _: () = assert!(std::mem::size_of::<BplusHeapStats>() == 64);
const _: () = assert!(std::mem::align_of::<BplusHeapStats>() == 8);

impl BplusHeapStats {
    pub(crate) fn from_rust(s: &HeapStats) -> Self {
        Self {
            live_bytes: s.live_bytes as u64,
            peak_live_bytes: s.peak_live_bytes as u64,
            live_blocks: s.live_blocks as u64,
            total_allocations: s.total_allocations,
            total_frees: s.total_frees,
            failed_allocations: s.failed_allocations,
            total_bytes_allocated: s.total_bytes_allocated,
            total_bytes_freed: s.total_bytes_freed,
        }
    }
}

/// Write a snapshot of the runtime heap counters into `out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn bplus_heap_stats(out: *mut BplusHeapStats) -> i32 {
    ffi_guard!({
        if out.is_null() {
            set_last_error(BplusStatus::InvalidArgument);
            return BplusStatus::InvalidArgument as i32;
        }
        let stats = BplusHeapStats::from_rust(&heap().stats());
        // SAFETY: out is valid per caller contract.
        unsafe { *out = stats };
        BplusStatus::Ok as i32
    })
}

/// Log every live block at `warn` level and write their count to
/// `count_out` (which may be null).
///
/// Intended for program exit. Returns `NotTracked` unless the heap was
/// initialised with `track_allocations`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn bplus_heap_report_leaks(count_out: *mut u64) -> i32 {
    ffi_guard!({
        let Some(blocks) = heap().live_blocks() else {
            set_last_error(BplusStatus::NotTracked);
            return BplusStatus::NotTracked as i32;
        };
        for (addr, info) in &blocks {
            tracing::warn!(
                addr = format_args!("{addr:#x}"),
                size = info.size,
                sequence = info.sequence,
                "leaked block"
            );
        }
        if !blocks.is_empty() {
            tracing::warn!(count = blocks.len(), "runtime heap has live blocks at report");
        }
        if !count_out.is_null() {
            // SAFETY: count_out is valid per caller contract.
            unsafe { *count_out = blocks.len() as u64 };
        }
        BplusStatus::Ok as i32
    })
}
