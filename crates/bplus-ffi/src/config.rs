//! C-compatible heap configuration passed to `bplus_runtime_init`.

use bplus_heap::{HeapConfig, HeapError};

/// C mirror of [`HeapConfig`].
///
/// Fixed-width fields for ABI portability. Flags are `0` (off) or
/// non-zero (on).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BplusHeapConfig {
    /// Cap on live payload bytes; `0` means unlimited.
    pub max_heap_bytes: u64,
    /// Non-zero to keep a registry of live blocks.
    pub track_allocations: u8,
    /// Non-zero to poison freed payloads.
    pub poison_freed: u8,
}

// 1×u64 + 2×u8 + 6 bytes padding = 16 bytes, align 8.
const _: () = assert!(std::mem::size_of::<BplusHeapConfig>() == 16);
const _: () = assert!(std::mem::align_of::<BplusHeapConfig>() == 8);

impl BplusHeapConfig {
    pub(crate) fn to_rust(self) -> Result<HeapConfig, HeapError> {
        let max_heap_bytes = match self.max_heap_bytes {
            0 => None,
            n => Some(usize::try_from(n).map_err(|_| HeapError::InvalidConfig {
                reason: format!("max_heap_bytes {n} does not fit in usize"),
            })?),
        };
        let config = HeapConfig {
            max_heap_bytes,
            track_allocations: self.track_allocations != 0,
            poison_freed: self.poison_freed != 0,
        };
        config.validate()?;
        Ok(config)
    }
}
