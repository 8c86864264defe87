//! Heap accounting: lock-free counters and their snapshots.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::error::HeapError;

/// Point-in-time view of heap counters.
///
/// Each field is read atomically, but the snapshot as a whole is not: a
/// concurrent alloc or free may be reflected in some fields and not yet
/// in others.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Payload bytes currently allocated.
    pub live_bytes: usize,
    /// High-water mark of `live_bytes`.
    pub peak_live_bytes: usize,
    /// Blocks currently allocated.
    pub live_blocks: usize,
    /// Successful allocations since the heap was created.
    pub total_allocations: u64,
    /// Successful frees since the heap was created.
    pub total_frees: u64,
    /// Allocation requests that returned an error.
    pub failed_allocations: u64,
    /// Payload bytes ever handed out, including growth via realloc.
    pub total_bytes_allocated: u64,
    /// Payload bytes ever given back, including shrinkage via realloc.
    pub total_bytes_freed: u64,
}

#[derive(Default)]
pub(crate) struct Counters {
    live_bytes: AtomicUsize,
    peak_live_bytes: AtomicUsize,
    live_blocks: AtomicUsize,
    total_allocations: AtomicU64,
    total_frees: AtomicU64,
    failed_allocations: AtomicU64,
    total_bytes_allocated: AtomicU64,
    total_bytes_freed: AtomicU64,
}

impl Counters {
    /// Claim `size` live bytes ahead of the platform allocation.
    ///
    /// Fails without side effects if the claim would cross `limit`.
    pub(crate) fn reserve(&self, size: usize, limit: Option<usize>) -> Result<(), HeapError> {
        let mut live = self.live_bytes.load(Ordering::Relaxed);
        loop {
            let next = match live.checked_add(size) {
                Some(next) if limit.is_none_or(|limit| next <= limit) => next,
                _ => {
                    return Err(HeapError::LimitExceeded {
                        requested: size,
                        live,
                        limit: limit.unwrap_or(usize::MAX),
                    })
                }
            };
            match self.live_bytes.compare_exchange_weak(
                live,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    self.peak_live_bytes.fetch_max(next, Ordering::Relaxed);
                    self.total_bytes_allocated
                        .fetch_add(size as u64, Ordering::Relaxed);
                    return Ok(());
                }
                Err(actual) => live = actual,
            }
        }
    }

    /// Undo a [`Counters::reserve`] whose platform allocation failed.
    pub(crate) fn unreserve(&self, size: usize) {
        self.live_bytes.fetch_sub(size, Ordering::AcqRel);
        self.total_bytes_allocated
            .fetch_sub(size as u64, Ordering::Relaxed);
    }

    /// Give back `size` live bytes, from a free or a shrinking realloc.
    pub(crate) fn release_bytes(&self, size: usize) {
        self.live_bytes.fetch_sub(size, Ordering::AcqRel);
        self.total_bytes_freed
            .fetch_add(size as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_block_alloc(&self) {
        self.live_blocks.fetch_add(1, Ordering::Relaxed);
        self.total_allocations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_block_free(&self) {
        self.live_blocks.fetch_sub(1, Ordering::Relaxed);
        self.total_frees.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failed_allocations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> HeapStats {
        HeapStats {
            live_bytes: self.live_bytes.load(Ordering::Acquire),
            peak_live_bytes: self.peak_live_bytes.load(Ordering::Relaxed),
            live_blocks: self.live_blocks.load(Ordering::Relaxed),
            total_allocations: self.total_allocations.load(Ordering::Relaxed),
            total_frees: self.total_frees.load(Ordering::Relaxed),
            failed_allocations: self.failed_allocations.load(Ordering::Relaxed),
            total_bytes_allocated: self.total_bytes_allocated.load(Ordering::Relaxed),
            total_bytes_freed: self.total_bytes_freed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_tracks_peak() {
        let c = Counters::default();
        c.reserve(100, None).unwrap();
        c.reserve(50, None).unwrap();
        c.release_bytes(120);
        let s = c.snapshot();
        assert_eq!(s.live_bytes, 30);
        assert_eq!(s.peak_live_bytes, 150);
        assert_eq!(s.total_bytes_allocated, 150);
        assert_eq!(s.total_bytes_freed, 120);
    }

    #[test]
    fn reserve_at_limit_boundary() {
        let c = Counters::default();
        c.reserve(64, Some(128)).unwrap();
        c.reserve(64, Some(128)).unwrap();
        let err = c.reserve(1, Some(128)).unwrap_err();
        assert_eq!(
            err,
            HeapError::LimitExceeded {
                requested: 1,
                live: 128,
                limit: 128
            }
        );
        assert_eq!(c.snapshot().live_bytes, 128);
    }

    #[test]
    fn unreserve_restores_counters() {
        let c = Counters::default();
        c.reserve(10, None).unwrap();
        c.unreserve(10);
        let s = c.snapshot();
        assert_eq!(s.live_bytes, 0);
        assert_eq!(s.total_bytes_allocated, 0);
        assert_eq!(s.total_bytes_freed, 0);
    }

    #[test]
    fn overflowing_reserve_is_rejected() {
        let c = Counters::default();
        c.reserve(usize::MAX, None).unwrap();
        assert!(c.reserve(1, None).is_err());
    }
}
