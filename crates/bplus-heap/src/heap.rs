//! The runtime heap: accounting, limits, and tracking around the block codec.

#![allow(unsafe_code)]

use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard};

use crate::block;
use crate::config::HeapConfig;
use crate::error::HeapError;
use crate::registry::{BlockInfo, Registry};
use crate::stats::{Counters, HeapStats};

/// Heap backing every allocation made by a B+ program.
///
/// Forwards to the platform allocator. Counters are atomics and the
/// optional registry sits behind a mutex, so a `Heap` can be shared
/// freely across threads.
pub struct Heap {
    config: HeapConfig,
    counters: Counters,
    registry: Option<Mutex<Registry>>,
}

impl Heap {
    /// Create a heap, validating `config`.
    pub fn new(config: HeapConfig) -> Result<Self, HeapError> {
        config.validate()?;
        tracing::debug!(
            max_heap_bytes = ?config.max_heap_bytes,
            track_allocations = config.track_allocations,
            poison_freed = config.poison_freed,
            "runtime heap created"
        );
        let registry = config
            .track_allocations
            .then(|| Mutex::new(Registry::default()));
        Ok(Self {
            config,
            counters: Counters::default(),
            registry,
        })
    }

    /// The configuration this heap was created with.
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Allocate `size` bytes with unspecified contents.
    ///
    /// A zero-byte request returns a unique pointer that must still be
    /// freed.
    pub fn alloc(&self, size: usize) -> Result<NonNull<u8>, HeapError> {
        self.alloc_inner(size, false)
    }

    /// Allocate `size` zero-filled bytes.
    pub fn alloc_zeroed(&self, size: usize) -> Result<NonNull<u8>, HeapError> {
        self.alloc_inner(size, true)
    }

    /// Allocate a zero-filled array of `count` elements of `elem_size`
    /// bytes each.
    pub fn alloc_array(&self, count: usize, elem_size: usize) -> Result<NonNull<u8>, HeapError> {
        match count.checked_mul(elem_size) {
            Some(size) => self.alloc_inner(size, true),
            None => {
                let err = HeapError::SizeOverflow {
                    requested: usize::MAX,
                };
                self.counters.record_failure();
                tracing::warn!(count, elem_size, "array allocation size overflows");
                Err(err)
            }
        }
    }

    fn alloc_inner(&self, size: usize, zeroed: bool) -> Result<NonNull<u8>, HeapError> {
        // Size the block before reserving so an impossible request never
        // reaches the counters.
        let result = block::layout_for(size)
            .and_then(|_| self.counters.reserve(size, self.config.max_heap_bytes))
            .and_then(|()| {
                block::allocate(size, zeroed).inspect_err(|_| self.counters.unreserve(size))
            });
        match result {
            Ok(ptr) => {
                self.counters.record_block_alloc();
                if let Some(mut registry) = self.registry() {
                    registry.insert(ptr.as_ptr() as usize, size);
                }
                tracing::trace!(size, addr = ?ptr, "alloc");
                Ok(ptr)
            }
            Err(err) => {
                self.counters.record_failure();
                tracing::warn!(size, error = %err, "allocation failed");
                Err(err)
            }
        }
    }

    /// Resize a block, preserving its contents up to the smaller size.
    ///
    /// Returns the block's new location, which may equal `ptr`. On error
    /// `ptr` is still live and unchanged.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this heap and not yet freed. On
    /// success it must not be used again.
    pub unsafe fn realloc(&self, ptr: NonNull<u8>, new_size: usize) -> Result<NonNull<u8>, HeapError> {
        let addr = ptr.as_ptr() as usize;
        // On a tracked heap the guard is held until the block is re-keyed:
        // once `resize` releases the old address, another thread may be
        // handed it and must not register it before `relocate` runs.
        let mut registry = self.registry();
        // SAFETY: forwarded caller contract.
        let old_size = match registry.as_deref() {
            Some(registry) => registry.get(addr).map(|info| info.size),
            None => unsafe { block::live_size(ptr) },
        }
        .inspect_err(|err| tracing::warn!(addr, error = %err, "realloc of invalid block"))?;

        if new_size == old_size {
            return Ok(ptr);
        }

        if new_size > old_size {
            let growth = new_size - old_size;
            let reserved = block::layout_for(new_size)
                .and_then(|_| self.counters.reserve(growth, self.config.max_heap_bytes));
            if let Err(err) = reserved {
                self.counters.record_failure();
                tracing::warn!(old_size, new_size, error = %err, "realloc failed");
                return Err(err);
            }
        }

        // SAFETY: forwarded caller contract; the block is live.
        match unsafe { block::resize(ptr, new_size) } {
            Ok(new_ptr) => {
                if new_size < old_size {
                    self.counters.release_bytes(old_size - new_size);
                }
                if let Some(registry) = registry.as_mut() {
                    registry.relocate(addr, new_ptr.as_ptr() as usize, new_size);
                }
                drop(registry);
                tracing::trace!(old_size, new_size, from = ?ptr, to = ?new_ptr, "realloc");
                Ok(new_ptr)
            }
            Err(err) => {
                if new_size > old_size {
                    self.counters.unreserve(new_size - old_size);
                }
                self.counters.record_failure();
                tracing::warn!(old_size, new_size, error = %err, "realloc failed");
                Err(err)
            }
        }
    }

    /// Release a block.
    ///
    /// On a tracked heap, a pointer that is not live is reported and
    /// nothing is released. On an untracked heap the header tag is
    /// checked, which catches some but not all misuse.
    ///
    /// # Safety
    ///
    /// On an untracked heap, `ptr` must have been returned by this heap and
    /// not yet freed. On a tracked heap any pointer is accepted. In both
    /// cases a successfully freed pointer must not be used again.
    pub unsafe fn free(&self, ptr: NonNull<u8>) -> Result<(), HeapError> {
        let addr = ptr.as_ptr() as usize;
        if let Some(mut registry) = self.registry() {
            if let Err(err) = registry.remove(addr) {
                tracing::warn!(addr, error = %err, "rejected free");
                return Err(err);
            }
        }
        let poison = self.config.poison_freed.then_some(HeapConfig::POISON_BYTE);
        // SAFETY: the block is live, either by registry membership or by
        // caller contract.
        match unsafe { block::release(ptr, poison) } {
            Ok(size) => {
                self.counters.release_bytes(size);
                self.counters.record_block_free();
                tracing::trace!(size, addr, "free");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(addr, error = %err, "rejected free");
                Err(err)
            }
        }
    }

    /// Payload size of a live block.
    ///
    /// # Safety
    ///
    /// Same contract as [`Heap::free`].
    pub unsafe fn usable_size(&self, ptr: NonNull<u8>) -> Result<usize, HeapError> {
        match self.registry() {
            Some(registry) => registry.get(ptr.as_ptr() as usize).map(|info| info.size),
            // SAFETY: forwarded caller contract.
            None => unsafe { block::live_size(ptr) },
        }
    }

    /// Snapshot of the heap counters.
    pub fn stats(&self) -> HeapStats {
        self.counters.snapshot()
    }

    /// Live blocks in allocation order, or `None` on an untracked heap.
    pub fn live_blocks(&self) -> Option<Vec<(usize, BlockInfo)>> {
        self.registry().map(|registry| registry.snapshot())
    }

    /// Lock the registry, recovering from poisoning.
    ///
    /// The registry holds no invariant that a panic mid-update could
    /// break beyond one stale entry, so a poisoned lock is still usable.
    fn registry(&self) -> Option<MutexGuard<'_, Registry>> {
        self.registry
            .as_ref()
            .map(|m| m.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}

impl Default for Heap {
    /// An unlimited, untracked heap. Infallible, since the default
    /// config always validates.
    fn default() -> Self {
        Self {
            config: HeapConfig::default(),
            counters: Counters::default(),
            registry: None,
        }
    }
}

impl std::fmt::Debug for Heap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heap")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}
