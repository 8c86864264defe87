//! Block header codec over the platform allocator.
//!
//! A block is one platform allocation laid out as:
//!
//! ```text
//! base                      base + HEADER_SIZE
//! ├── size: usize ──┬── tag ─┼── payload (size bytes) ──────────┤
//! ```
//!
//! Only the payload pointer ever leaves this module. The header carries
//! the payload size so a block can be released from its pointer alone,
//! and a tag word that distinguishes live blocks from released ones.

#![allow(unsafe_code)]

use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};

use crate::error::HeapError;

/// Alignment of every payload pointer, matching `max_align_t` on 64-bit
/// targets.
pub const MIN_ALIGN: usize = 16;

/// Bytes reserved in front of every payload.
pub const HEADER_SIZE: usize = 16;

const LIVE_TAG: usize = 0xB1C0_A11C;
const FREED_TAG: usize = 0xDEAD_B1C0;

#[repr(C, align(16))]
struct Header {
    size: usize,
    tag: usize,
}

const _: () = assert!(std::mem::size_of::<Header>() == HEADER_SIZE);
const _: () = assert!(std::mem::align_of::<Header>() == MIN_ALIGN);

/// Largest payload a block can carry.
///
/// `HEADER_SIZE + size`, rounded up to `MIN_ALIGN`, must not exceed
/// `isize::MAX`.
pub(crate) const MAX_PAYLOAD: usize = isize::MAX as usize - HEADER_SIZE - (MIN_ALIGN - 1);

/// Platform layout for a block carrying `size` payload bytes.
pub(crate) fn layout_for(size: usize) -> Result<Layout, HeapError> {
    if size > MAX_PAYLOAD {
        return Err(HeapError::SizeOverflow { requested: size });
    }
    Layout::from_size_align(HEADER_SIZE + size, MIN_ALIGN)
        .map_err(|_| HeapError::SizeOverflow { requested: size })
}

/// Allocate a block and return its payload pointer.
///
/// With `zeroed`, the payload is zero-filled; otherwise its contents are
/// unspecified.
pub(crate) fn allocate(size: usize, zeroed: bool) -> Result<NonNull<u8>, HeapError> {
    let layout = layout_for(size)?;
    // SAFETY: layout size is at least HEADER_SIZE, never zero.
    let raw = unsafe {
        if zeroed {
            alloc::alloc_zeroed(layout)
        } else {
            alloc::alloc(layout)
        }
    };
    let base = NonNull::new(raw).ok_or(HeapError::OutOfMemory { requested: size })?;
    // SAFETY: base is a fresh allocation of at least HEADER_SIZE bytes,
    // aligned to MIN_ALIGN, so it can hold a Header and the payload
    // starts in bounds.
    unsafe {
        base.cast::<Header>().as_ptr().write(Header {
            size,
            tag: LIVE_TAG,
        });
        Ok(NonNull::new_unchecked(base.as_ptr().add(HEADER_SIZE)))
    }
}

fn header_of(payload: NonNull<u8>) -> Result<*mut Header, HeapError> {
    let addr = payload.as_ptr() as usize;
    if addr % MIN_ALIGN != 0 || addr < HEADER_SIZE {
        return Err(HeapError::InvalidPointer { addr });
    }
    // Pointer arithmetic only; nothing is dereferenced here.
    Ok(payload.as_ptr().wrapping_sub(HEADER_SIZE) as *mut Header)
}

/// Payload size of a live block.
///
/// # Safety
///
/// `payload` must point `HEADER_SIZE` bytes past readable memory. That
/// holds for every pointer returned by [`allocate`] that has not been
/// released. The tag check rejects some misuse but cannot make reading
/// a foreign or released pointer sound.
pub(crate) unsafe fn live_size(payload: NonNull<u8>) -> Result<usize, HeapError> {
    let header = header_of(payload)?;
    // SAFETY: caller guarantees the header is readable.
    let header = unsafe { &*header };
    if header.tag != LIVE_TAG {
        return Err(HeapError::InvalidPointer {
            addr: payload.as_ptr() as usize,
        });
    }
    Ok(header.size)
}

/// Overwrite `size` payload bytes with `byte`.
///
/// # Safety
///
/// `payload` must be valid for `size` bytes of writes.
unsafe fn poison(payload: NonNull<u8>, size: usize, byte: u8) {
    // SAFETY: forwarded caller contract.
    unsafe { ptr::write_bytes(payload.as_ptr(), byte, size) };
}

/// Release a block back to the platform allocator, returning its
/// payload size.
///
/// # Safety
///
/// `payload` must be a live pointer from [`allocate`] or [`resize`], and
/// must not be used again afterwards.
pub(crate) unsafe fn release(payload: NonNull<u8>, fill: Option<u8>) -> Result<usize, HeapError> {
    // SAFETY: forwarded caller contract.
    let size = unsafe { live_size(payload)? };
    let header = header_of(payload)?;
    let layout = layout_for(size)?;
    // SAFETY: the block is live and spans HEADER_SIZE + size bytes from
    // its base, allocated with exactly `layout`.
    unsafe {
        if let Some(byte) = fill {
            poison(payload, size, byte);
        }
        (*header).tag = FREED_TAG;
        alloc::dealloc(header as *mut u8, layout);
    }
    Ok(size)
}

/// Grow or shrink a block, preserving the payload prefix.
///
/// On error the original block is untouched and still live.
///
/// # Safety
///
/// `payload` must be a live pointer from [`allocate`] or [`resize`]. On
/// success it must not be used again; use the returned pointer instead.
pub(crate) unsafe fn resize(payload: NonNull<u8>, new_size: usize) -> Result<NonNull<u8>, HeapError> {
    // SAFETY: forwarded caller contract.
    let old_size = unsafe { live_size(payload)? };
    let header = header_of(payload)?;
    let old_layout = layout_for(old_size)?;
    let new_layout = layout_for(new_size)?;
    // SAFETY: the block was allocated with `old_layout`; `new_layout`
    // shares its alignment and its size was validated above.
    let raw = unsafe { alloc::realloc(header as *mut u8, old_layout, new_layout.size()) };
    let base = NonNull::new(raw).ok_or(HeapError::OutOfMemory {
        requested: new_size,
    })?;
    // SAFETY: base is the (possibly moved) block, at least HEADER_SIZE
    // bytes long and still aligned to MIN_ALIGN.
    unsafe {
        (*base.cast::<Header>().as_ptr()).size = new_size;
        Ok(NonNull::new_unchecked(base.as_ptr().add(HEADER_SIZE)))
    }
}
