//! Allocation entry points called by compiled B+ programs.
//!
//! `bplus_alloc` / `bplus_free` are the pair the code generator emits.
//! The rest mirror the C allocation family so runtime support code can
//! use one heap for everything.

use std::ffi::c_void;
use std::ptr::{self, NonNull};

use crate::runtime::heap;
use crate::status::fail;

/// Allocate `size` bytes. Returns null on failure.
///
/// The block is aligned to 16 bytes and its contents are unspecified. A
/// zero-byte request still returns a unique pointer that must be freed.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn bplus_alloc(size: usize) -> *mut c_void {
    ffi_guard_or!(ptr::null_mut(), {
        match heap().alloc(size) {
            Ok(p) => p.as_ptr().cast(),
            Err(err) => {
                fail(&err);
                ptr::null_mut()
            }
        }
    })
}

/// Release a block returned by any `bplus_*alloc` call. Null is ignored.
///
/// An invalid or repeated free is logged and recorded in
/// `bplus_last_error`; nothing is released.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn bplus_free(ptr: *mut c_void) {
    ffi_guard_or!((), {
        let Some(p) = NonNull::new(ptr.cast::<u8>()) else {
            return;
        };
        // SAFETY: p came from this heap per caller contract; a tracked
        // heap validates it before touching the block.
        if let Err(err) = unsafe { heap().free(p) } {
            fail(&err);
        }
    })
}

/// Allocate `size` zero-filled bytes. Returns null on failure.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn bplus_alloc_zeroed(size: usize) -> *mut c_void {
    ffi_guard_or!(ptr::null_mut(), {
        match heap().alloc_zeroed(size) {
            Ok(p) => p.as_ptr().cast(),
            Err(err) => {
                fail(&err);
                ptr::null_mut()
            }
        }
    })
}

/// Allocate a zero-filled array of `count` elements of `size` bytes.
/// Returns null on failure, including when `count * size` overflows.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn bplus_calloc(count: usize, size: usize) -> *mut c_void {
    ffi_guard_or!(ptr::null_mut(), {
        match heap().alloc_array(count, size) {
            Ok(p) => p.as_ptr().cast(),
            Err(err) => {
                fail(&err);
                ptr::null_mut()
            }
        }
    })
}

/// Resize a block, preserving contents up to the smaller size.
///
/// A null `ptr` behaves like `bplus_alloc(size)`. `size == 0` shrinks the
/// block to a zero-sized one, which still has to be freed. On failure
/// returns null and `ptr` remains valid.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn bplus_realloc(ptr: *mut c_void, size: usize) -> *mut c_void {
    ffi_guard_or!(ptr::null_mut(), {
        let Some(p) = NonNull::new(ptr.cast::<u8>()) else {
            return match heap().alloc(size) {
                Ok(p) => p.as_ptr().cast(),
                Err(err) => {
                    fail(&err);
                    ptr::null_mut()
                }
            };
        };
        // SAFETY: p came from this heap per caller contract.
        match unsafe { heap().realloc(p, size) } {
            Ok(p) => p.as_ptr().cast(),
            Err(err) => {
                fail(&err);
                ptr::null_mut()
            }
        }
    })
}

/// Payload size of a block, or 0 for null or an invalid pointer.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn bplus_usable_size(ptr: *mut c_void) -> usize {
    ffi_guard_or!(0, {
        let Some(p) = NonNull::new(ptr.cast::<u8>()) else {
            return 0;
        };
        // SAFETY: p came from this heap per caller contract.
        match unsafe { heap().usable_size(p) } {
            Ok(size) => size,
            Err(err) => {
                fail(&err);
                0
            }
        }
    })
}
