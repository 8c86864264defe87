//! C-compatible status codes and the per-thread last-error slot.
//!
//! [`BplusStatus`] covers every failure of the runtime heap. Calls that
//! return a pointer (or nothing) cannot carry a status, so every failing
//! call also records its status in a thread-local slot readable through
//! `bplus_last_error`.

use std::cell::Cell;

use bplus_heap::HeapError;

/// C-compatible status code.
///
/// `Ok` = 0, all errors are negative. Values are ABI-stable.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BplusStatus {
    /// Success.
    Ok = 0,
    /// The platform allocator returned null.
    OutOfMemory = -1,
    /// The heap limit would be exceeded.
    LimitExceeded = -2,
    /// Pointer is not a live block of the runtime heap.
    InvalidPointer = -3,
    /// Block was already freed (tracked heaps only).
    DoubleFree = -4,
    /// Configuration validation error.
    ConfigError = -5,
    /// `bplus_runtime_init` called after the heap already exists.
    AlreadyInitialized = -6,
    /// An argument is null, out of range, or otherwise invalid.
    InvalidArgument = -7,
    /// Requested operation needs a tracked heap.
    NotTracked = -8,
    /// Internal error.
    InternalError = -9,
    /// A Rust panic was caught at the FFI boundary.
    Panicked = -128,
}

#[cfg(test)]
impl BplusStatus {
    /// Decode a raw status; unknown values map to `InternalError`.
    fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Ok,
            -1 => Self::OutOfMemory,
            -2 => Self::LimitExceeded,
            -3 => Self::InvalidPointer,
            -4 => Self::DoubleFree,
            -5 => Self::ConfigError,
            -6 => Self::AlreadyInitialized,
            -7 => Self::InvalidArgument,
            -8 => Self::NotTracked,
            -128 => Self::Panicked,
            _ => Self::InternalError,
        }
    }
}

impl From<&HeapError> for BplusStatus {
    fn from(e: &HeapError) -> Self {
        match e {
            // Size overflow is an allocation the platform could never satisfy.
            HeapError::OutOfMemory { .. } | HeapError::SizeOverflow { .. } => {
                BplusStatus::OutOfMemory
            }
            HeapError::LimitExceeded { .. } => BplusStatus::LimitExceeded,
            HeapError::InvalidPointer { .. } => BplusStatus::InvalidPointer,
            HeapError::DoubleFree { .. } => BplusStatus::DoubleFree,
            HeapError::InvalidConfig { .. } => BplusStatus::ConfigError,
        }
    }
}

thread_local! {
    static LAST_ERROR: Cell<BplusStatus> = const { Cell::new(BplusStatus::Ok) };
}

pub(crate) fn set_last_error(status: BplusStatus) {
    LAST_ERROR.with(|cell| cell.set(status));
}

/// Record `e` as this thread's last error and return its status.
pub(crate) fn fail(e: &HeapError) -> BplusStatus {
    let status = BplusStatus::from(e);
    set_last_error(status);
    status
}

/// Status of the most recent failing call on this thread.
///
/// Successful calls do not reset it; use `bplus_clear_error`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn bplus_last_error() -> i32 {
    LAST_ERROR.with(|cell| cell.get()) as i32
}

/// Reset this thread's last error to `Ok`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn bplus_clear_error() {
    set_last_error(BplusStatus::Ok);
}
