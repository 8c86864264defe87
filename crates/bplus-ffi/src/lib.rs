//! C ABI of the B+ runtime heap.
//!
//! Compiled B+ programs call `bplus_alloc` and `bplus_free`; everything
//! else here (zeroed and array allocation, realloc, statistics, runtime
//! init, error reporting) is the companion surface a C runtime library
//! is expected to carry. This crate is one of two that may contain
//! `unsafe` code (along with `bplus-heap`).
//!
//! Every export runs inside [`std::panic::catch_unwind`]: a Rust panic
//! becomes [`BplusStatus::Panicked`] (or a null pointer) and never
//! unwinds into C.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

/// Run an FFI body, mapping a panic to [`BplusStatus::Panicked`].
macro_rules! ffi_guard {
    ($body:block) => {
        ffi_guard_or!($crate::status::BplusStatus::Panicked as i32, $body)
    };
}

/// Run an FFI body, mapping a panic to `$fallback`.
///
/// The thread's last error is set to `Panicked` either way.
macro_rules! ffi_guard_or {
    ($fallback:expr, $body:block) => {
        match ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| $body)) {
            Ok(value) => value,
            Err(_) => {
                $crate::status::set_last_error($crate::status::BplusStatus::Panicked);
                tracing::error!("panic caught at FFI boundary");
                $fallback
            }
        }
    };
}

pub mod alloc;
pub mod config;
pub mod runtime;
pub mod stats;
pub mod status;

pub use config::BplusHeapConfig;
pub use stats::BplusHeapStats;
pub use status::BplusStatus;
