//! Process-wide runtime heap and its initialisation.
//!
//! The heap is created exactly once: either explicitly by
//! `bplus_runtime_init`, or lazily from the environment by the first
//! allocation. Once created its configuration never changes.

use std::sync::OnceLock;

use bplus_heap::{Heap, HeapConfig};
use tracing_subscriber::EnvFilter;

use crate::config::BplusHeapConfig;
use crate::status::{fail, set_last_error, BplusStatus};

static HEAP: OnceLock<Heap> = OnceLock::new();

/// Environment variable holding the `tracing` filter for runtime logs.
pub const ENV_LOG: &str = "BPLUS_LOG";

/// The runtime heap, created from the environment on first use.
///
/// Installs logging first, as `bplus_runtime_init` would. An unusable
/// environment config falls back to the default heap rather than failing
/// the program's first allocation.
pub(crate) fn heap() -> &'static Heap {
    HEAP.get_or_init(|| {
        install_logging();
        match HeapConfig::from_env().and_then(Heap::new) {
            Ok(heap) => heap,
            Err(err) => {
                tracing::warn!(error = %err, "ignoring heap environment config; using defaults");
                Heap::default()
            }
        }
    })
}

/// Install a stderr `tracing` subscriber filtered by `BPLUS_LOG`.
///
/// Does nothing if the host process already installed a global
/// subscriber.
fn install_logging() {
    let filter = EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Initialise the runtime: logging, then the heap.
///
/// `config` may be null, in which case the heap is configured from the
/// `BPLUS_HEAP_*` environment variables. Must be called before the first
/// allocation; afterwards it returns `AlreadyInitialized` and the
/// existing heap is kept.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn bplus_runtime_init(config: *const BplusHeapConfig) -> i32 {
    ffi_guard!({
        install_logging();

        if HEAP.get().is_some() {
            set_last_error(BplusStatus::AlreadyInitialized);
            return BplusStatus::AlreadyInitialized as i32;
        }

        let config = if config.is_null() {
            HeapConfig::from_env()
        } else {
            // SAFETY: config is valid per caller contract.
            unsafe { *config }.to_rust()
        };
        let heap = match config.and_then(Heap::new) {
            Ok(heap) => heap,
            Err(err) => {
                tracing::error!(error = %err, "runtime heap configuration rejected");
                return fail(&err) as i32;
            }
        };

        match HEAP.set(heap) {
            Ok(()) => {
                tracing::info!("B+ runtime initialised");
                BplusStatus::Ok as i32
            }
            // Lost a race with another init or a first allocation.
            Err(_) => {
                set_last_error(BplusStatus::AlreadyInitialized);
                BplusStatus::AlreadyInitialized as i32
            }
        }
    })
}
