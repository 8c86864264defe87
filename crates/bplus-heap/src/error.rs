//! Heap-specific error types.

use std::error::Error;
use std::fmt;

/// Errors that can occur during heap operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeapError {
    /// The platform allocator returned null.
    OutOfMemory {
        /// Payload bytes requested.
        requested: usize,
    },
    /// The allocation would push live bytes past the configured limit.
    LimitExceeded {
        /// Payload bytes requested.
        requested: usize,
        /// Live payload bytes at the time of the request.
        live: usize,
        /// The configured `max_heap_bytes`.
        limit: usize,
    },
    /// Payload size plus header does not fit in a `Layout`.
    SizeOverflow {
        /// Payload bytes requested (saturated for `count * size` overflow).
        requested: usize,
    },
    /// The pointer does not refer to a live block of this heap.
    InvalidPointer {
        /// Address of the rejected payload pointer.
        addr: usize,
    },
    /// The block was already released (tracked heaps only).
    DoubleFree {
        /// Address of the payload pointer freed twice.
        addr: usize,
    },
    /// Configuration failed validation.
    InvalidConfig {
        /// Human-readable reason.
        reason: String,
    },
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory { requested } => {
                write!(f, "out of memory: requested {requested} bytes")
            }
            Self::LimitExceeded {
                requested,
                live,
                limit,
            } => {
                write!(
                    f,
                    "heap limit exceeded: requested {requested} bytes with {live} live, limit {limit} bytes"
                )
            }
            Self::SizeOverflow { requested } => {
                write!(f, "allocation size overflow: requested {requested} bytes")
            }
            Self::InvalidPointer { addr } => {
                write!(f, "pointer {addr:#x} is not a live heap block")
            }
            Self::DoubleFree { addr } => {
                write!(f, "block {addr:#x} was already freed")
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid heap config: {reason}")
            }
        }
    }
}

impl Error for HeapError {}
