//! Runtime heap for compiled B+ programs.
//!
//! Every allocation a B+ program makes goes through [`Heap`], which
//! forwards to the platform allocator and prefixes each block with a
//! small header recording its payload size. The header is what lets
//! `free` work from a bare pointer, the way C callers expect.
//!
//! # Architecture
//!
//! ```text
//! Heap
//! ├── HeapConfig (limit, tracking, poisoning; immutable after creation)
//! ├── Counters (atomic live/peak/total accounting)
//! └── Registry (optional: ordered map of live blocks, behind a Mutex)
//!
//! block = [ header: size | tag ][ payload ... ]
//!         ^ platform allocation  ^ pointer handed to the program
//! ```
//!
//! This crate is one of two that may contain `unsafe` code (along with
//! `bplus-ffi`). All of it is confined to [`block`] and the pointer-taking
//! methods of [`Heap`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod block;
pub mod config;
pub mod error;
pub mod heap;
mod registry;
pub mod stats;

// Public re-exports for the primary API surface.
pub use block::{HEADER_SIZE, MIN_ALIGN};
pub use config::HeapConfig;
pub use error::HeapError;
pub use heap::Heap;
pub use registry::BlockInfo;
pub use stats::HeapStats;
