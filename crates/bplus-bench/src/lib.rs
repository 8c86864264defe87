//! Benchmark workloads for the B+ runtime heap.
//!
//! - [`SIZE_MIX`]: request sizes shaped like a typical B+ program
//!   (many small strings and objects, occasional large arrays)
//! - [`heap_profile`]: the heap configurations benchmarked side by side

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use bplus_heap::{Heap, HeapConfig};

/// Request sizes cycled through by the churn benchmarks.
pub const SIZE_MIX: [usize; 16] = [
    8, 16, 24, 32, 16, 48, 64, 8, 128, 24, 256, 32, 512, 16, 4096, 65536,
];

/// Named heap configurations: plain forwarding, limited, and tracked.
pub fn heap_profile() -> Vec<(&'static str, Heap)> {
    let mut profiles = vec![("plain", Heap::default())];
    if let Ok(heap) = Heap::new(HeapConfig::with_limit(1 << 30)) {
        profiles.push(("limited", heap));
    }
    if let Ok(heap) = Heap::new(HeapConfig {
        track_allocations: true,
        ..HeapConfig::default()
    }) {
        profiles.push(("tracked", heap));
    }
    profiles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_has_all_configurations() {
        let names: Vec<_> = heap_profile().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["plain", "limited", "tracked"]);
    }
}
