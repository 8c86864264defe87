//! Live-block registry for tracked heaps.

use indexmap::{IndexMap, IndexSet};

use crate::error::HeapError;

/// How many released addresses are remembered for double-free reporting.
///
/// Older entries are forgotten in batches; a free of a forgotten address
/// reports `InvalidPointer` instead of `DoubleFree`.
const RECENTLY_FREED_CAP: usize = 4096;

/// What a tracked heap knows about one live block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    /// Payload size in bytes.
    pub size: usize,
    /// Allocation order, starting at 0 for the heap's first block.
    pub sequence: u64,
}

#[derive(Default)]
pub(crate) struct Registry {
    live: IndexMap<usize, BlockInfo>,
    recently_freed: IndexSet<usize>,
    next_sequence: u64,
}

impl Registry {
    pub(crate) fn insert(&mut self, addr: usize, size: usize) {
        // The platform allocator may hand back an address released earlier.
        self.recently_freed.swap_remove(&addr);
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.live.insert(addr, BlockInfo { size, sequence });
    }

    pub(crate) fn get(&self, addr: usize) -> Result<BlockInfo, HeapError> {
        self.live
            .get(&addr)
            .copied()
            .ok_or_else(|| self.missing(addr))
    }

    pub(crate) fn remove(&mut self, addr: usize) -> Result<BlockInfo, HeapError> {
        let info = self
            .live
            .swap_remove(&addr)
            .ok_or_else(|| self.missing(addr))?;
        self.recently_freed.insert(addr);
        if self.recently_freed.len() > 2 * RECENTLY_FREED_CAP {
            self.recently_freed.drain(..RECENTLY_FREED_CAP);
        }
        Ok(info)
    }

    /// Re-key a block after realloc moved or resized it, keeping its
    /// original sequence number.
    pub(crate) fn relocate(&mut self, old_addr: usize, new_addr: usize, new_size: usize) {
        let sequence = match self.live.swap_remove(&old_addr) {
            Some(info) => info.sequence,
            None => {
                let s = self.next_sequence;
                self.next_sequence += 1;
                s
            }
        };
        self.recently_freed.swap_remove(&new_addr);
        self.live.insert(
            new_addr,
            BlockInfo {
                size: new_size,
                sequence,
            },
        );
    }

    /// Live blocks ordered by allocation sequence.
    pub(crate) fn snapshot(&self) -> Vec<(usize, BlockInfo)> {
        let mut blocks: Vec<_> = self.live.iter().map(|(&a, &i)| (a, i)).collect();
        blocks.sort_by_key(|(_, info)| info.sequence);
        blocks
    }

    fn missing(&self, addr: usize) -> HeapError {
        if self.recently_freed.contains(&addr) {
            HeapError::DoubleFree { addr }
        } else {
            HeapError::InvalidPointer { addr }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_then_remove_is_double_free() {
        let mut r = Registry::default();
        r.insert(0x100, 8);
        assert_eq!(r.remove(0x100).unwrap().size, 8);
        assert_eq!(r.remove(0x100), Err(HeapError::DoubleFree { addr: 0x100 }));
    }

    #[test]
    fn unknown_address_is_invalid_pointer() {
        let mut r = Registry::default();
        assert_eq!(
            r.remove(0x200),
            Err(HeapError::InvalidPointer { addr: 0x200 })
        );
    }

    #[test]
    fn reused_address_is_live_again() {
        let mut r = Registry::default();
        r.insert(0x100, 8);
        r.remove(0x100).unwrap();
        r.insert(0x100, 32);
        let info = r.get(0x100).unwrap();
        assert_eq!(info.size, 32);
        assert_eq!(info.sequence, 1);
    }

    #[test]
    fn snapshot_is_in_allocation_order() {
        let mut r = Registry::default();
        r.insert(0x300, 1);
        r.insert(0x100, 2);
        r.insert(0x200, 3);
        // swap_remove reorders the map; the snapshot must not care.
        r.remove(0x300).unwrap();
        let addrs: Vec<usize> = r.snapshot().iter().map(|(a, _)| *a).collect();
        assert_eq!(addrs, vec![0x100, 0x200]);
    }

    #[test]
    fn relocate_keeps_sequence() {
        let mut r = Registry::default();
        r.insert(0x100, 8);
        r.insert(0x200, 8);
        r.relocate(0x100, 0x400, 64);
        let info = r.get(0x400).unwrap();
        assert_eq!(info, BlockInfo { size: 64, sequence: 0 });
        assert!(r.get(0x100).is_err());
    }

    #[test]
    fn recently_freed_is_bounded() {
        let mut r = Registry::default();
        for i in 0..(3 * RECENTLY_FREED_CAP) {
            let addr = (i + 1) * 16;
            r.insert(addr, 0);
            r.remove(addr).unwrap();
        }
        assert!(r.recently_freed.len() <= 2 * RECENTLY_FREED_CAP);
        // The most recent frees are still recognised.
        let last = 3 * RECENTLY_FREED_CAP * 16;
        assert_eq!(r.remove(last), Err(HeapError::DoubleFree { addr: last }));
        // The oldest were forgotten.
        assert_eq!(r.remove(16), Err(HeapError::InvalidPointer { addr: 16 }));
    }
}
