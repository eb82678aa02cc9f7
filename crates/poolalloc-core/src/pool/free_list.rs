//! Segregated free lists, one per size class.
//!
//! Lists are intrusive: a free block stores the handle of its successor in
//! its own first bytes, so pushing and popping never allocate. Reuse is LIFO,
//! the most recently released block is handed out first.

use super::region::{BlockPtr, RegionTable};
use super::size_class::NUM_SIZE_CLASSES;

/// Heads of the per-class free lists.
#[derive(Debug, Clone)]
pub struct FreeListBank {
    heads: [Option<BlockPtr>; NUM_SIZE_CLASSES],
    lens: [usize; NUM_SIZE_CLASSES],
}

impl FreeListBank {
    /// Creates a bank with every list empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Unlinks and returns the head of `class`, or `None` on a miss.
    pub(crate) fn pop(&mut self, class: usize, memory: &RegionTable) -> Option<BlockPtr> {
        let head = self.heads[class]?;
        self.heads[class] = memory.read_link(head);
        self.lens[class] = self.lens[class].saturating_sub(1);
        if self.heads[class].is_none() {
            self.lens[class] = 0;
        }
        Some(head)
    }

    /// Makes `block` the new head of `class`.
    ///
    /// The block's size is not checked against the class. Returns false
    /// (and leaves the list untouched) if `block` does not address owned
    /// memory.
    pub(crate) fn push(&mut self, class: usize, block: BlockPtr, memory: &mut RegionTable) -> bool {
        if !memory.write_link(block, self.heads[class]) {
            return false;
        }
        self.heads[class] = Some(block);
        self.lens[class] += 1;
        true
    }

    /// Replaces the list of `class` with an already-linked chain.
    pub(crate) fn install(&mut self, class: usize, head: Option<BlockPtr>, len: usize) {
        self.heads[class] = head;
        self.lens[class] = if head.is_some() { len } else { 0 };
    }

    /// Current head of `class`.
    pub fn head(&self, class: usize) -> Option<BlockPtr> {
        self.heads.get(class).copied().flatten()
    }

    /// Number of blocks on the list of `class`.
    pub fn len(&self, class: usize) -> usize {
        self.lens.get(class).copied().unwrap_or(0)
    }

    /// True if every list is empty.
    pub fn is_empty(&self) -> bool {
        self.heads.iter().all(Option::is_none)
    }

    /// Total blocks across all lists.
    pub fn total_len(&self) -> usize {
        self.lens.iter().sum()
    }

    /// Snapshot of every head, indexed by class.
    pub fn heads(&self) -> [Option<BlockPtr>; NUM_SIZE_CLASSES] {
        self.heads
    }

    /// Follows the links of `class` from the head.
    ///
    /// Stops after `len(class) + 1` steps so a corrupted cycle cannot hang
    /// the walk.
    pub(crate) fn walk(&self, class: usize, memory: &RegionTable) -> Vec<BlockPtr> {
        let mut out = Vec::with_capacity(self.len(class));
        let mut cursor = self.head(class);
        while let Some(block) = cursor {
            if out.len() > self.len(class) {
                break;
            }
            out.push(block);
            cursor = memory.read_link(block);
        }
        out
    }
}

impl Default for FreeListBank {
    fn default() -> Self {
        Self {
            heads: [None; NUM_SIZE_CLASSES],
            lens: [0; NUM_SIZE_CLASSES],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::region::RegionKind;

    fn memory_with_region(len: usize) -> (RegionTable, u32) {
        let mut memory = RegionTable::new();
        let region = memory
            .insert(vec![0u8; len].into_boxed_slice(), RegionKind::Arena)
            .unwrap();
        (memory, region)
    }

    #[test]
    fn test_new_bank_empty() {
        let bank = FreeListBank::new();
        assert!(bank.is_empty());
        assert_eq!(bank.total_len(), 0);
        for class in 0..NUM_SIZE_CLASSES {
            assert!(bank.head(class).is_none());
        }
    }

    #[test]
    fn test_pop_empty_is_miss() {
        let (memory, _) = memory_with_region(64);
        let mut bank = FreeListBank::new();
        assert!(bank.pop(0, &memory).is_none());
        assert!(bank.pop(NUM_SIZE_CLASSES - 1, &memory).is_none());
    }

    #[test]
    fn test_single_push_has_nil_successor() {
        let (mut memory, r) = memory_with_region(64);
        let mut bank = FreeListBank::new();
        let a = BlockPtr::new(r, 0);

        assert!(bank.push(3, a, &mut memory));
        assert_eq!(bank.head(3), Some(a));
        assert_eq!(bank.len(3), 1);
        assert_eq!(memory.read_link(a), None);
    }

    #[test]
    fn test_lifo_order() {
        let (mut memory, r) = memory_with_region(64);
        let mut bank = FreeListBank::new();
        let a = BlockPtr::new(r, 0);
        let b = BlockPtr::new(r, 32);

        bank.push(3, a, &mut memory);
        bank.push(3, b, &mut memory);
        assert_eq!(bank.head(3), Some(b));
        assert_eq!(memory.read_link(b), Some(a));

        assert_eq!(bank.pop(3, &memory), Some(b));
        assert_eq!(bank.pop(3, &memory), Some(a));
        assert!(bank.pop(3, &memory).is_none());
        assert_eq!(bank.len(3), 0);
    }

    #[test]
    fn test_classes_are_independent() {
        let (mut memory, r) = memory_with_region(64);
        let mut bank = FreeListBank::new();
        bank.push(0, BlockPtr::new(r, 0), &mut memory);
        bank.push(5, BlockPtr::new(r, 8), &mut memory);

        assert_eq!(bank.pop(0, &memory), Some(BlockPtr::new(r, 0)));
        assert!(bank.pop(0, &memory).is_none());
        assert_eq!(bank.len(5), 1);
    }

    #[test]
    fn test_push_rejects_unowned_block() {
        let (mut memory, r) = memory_with_region(16);
        let mut bank = FreeListBank::new();
        assert!(!bank.push(0, BlockPtr::new(r + 1, 0), &mut memory));
        assert!(bank.is_empty());
    }

    #[test]
    fn test_install_and_walk() {
        let (mut memory, r) = memory_with_region(64);
        let blocks: Vec<BlockPtr> = (0..4).map(|i| BlockPtr::new(r, i * 16)).collect();
        for pair in blocks.windows(2) {
            memory.write_link(pair[0], Some(pair[1]));
        }
        memory.write_link(blocks[3], None);

        let mut bank = FreeListBank::new();
        bank.install(1, Some(blocks[0]), 4);
        assert_eq!(bank.len(1), 4);
        assert_eq!(bank.walk(1, &memory), blocks);
    }
}
