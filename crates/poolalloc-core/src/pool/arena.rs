//! Growth arena: the not-yet-carved tail of the newest system region.
//!
//! The arena is a cursor pair `[start, end)` over one region plus the
//! cumulative number of bytes ever requested from the system allocator.
//! It only moves forward; exhausted regions stay owned by the pool because
//! their blocks live on in the free lists.

use super::region::BlockPtr;

/// Carving cursor over the current arena region.
#[derive(Debug, Clone, Default)]
pub struct Arena {
    /// Region being carved (`None` before the first growth).
    region: Option<u32>,
    start: u32,
    end: u32,
    /// Total bytes ever obtained for arena growth. Sizing heuristic only.
    heap_size: usize,
}

impl Arena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes left between the cursors.
    pub fn remaining(&self) -> usize {
        (self.end - self.start) as usize
    }

    /// Cumulative bytes requested from the system for growth.
    pub fn heap_size(&self) -> usize {
        self.heap_size
    }

    /// Region currently being carved.
    pub fn region(&self) -> Option<u32> {
        self.region
    }

    /// Cuts `bytes` off the front of the arena.
    ///
    /// Returns `None` if fewer than `bytes` remain.
    pub(crate) fn carve(&mut self, bytes: usize) -> Option<BlockPtr> {
        let region = self.region?;
        if bytes > self.remaining() {
            return None;
        }
        let ptr = BlockPtr::new(region, self.start);
        self.start += bytes as u32;
        Some(ptr)
    }

    /// Removes whatever is left and returns it as a single block.
    pub(crate) fn take_leftover(&mut self) -> Option<(BlockPtr, usize)> {
        let region = self.region?;
        let left = self.remaining();
        self.start = self.end;
        if left == 0 {
            return None;
        }
        Some((BlockPtr::new(region, self.end - left as u32), left))
    }

    /// Points the arena at a fresh region of `len` bytes and records the growth.
    pub(crate) fn grow_into(&mut self, region: u32, len: usize) {
        self.region = Some(region);
        self.start = 0;
        self.end = len as u32;
        self.heap_size = self.heap_size.saturating_add(len);
    }

    /// Points the arena at a salvaged block of `len` bytes.
    ///
    /// Salvage does not count towards `heap_size`.
    pub(crate) fn adopt(&mut self, block: BlockPtr, len: usize) {
        self.region = Some(block.region());
        self.start = block.offset();
        self.end = block.offset() + len as u32;
    }
}
