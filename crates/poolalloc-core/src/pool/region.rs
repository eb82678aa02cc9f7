//! Region table and block handles.
//!
//! Every byte the pool owns lives in a region obtained from the system
//! allocator. Blocks are addressed by `(region, offset)` handles instead of
//! raw addresses, and free-list links are stored as encoded handles in the
//! first bytes of the free block itself.

use std::fmt;

use super::size_class::ALIGN;

/// Largest region the pool will track. Offsets are 32-bit.
pub const MAX_REGION_BYTES: usize = (u32::MAX as usize) & !(ALIGN - 1);

/// Encoded link value marking the end of a free list.
const NIL_LINK: u64 = u64::MAX;

/// Bytes occupied by an encoded link at the start of a free block.
pub(crate) const LINK_BYTES: usize = core::mem::size_of::<u64>();

/// Handle to a block inside a pool region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockPtr {
    region: u32,
    offset: u32,
}

impl BlockPtr {
    pub(crate) const fn new(region: u32, offset: u32) -> Self {
        Self { region, offset }
    }

    /// Index of the region holding this block.
    pub const fn region(self) -> u32 {
        self.region
    }

    /// Byte offset of the block within its region.
    pub const fn offset(self) -> u32 {
        self.offset
    }

    /// Handle `bytes` further into the same region.
    ///
    /// Callers only step within a region they carved, whose length is
    /// bounded by [`MAX_REGION_BYTES`].
    pub(crate) const fn advance(self, bytes: usize) -> Self {
        Self {
            region: self.region,
            offset: self.offset + bytes as u32,
        }
    }

    fn encode(link: Option<Self>) -> u64 {
        match link {
            Some(ptr) => (u64::from(ptr.region) << 32) | u64::from(ptr.offset),
            None => NIL_LINK,
        }
    }

    fn decode(raw: u64) -> Option<Self> {
        if raw == NIL_LINK {
            return None;
        }
        Some(Self {
            region: (raw >> 32) as u32,
            offset: raw as u32,
        })
    }
}

impl fmt::Display for BlockPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}+0x{:x}", self.region, self.offset)
    }
}

/// What a region is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RegionKind {
    /// Carved into small blocks. Never returned while the pool lives.
    Arena,
    /// Backs exactly one large allocation at offset 0.
    Large,
}

/// Owned system regions, indexed by slot.
#[derive(Debug, Default)]
pub(crate) struct RegionTable {
    slots: Vec<Option<Box<[u8]>>>,
    /// Kind of each slot, valid while the slot is occupied.
    kinds: Vec<RegionKind>,
    /// Slots released by large frees, reused before growing `slots`.
    vacant: Vec<u32>,
    live: usize,
}

impl RegionTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of `region` and returns its slot index.
    ///
    /// Hands the region back if the index space is exhausted (the top index
    /// is reserved for the end-of-list link).
    pub(crate) fn insert(
        &mut self,
        region: Box<[u8]>,
        kind: RegionKind,
    ) -> Result<u32, Box<[u8]>> {
        if let Some(index) = self.vacant.pop() {
            self.slots[index as usize] = Some(region);
            self.kinds[index as usize] = kind;
            self.live += 1;
            return Ok(index);
        }
        let Ok(index) = u32::try_from(self.slots.len()) else {
            return Err(region);
        };
        if index == u32::MAX {
            return Err(region);
        }
        self.slots.push(Some(region));
        self.kinds.push(kind);
        self.live += 1;
        Ok(index)
    }

    /// Gives up ownership of the region at `index` if it is of `kind`.
    pub(crate) fn remove(&mut self, index: u32, kind: RegionKind) -> Option<Box<[u8]>> {
        if self.kind(index)? != kind {
            return None;
        }
        let region = self.slots.get_mut(index as usize)?.take()?;
        self.vacant.push(index);
        self.live -= 1;
        Some(region)
    }

    /// Number of regions currently owned.
    pub(crate) fn live(&self) -> usize {
        self.live
    }

    /// Kind of the occupied region at `index`.
    pub(crate) fn kind(&self, index: u32) -> Option<RegionKind> {
        self.region(index)?;
        self.kinds.get(index as usize).copied()
    }

    /// Length of the region at `index`.
    pub(crate) fn region_len(&self, index: u32) -> Option<usize> {
        self.slots.get(index as usize)?.as_ref().map(|r| r.len())
    }

    fn region(&self, index: u32) -> Option<&[u8]> {
        self.slots.get(index as usize)?.as_deref()
    }

    fn region_mut(&mut self, index: u32) -> Option<&mut [u8]> {
        self.slots.get_mut(index as usize)?.as_deref_mut()
    }

    pub(crate) fn slice(&self, ptr: BlockPtr, len: usize) -> Option<&[u8]> {
        let start = ptr.offset as usize;
        self.region(ptr.region)?.get(start..start.checked_add(len)?)
    }

    pub(crate) fn slice_mut(&mut self, ptr: BlockPtr, len: usize) -> Option<&mut [u8]> {
        let start = ptr.offset as usize;
        self.region_mut(ptr.region)?
            .get_mut(start..start.checked_add(len)?)
    }

    /// Reads the free-list link stored in `ptr`.
    ///
    /// An unreadable block reads as end-of-list.
    pub(crate) fn read_link(&self, ptr: BlockPtr) -> Option<BlockPtr> {
        let bytes = self.slice(ptr, LINK_BYTES)?;
        let raw: [u8; LINK_BYTES] = bytes.try_into().ok()?;
        BlockPtr::decode(u64::from_le_bytes(raw))
    }

    /// Stores `next` as the free-list link of `ptr`.
    ///
    /// Returns false if `ptr` does not address `LINK_BYTES` owned bytes.
    pub(crate) fn write_link(&mut self, ptr: BlockPtr, next: Option<BlockPtr>) -> bool {
        match self.slice_mut(ptr, LINK_BYTES) {
            Some(bytes) => {
                bytes.copy_from_slice(&BlockPtr::encode(next).to_le_bytes());
                true
            }
            None => false,
        }
    }

    /// Copies `len` bytes from `src` to `dst`, which may live in different regions.
    pub(crate) fn copy(&mut self, src: BlockPtr, dst: BlockPtr, len: usize) -> Option<()> {
        let s = src.offset as usize;
        let d = dst.offset as usize;
        if src.region == dst.region {
            let buf = self.region_mut(src.region)?;
            if s.checked_add(len)? > buf.len() || d.checked_add(len)? > buf.len() {
                return None;
            }
            buf.copy_within(s..s + len, d);
            return Some(());
        }

        let (a, b) = (src.region as usize, dst.region as usize);
        if a.max(b) >= self.slots.len() {
            return None;
        }
        let (from, to) = if a < b {
            let (lo, hi) = self.slots.split_at_mut(b);
            (lo[a].as_deref()?, hi[0].as_deref_mut()?)
        } else {
            let (lo, hi) = self.slots.split_at_mut(a);
            (hi[0].as_deref()?, lo[b].as_deref_mut()?)
        };
        let from = from.get(s..s.checked_add(len)?)?;
        to.get_mut(d..d.checked_add(len)?)?.copy_from_slice(from);
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(len: usize) -> Box<[u8]> {
        vec![0u8; len].into_boxed_slice()
    }

    #[test]
    fn test_link_roundtrip_through_block_bytes() {
        let mut table = RegionTable::new();
        let r = table.insert(region(64), RegionKind::Arena).unwrap();
        let a = BlockPtr::new(r, 0);
        let b = BlockPtr::new(r, 16);

        assert!(table.write_link(a, Some(b)));
        assert!(table.write_link(b, None));
        assert_eq!(table.read_link(a), Some(b));
        assert_eq!(table.read_link(b), None);
    }

    #[test]
    fn test_write_link_rejects_out_of_bounds() {
        let mut table = RegionTable::new();
        let r = table.insert(region(16), RegionKind::Arena).unwrap();
        assert!(!table.write_link(BlockPtr::new(r, 12), None));
        assert!(!table.write_link(BlockPtr::new(r + 1, 0), None));
        assert_eq!(table.read_link(BlockPtr::new(r + 7, 0)), None);
    }

    #[test]
    fn test_remove_recycles_slot() {
        let mut table = RegionTable::new();
        let a = table.insert(region(8), RegionKind::Large).unwrap();
        let b = table.insert(region(8), RegionKind::Large).unwrap();
        assert_eq!(table.live(), 2);

        let removed = table.remove(a, RegionKind::Large).unwrap();
        assert_eq!(removed.len(), 8);
        assert!(table.remove(a, RegionKind::Large).is_none());
        assert_eq!(table.live(), 1);

        let c = table.insert(region(24), RegionKind::Arena).unwrap();
        assert_eq!(c, a);
        assert_ne!(c, b);
        assert_eq!(table.region_len(c), Some(24));
        assert_eq!(table.kind(c), Some(RegionKind::Arena));
        assert_eq!(table.kind(a), None);
    }

    #[test]
    fn test_remove_requires_matching_kind() {
        let mut table = RegionTable::new();
        let arena = table.insert(region(64), RegionKind::Arena).unwrap();
        assert!(table.remove(arena, RegionKind::Large).is_none());
        assert_eq!(table.live(), 1);
        assert_eq!(table.region_len(arena), Some(64));
        assert!(table.remove(arena + 1, RegionKind::Large).is_none());
    }

    #[test]
    fn test_copy_within_and_across_regions() {
        let mut table = RegionTable::new();
        let r0 = table.insert(region(32), RegionKind::Arena).unwrap();
        let r1 = table.insert(region(32), RegionKind::Arena).unwrap();

        table
            .slice_mut(BlockPtr::new(r1, 0), 4)
            .unwrap()
            .copy_from_slice(&[1, 2, 3, 4]);

        // r1 -> r0 exercises the high-to-low split.
        table
            .copy(BlockPtr::new(r1, 0), BlockPtr::new(r0, 8), 4)
            .unwrap();
        assert_eq!(table.slice(BlockPtr::new(r0, 8), 4).unwrap(), &[1, 2, 3, 4]);

        table
            .copy(BlockPtr::new(r0, 8), BlockPtr::new(r0, 20), 4)
            .unwrap();
        assert_eq!(table.slice(BlockPtr::new(r0, 20), 4).unwrap(), &[1, 2, 3, 4]);

        assert!(
            table
                .copy(BlockPtr::new(r0, 30), BlockPtr::new(r1, 0), 4)
                .is_none()
        );
    }

    #[test]
    fn test_block_ptr_display() {
        assert_eq!(BlockPtr::new(3, 0x40).to_string(), "r3+0x40");
        assert_eq!(BlockPtr::new(0, 8).advance(16), BlockPtr::new(0, 24));
    }
}
