//! Allocation errors.

use thiserror::Error;

use crate::pool::BlockPtr;

/// Failure surfaced by the pool allocator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocError {
    /// The system allocator refused a large request.
    #[error("system allocator refused {bytes} bytes")]
    SystemAllocation { bytes: usize },
    /// Arena growth was refused and no larger free block could be salvaged.
    #[error("pool exhausted while carving {size}-byte blocks")]
    PoolExhausted { size: usize },
    /// The handle was minted by a different pool instance.
    #[error("handle {block} does not belong to this pool")]
    ForeignHandle { block: BlockPtr },
    /// The handle does not name a block this pool can give back.
    #[error("handle {block} does not address a releasable {size}-byte block")]
    UnknownBlock { block: BlockPtr, size: usize },
    /// `count * elem_size` does not fit in `usize`.
    #[error("{count} elements of {elem_size} bytes overflow usize")]
    SizeOverflow { count: usize, elem_size: usize },
}

impl AllocError {
    /// True for the unrecoverable exhaustion condition.
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, Self::PoolExhausted { .. })
    }
}
