//! # poolalloc-core
//!
//! Safe fixed-size-class pool allocator.
//!
//! Requests up to 128 bytes are rounded to a multiple of 8 and served from
//! one of sixteen intrusive LIFO free lists. An empty list is refilled with
//! a batch of blocks carved from a growth arena; the arena is grown from a
//! pluggable [`SystemAllocator`] and, when growth is refused, salvages a free
//! block of a larger class. Larger requests pass straight through to the
//! system allocator.
//!
//! Blocks are addressed by [`BlockPtr`] handles into pool-owned regions, so
//! no `unsafe` code is needed.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod pool;
pub mod shared;
pub mod typed;

pub use config::{PoolConfig, ValidationMode};
pub use error::AllocError;
pub use pool::{
    Allocation, BlockPtr, BudgetedSystem, FailingSystem, HeapSystem, PoolAllocator, PoolLogLevel,
    PoolLogRecord, PoolStats, SystemAllocator,
};
pub use shared::{SharedPool, global};
pub use typed::TypedAlloc;
