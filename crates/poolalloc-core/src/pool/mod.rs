//! Fixed-size-class pool allocation.
//!
//! Two tiers:
//! - Small requests (<= 128 bytes): sixteen 8-byte-spaced size classes, each
//!   with an intrusive LIFO free list refilled in batches from a growth arena
//! - Large requests (> 128 bytes): passed straight to the system allocator

pub mod allocator;
pub mod arena;
mod chunk;
pub mod free_list;
pub mod log;
pub mod region;
pub mod size_class;
pub mod system;

pub use allocator::{Allocation, PoolAllocator};
pub use arena::Arena;
pub use chunk::growth_request;
pub use free_list::FreeListBank;
pub use log::{PoolLogLevel, PoolLogRecord, PoolStats};
pub use region::{BlockPtr, MAX_REGION_BYTES};
pub use size_class::{
    ALIGN, DEFAULT_BATCH, MAX_BATCH, MAX_BLOCK, NUM_SIZE_CLASSES, class_of, class_size, is_small,
    round_up,
};
pub use system::{BudgetedSystem, FailingSystem, HeapSystem, SystemAllocator};
