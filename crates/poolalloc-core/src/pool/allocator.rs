//! Pool allocator facade.
//!
//! Small requests (up to `MAX_BLOCK` bytes) are served from the per-class
//! free lists, refilled in batches from the arena. Larger requests go
//! straight to the system allocator. The pool is single-threaded; wrap it in
//! [`SharedPool`](crate::SharedPool) to share it.

use std::sync::atomic::{AtomicU64, Ordering};

use super::arena::Arena;
use super::free_list::FreeListBank;
use super::log::{LifecycleLog, LogEvent, PoolLogLevel, PoolLogRecord, PoolStats};
use super::region::{BlockPtr, RegionKind, RegionTable};
use super::size_class::{self, ALIGN, NUM_SIZE_CLASSES};
use super::system::{HeapSystem, SystemAllocator};
use crate::config::PoolConfig;
use crate::error::AllocError;

/// Source of per-instance pool ids stamped into every handle.
static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// An outstanding allocation.
///
/// The handle remembers the size it was requested with, so releasing it
/// always returns the block to the right class. It is deliberately not
/// `Clone`: releasing consumes it.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Allocation {
    block: BlockPtr,
    size: usize,
    owner: u64,
}

impl Allocation {
    /// Location of the block.
    pub fn block(&self) -> BlockPtr {
        self.block
    }

    /// Requested size (a zero-byte request is recorded as 1).
    pub fn size(&self) -> usize {
        self.size
    }

    /// Bytes the caller may use: the class size for small blocks.
    pub fn usable_size(&self) -> usize {
        if size_class::is_small(self.size) {
            size_class::round_up(self.size)
        } else {
            self.size
        }
    }

    /// Size class of a small allocation, `None` for large ones.
    pub fn class(&self) -> Option<usize> {
        size_class::is_small(self.size).then(|| size_class::class_of(self.size))
    }

    /// True if the allocation bypassed the size classes.
    pub fn is_large(&self) -> bool {
        !size_class::is_small(self.size)
    }

    /// Id of the pool that minted this handle.
    pub fn owner(&self) -> u64 {
        self.owner
    }
}

/// Two-tier fixed-size-class allocator.
pub struct PoolAllocator<S: SystemAllocator = HeapSystem> {
    pub(crate) id: u64,
    pub(crate) config: PoolConfig,
    pub(crate) system: S,
    pub(crate) memory: RegionTable,
    pub(crate) arena: Arena,
    pub(crate) free_lists: FreeListBank,
    pub(crate) stats: PoolStats,
    pub(crate) log: LifecycleLog,
}

impl PoolAllocator<HeapSystem> {
    /// Creates a pool over the process heap with the default configuration.
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    /// Creates a pool over the process heap.
    pub fn with_config(config: PoolConfig) -> Self {
        Self::with_system(HeapSystem, config)
    }
}

impl Default for PoolAllocator<HeapSystem> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: SystemAllocator> PoolAllocator<S> {
    /// Creates a pool that grows from `system`.
    pub fn with_system(system: S, config: PoolConfig) -> Self {
        Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            config,
            system,
            memory: RegionTable::new(),
            arena: Arena::new(),
            free_lists: FreeListBank::new(),
            stats: PoolStats::default(),
            log: LifecycleLog::new(config.log_capacity()),
        }
    }

    pub(crate) fn record(&mut self, event: LogEvent) {
        if self.log.enabled() {
            let stats = self.stats();
            self.log.push(event, stats);
        }
    }

    fn owns(&self, allocation: &Allocation) -> bool {
        !self.config.validation().checks_owner() || allocation.owner == self.id
    }

    fn check_owner(
        &mut self,
        allocation: &Allocation,
        symbol: &'static str,
    ) -> Result<(), AllocError> {
        if self.owns(allocation) {
            return Ok(());
        }
        self.record(
            LogEvent::new(PoolLogLevel::Warn, symbol, "foreign_handle", "denied")
                .block(allocation.block)
                .size(allocation.size)
                .details(format!("owner={} pool={}", allocation.owner, self.id)),
        );
        Err(AllocError::ForeignHandle {
            block: allocation.block,
        })
    }

    /// Allocates `n` bytes.
    ///
    /// A zero-byte request is served as a one-byte request. Small requests
    /// receive `round_up(n)` usable bytes; large ones exactly `n`.
    pub fn request(&mut self, n: usize) -> Result<Allocation, AllocError> {
        let size = n.max(1);
        if !size_class::is_small(size) {
            return self.request_large(size);
        }

        let class = size_class::class_of(size);
        let (block, path) = match self.free_lists.pop(class, &self.memory) {
            Some(block) => {
                self.stats.free_list_hits += 1;
                (block, "path=free_list_hit")
            }
            None => {
                let block = self.refill(size_class::round_up(size))?;
                self.stats.refills += 1;
                (block, "path=refill")
            }
        };
        self.stats.requests += 1;
        self.record(
            LogEvent::new(PoolLogLevel::Trace, "request", "alloc", "success")
                .block(block)
                .size(size)
                .class(class)
                .details(path),
        );
        Ok(Allocation {
            block,
            size,
            owner: self.id,
        })
    }

    fn request_large(&mut self, size: usize) -> Result<Allocation, AllocError> {
        self.stats.system_alloc_calls += 1;
        let Some(region) = self.system.sys_alloc(size) else {
            self.stats.system_alloc_failures += 1;
            self.record(
                LogEvent::new(PoolLogLevel::Warn, "request", "alloc", "oom")
                    .size(size)
                    .details("path=large_system"),
            );
            return Err(AllocError::SystemAllocation { bytes: size });
        };
        let index = match self.memory.insert(region, RegionKind::Large) {
            Ok(index) => index,
            Err(region) => {
                self.system.sys_free(region);
                self.stats.system_free_calls += 1;
                self.record(
                    LogEvent::new(PoolLogLevel::Warn, "request", "region_table_full", "oom")
                        .size(size),
                );
                return Err(AllocError::SystemAllocation { bytes: size });
            }
        };

        let block = BlockPtr::new(index, 0);
        self.stats.large_live += 1;
        self.stats.requests += 1;
        self.record(
            LogEvent::new(PoolLogLevel::Trace, "request", "alloc", "success")
                .block(block)
                .size(size)
                .details("path=large_system"),
        );
        Ok(Allocation {
            block,
            size,
            owner: self.id,
        })
    }

    /// Returns an allocation to the pool.
    ///
    /// Small blocks go to the head of their class list; large ones back to
    /// the system allocator. A handle that does not resolve to a block this
    /// pool can take back is refused with [`AllocError::UnknownBlock`] and
    /// nothing is freed.
    pub fn release(&mut self, allocation: Allocation) -> Result<(), AllocError> {
        self.check_owner(&allocation, "release")?;
        let Allocation { block, size, .. } = allocation;
        if !self.resolves(block, size) {
            return Err(self.unknown_block("release", block, size));
        }

        if !size_class::is_small(size) {
            let Some(region) = self.memory.remove(block.region(), RegionKind::Large) else {
                return Err(self.unknown_block("release", block, size));
            };
            self.system.sys_free(region);
            self.stats.system_free_calls += 1;
            self.stats.large_live = self.stats.large_live.saturating_sub(1);
            self.stats.releases += 1;
            self.record(
                LogEvent::new(PoolLogLevel::Trace, "release", "free", "success")
                    .block(block)
                    .size(size)
                    .details("path=large_system"),
            );
            return Ok(());
        }

        let class = size_class::class_of(size);
        if !self.free_lists.push(class, block, &mut self.memory) {
            return Err(self.unknown_block("release", block, size));
        }
        self.stats.releases += 1;
        self.record(
            LogEvent::new(PoolLogLevel::Trace, "release", "free", "success")
                .block(block)
                .size(size)
                .class(class)
                .details("path=free_list_push"),
        );
        Ok(())
    }

    /// True if `block` is a `size`-byte block this pool could take back.
    ///
    /// Large blocks must own a whole large region of exactly `size` bytes;
    /// small ones must sit aligned inside an arena region.
    fn resolves(&self, block: BlockPtr, size: usize) -> bool {
        let kind = self.memory.kind(block.region());
        if !size_class::is_small(size) {
            return kind == Some(RegionKind::Large)
                && block.offset() == 0
                && self.memory.region_len(block.region()) == Some(size);
        }
        kind == Some(RegionKind::Arena)
            && block.offset() as usize % ALIGN == 0
            && self
                .memory
                .slice(block, size_class::round_up(size))
                .is_some()
    }

    fn unknown_block(&mut self, symbol: &'static str, block: BlockPtr, size: usize) -> AllocError {
        let mut event = LogEvent::new(PoolLogLevel::Warn, symbol, "unknown_block", "denied")
            .block(block)
            .size(size);
        if size_class::is_small(size) {
            event = event.class(size_class::class_of(size));
        }
        self.record(event);
        AllocError::UnknownBlock { block, size }
    }

    /// Resizes `allocation` to `new_n` bytes.
    ///
    /// Stays in place when both sizes map to the same small class. Otherwise
    /// allocates, copies `min(old, new)` bytes, and releases the old block.
    /// On failure `allocation` is left untouched.
    pub fn resize(&mut self, allocation: &mut Allocation, new_n: usize) -> Result<(), AllocError> {
        self.check_owner(allocation, "resize")?;
        let new_size = new_n.max(1);
        let old_size = allocation.size;
        if !self.resolves(allocation.block, old_size) {
            return Err(self.unknown_block("resize", allocation.block, old_size));
        }

        if let Some(old_class) = allocation.class()
            && size_class::is_small(new_size)
            && size_class::class_of(new_size) == old_class
        {
            allocation.size = new_size;
            self.stats.resizes += 1;
            self.record(
                LogEvent::new(PoolLogLevel::Trace, "resize", "resize_in_place", "success")
                    .block(allocation.block)
                    .size(new_size)
                    .class(old_class)
                    .details(format!("old_size={old_size}")),
            );
            return Ok(());
        }

        let fresh = self.request(new_size)?;
        let keep = old_size.min(new_size);
        if self
            .memory
            .copy(allocation.block, fresh.block, keep)
            .is_none()
        {
            self.record(
                LogEvent::new(PoolLogLevel::Error, "resize", "copy_failed", "denied")
                    .block(allocation.block)
                    .size(keep),
            );
            self.release(fresh)?;
            return Err(AllocError::UnknownBlock {
                block: allocation.block,
                size: old_size,
            });
        }

        let old = std::mem::replace(allocation, fresh);
        let old_block = old.block;
        self.release(old)?;
        self.stats.resizes += 1;
        self.record(
            LogEvent::new(PoolLogLevel::Trace, "resize", "resize_move", "success")
                .block(allocation.block)
                .size(new_size)
                .details(format!("old_block={old_block} old_size={old_size}")),
        );
        Ok(())
    }

    /// Usable bytes of `allocation`.
    pub fn bytes(&self, allocation: &Allocation) -> Result<&[u8], AllocError> {
        let (foreign, unknown) = Self::access_errors(allocation);
        if !self.owns(allocation) {
            return Err(foreign);
        }
        self.memory
            .slice(allocation.block, allocation.usable_size())
            .ok_or(unknown)
    }

    /// Mutable usable bytes of `allocation`.
    pub fn bytes_mut(&mut self, allocation: &Allocation) -> Result<&mut [u8], AllocError> {
        let (foreign, unknown) = Self::access_errors(allocation);
        if !self.owns(allocation) {
            return Err(foreign);
        }
        self.memory
            .slice_mut(allocation.block, allocation.usable_size())
            .ok_or(unknown)
    }

    fn access_errors(allocation: &Allocation) -> (AllocError, AllocError) {
        let block = allocation.block;
        (
            AllocError::ForeignHandle { block },
            AllocError::UnknownBlock {
                block,
                size: allocation.size,
            },
        )
    }

    /// Counter snapshot.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            heap_size: self.arena.heap_size(),
            arena_remaining: self.arena.remaining(),
            free_blocks: self.free_lists.total_len(),
            ..self.stats
        }
    }

    /// Per-class free lists.
    pub fn free_lists(&self) -> &FreeListBank {
        &self.free_lists
    }

    /// Blocks on the free list of `class`, head first.
    pub fn free_list_blocks(&self, class: usize) -> Vec<BlockPtr> {
        if class >= NUM_SIZE_CLASSES {
            return Vec::new();
        }
        self.free_lists.walk(class, &self.memory)
    }

    /// Carving cursor.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn system(&self) -> &S {
        &self.system
    }

    /// Instance id stamped into every handle this pool mints.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Regions currently held (arena regions plus live large allocations).
    pub fn live_regions(&self) -> usize {
        self.memory.live()
    }

    /// Retained lifecycle records, oldest first.
    pub fn lifecycle_logs(&self) -> impl Iterator<Item = &PoolLogRecord> {
        self.log.records()
    }

    /// Drains retained lifecycle records.
    pub fn drain_lifecycle_logs(&mut self) -> Vec<PoolLogRecord> {
        self.log.drain()
    }

    /// Records evicted from the ring since construction.
    pub fn dropped_log_records(&self) -> u64 {
        self.log.dropped()
    }
}
