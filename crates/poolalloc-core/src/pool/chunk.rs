//! Refill and chunk growth.
//!
//! A free-list miss asks the arena for a batch of same-size blocks. The
//! arena hands out what it has; when it cannot cover even one block it is
//! grown from the system allocator, and if that is refused a single free
//! block of a larger class is reclaimed as arena instead.

use super::allocator::PoolAllocator;
use super::log::{LogEvent, PoolLogLevel};
use super::region::{BlockPtr, MAX_REGION_BYTES, RegionKind};
use super::size_class::{self, ALIGN, NUM_SIZE_CLASSES};
use super::system::SystemAllocator;
use crate::error::AllocError;

/// Bytes requested from the system when the arena runs dry.
///
/// Twice the batch plus a sixteenth of everything obtained so far, so growth
/// gets coarser as the pool ages.
pub fn growth_request(size: usize, nobjs: usize, heap_size: usize) -> usize {
    size.saturating_mul(nobjs)
        .saturating_mul(2)
        .saturating_add(size_class::round_up(heap_size >> 4))
        .min(MAX_REGION_BYTES)
}

impl<S: SystemAllocator> PoolAllocator<S> {
    /// Obtains a batch of `size`-byte blocks, returns the first and installs
    /// the rest as the free list of that class.
    ///
    /// Only called after a pop miss, so the list being replaced is empty.
    pub(crate) fn refill(&mut self, size: usize) -> Result<BlockPtr, AllocError> {
        let class = size_class::class_of(size);
        let (chunk, nobjs) = self.chunk_alloc(size, self.config.batch())?;

        if nobjs > 1 {
            debug_assert!(self.free_lists.head(class).is_none());
            for i in 1..nobjs {
                let next = (i + 1 < nobjs).then(|| chunk.advance((i + 1) * size));
                self.memory.write_link(chunk.advance(i * size), next);
            }
            self.free_lists
                .install(class, Some(chunk.advance(size)), nobjs - 1);
        }

        self.record(
            LogEvent::new(PoolLogLevel::Debug, "refill", "refill", "success")
                .block(chunk)
                .size(size)
                .class(class)
                .details(format!(
                    "requested={} obtained={}",
                    self.config.batch(),
                    nobjs
                )),
        );
        Ok(chunk)
    }

    /// Carves up to `nobjs` contiguous blocks of `size` bytes from the arena.
    ///
    /// Returns the first block and how many were carved (at least one).
    /// Grows at most once and salvages at most once per call.
    pub(crate) fn chunk_alloc(
        &mut self,
        size: usize,
        nobjs: usize,
    ) -> Result<(BlockPtr, usize), AllocError> {
        let mut grown = false;
        let mut salvaged = false;

        loop {
            let total = size * nobjs;
            let left = self.arena.remaining();

            if left >= total
                && let Some(chunk) = self.arena.carve(total)
            {
                self.record(
                    LogEvent::new(PoolLogLevel::Debug, "chunk_alloc", "arena_carve", "full")
                        .block(chunk)
                        .size(size)
                        .details(format!("nobjs={nobjs} left={left}")),
                );
                return Ok((chunk, nobjs));
            }
            if left >= size {
                let fit = left / size;
                if let Some(chunk) = self.arena.carve(fit * size) {
                    self.record(
                        LogEvent::new(PoolLogLevel::Debug, "chunk_alloc", "arena_carve", "partial")
                            .block(chunk)
                            .size(size)
                            .details(format!("nobjs={fit} wanted={nobjs} left={left}")),
                    );
                    return Ok((chunk, fit));
                }
            }

            if salvaged {
                break;
            }

            self.splice_leftover();
            if !grown {
                let bytes = growth_request(size, nobjs, self.arena.heap_size());
                if self.grow_arena(bytes) {
                    grown = true;
                    continue;
                }
            }
            // Growth refused, or the system returned less than one block.
            if self.salvage(size) {
                salvaged = true;
                continue;
            }
            break;
        }

        self.record(
            LogEvent::new(PoolLogLevel::Error, "chunk_alloc", "pool_exhausted", "fatal")
                .size(size)
                .class(size_class::class_of(size))
                .details(format!("nobjs={nobjs}")),
        );
        Err(AllocError::PoolExhausted { size })
    }

    /// Moves the arena tail onto the free list matching its exact length.
    fn splice_leftover(&mut self) {
        let Some((block, bytes)) = self.arena.take_leftover() else {
            return;
        };
        debug_assert!(bytes % ALIGN == 0 && size_class::is_small(bytes));
        let class = size_class::class_of(bytes);
        if self.free_lists.push(class, block, &mut self.memory) {
            self.stats.leftover_splices += 1;
            self.record(
                LogEvent::new(PoolLogLevel::Debug, "chunk_alloc", "leftover_splice", "success")
                    .block(block)
                    .size(bytes)
                    .class(class),
            );
        }
    }

    /// Asks the system for a fresh arena region of `bytes` bytes.
    fn grow_arena(&mut self, bytes: usize) -> bool {
        self.stats.system_alloc_calls += 1;
        let Some(region) = self.system.sys_alloc(bytes) else {
            self.stats.system_alloc_failures += 1;
            self.record(
                LogEvent::new(PoolLogLevel::Warn, "chunk_alloc", "system_alloc_failed", "salvage")
                    .size(bytes)
                    .details(format!("heap_size={}", self.arena.heap_size())),
            );
            return false;
        };

        let len = region.len().min(MAX_REGION_BYTES) & !(ALIGN - 1);
        match self.memory.insert(region, RegionKind::Arena) {
            Ok(index) => {
                self.arena.grow_into(index, len);
                self.stats.arena_growths += 1;
                self.record(
                    LogEvent::new(PoolLogLevel::Info, "chunk_alloc", "arena_grow", "success")
                        .block(BlockPtr::new(index, 0))
                        .size(len)
                        .details(format!("heap_size={}", self.arena.heap_size())),
                );
                true
            }
            Err(region) => {
                self.system.sys_free(region);
                self.stats.system_free_calls += 1;
                self.stats.system_alloc_failures += 1;
                self.record(
                    LogEvent::new(PoolLogLevel::Warn, "chunk_alloc", "region_table_full", "salvage")
                        .size(bytes),
                );
                false
            }
        }
    }

    /// Reclaims one free block of class `class_of(size)` or larger as arena.
    fn salvage(&mut self, size: usize) -> bool {
        for class in size_class::class_of(size)..NUM_SIZE_CLASSES {
            if let Some(block) = self.free_lists.pop(class, &self.memory) {
                let len = size_class::class_size(class);
                self.arena.adopt(block, len);
                self.stats.salvages += 1;
                self.record(
                    LogEvent::new(PoolLogLevel::Info, "chunk_alloc", "salvage", "success")
                        .block(block)
                        .size(len)
                        .class(class)
                        .details(format!("wanted={size}")),
                );
                return true;
            }
        }
        false
    }
}
