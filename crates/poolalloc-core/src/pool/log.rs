//! Structured lifecycle records emitted by the pool.
//!
//! Every request, release, refill, and growth decision leaves a record with
//! a monotonic decision id and a snapshot of the pool counters. Records are
//! retained in a bounded ring; the harness turns them into JSONL.

use std::collections::VecDeque;

use super::region::BlockPtr;

/// Lifecycle log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PoolLogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl PoolLogLevel {
    /// Lowercase level name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Counters maintained by the pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Successful `request` calls.
    pub requests: u64,
    /// Successful `release` calls.
    pub releases: u64,
    /// Successful `resize` calls.
    pub resizes: u64,
    /// Small requests served straight from a free list.
    pub free_list_hits: u64,
    /// Small requests served by a successful refill.
    pub refills: u64,
    /// Arena regions obtained from the system allocator.
    pub arena_growths: u64,
    /// Arena tails spliced into a smaller free list before growth.
    pub leftover_splices: u64,
    /// Free blocks reclaimed as arena after a refused growth.
    pub salvages: u64,
    /// Calls into `sys_alloc` (growth and large requests).
    pub system_alloc_calls: u64,
    /// `sys_alloc` calls that were refused.
    pub system_alloc_failures: u64,
    /// Calls into `sys_free`.
    pub system_free_calls: u64,
    /// Large allocations currently outstanding.
    pub large_live: usize,
    /// Cumulative arena growth bytes (sizing heuristic, not accounting).
    pub heap_size: usize,
    /// Bytes left in the arena.
    pub arena_remaining: usize,
    /// Blocks on all free lists.
    pub free_blocks: usize,
}

/// Structured pool lifecycle record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolLogRecord {
    /// Monotonic decision/event id.
    pub decision_id: u64,
    /// Correlation id for this lifecycle record.
    pub trace_id: String,
    /// Severity level.
    pub level: PoolLogLevel,
    /// API symbol (`request`, `release`, `resize`, `refill`, `chunk_alloc`).
    pub symbol: &'static str,
    /// Event kind (`alloc`, `free`, `arena_grow`, ...).
    pub event: &'static str,
    /// Block involved in the event.
    pub block: Option<BlockPtr>,
    /// Size value involved in the event.
    pub size: Option<usize>,
    /// Size class involved in the event.
    pub class: Option<usize>,
    /// Machine-readable outcome label.
    pub outcome: &'static str,
    /// Free-form details for debugging.
    pub details: String,
    /// Counters at the time of the event.
    pub stats: PoolStats,
}

/// Bounded ring of lifecycle records.
#[derive(Debug, Clone)]
pub(crate) struct LifecycleLog {
    capacity: usize,
    records: VecDeque<PoolLogRecord>,
    next_decision_id: u64,
    dropped: u64,
}

/// Fields describing one lifecycle event.
pub(crate) struct LogEvent {
    pub level: PoolLogLevel,
    pub symbol: &'static str,
    pub event: &'static str,
    pub block: Option<BlockPtr>,
    pub size: Option<usize>,
    pub class: Option<usize>,
    pub outcome: &'static str,
    pub details: String,
}

impl LogEvent {
    pub(crate) fn new(
        level: PoolLogLevel,
        symbol: &'static str,
        event: &'static str,
        outcome: &'static str,
    ) -> Self {
        Self {
            level,
            symbol,
            event,
            block: None,
            size: None,
            class: None,
            outcome,
            details: String::new(),
        }
    }

    pub(crate) fn block(mut self, block: BlockPtr) -> Self {
        self.block = Some(block);
        self
    }

    pub(crate) fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    pub(crate) fn class(mut self, class: usize) -> Self {
        self.class = Some(class);
        self
    }

    pub(crate) fn details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }
}

impl LifecycleLog {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity.min(1024)),
            next_decision_id: 1,
            dropped: 0,
        }
    }

    pub(crate) fn enabled(&self) -> bool {
        self.capacity > 0
    }

    pub(crate) fn push(&mut self, event: LogEvent, stats: PoolStats) {
        if !self.enabled() {
            return;
        }
        let decision_id = self.next_decision_id;
        self.next_decision_id = self.next_decision_id.wrapping_add(1);
        if self.records.len() == self.capacity {
            self.records.pop_front();
            self.dropped += 1;
        }
        self.records.push_back(PoolLogRecord {
            decision_id,
            trace_id: format!("pool::{}::{:016x}", event.symbol, decision_id),
            level: event.level,
            symbol: event.symbol,
            event: event.event,
            block: event.block,
            size: event.size,
            class: event.class,
            outcome: event.outcome,
            details: event.details,
            stats,
        });
    }

    pub(crate) fn records(&self) -> impl Iterator<Item = &PoolLogRecord> {
        self.records.iter()
    }

    pub(crate) fn drain(&mut self) -> Vec<PoolLogRecord> {
        self.records.drain(..).collect()
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.dropped
    }
}
