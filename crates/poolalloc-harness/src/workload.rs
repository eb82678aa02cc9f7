//! Deterministic request/release/resize workloads.
//!
//! A workload is fully determined by its [`WorkloadSpec`]: the same spec
//! always produces the same operation sequence, the same lifecycle records
//! (modulo timestamps) and the same report.

use poolalloc_core::pool::MAX_BLOCK;
use poolalloc_core::{
    AllocError, Allocation, BudgetedSystem, HeapSystem, PoolAllocator, PoolConfig,
    PoolLogRecord, SystemAllocator,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::structured_log::StatsSnapshot;

/// Errors from driving a workload or writing its artifacts.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("pool: {0}")]
    Pool(#[from] AllocError),
    #[error("log validation failed with {0} error(s)")]
    InvalidLog(usize),
}

/// xorshift64* generator.
#[derive(Debug, Clone, Copy)]
pub struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    pub fn new(seed: u64) -> Self {
        // Zero is a fixed point of xorshift.
        Self {
            state: if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed },
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    pub fn gen_range_usize(&mut self, low: usize, high_inclusive: usize) -> usize {
        debug_assert!(low <= high_inclusive);
        let span = high_inclusive - low + 1;
        low + (self.next_u64() as usize % span)
    }
}

/// Workload parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadSpec {
    pub seed: u64,
    pub steps: usize,
    /// Maximum simultaneously live allocations.
    pub slots: usize,
    /// Percentage of new requests that exceed `MAX_BLOCK`.
    pub large_pct: u8,
    /// Upper bound for large request sizes.
    pub max_large: usize,
    /// System allocator budget in bytes; `None` uses the process heap.
    pub budget: Option<usize>,
}

impl Default for WorkloadSpec {
    fn default() -> Self {
        Self {
            seed: 0xDEAD_BEEF,
            steps: 10_000,
            slots: 64,
            large_pct: 5,
            max_large: 4096,
            budget: None,
        }
    }
}

/// Outcome counts and final pool counters of a workload run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadReport {
    pub spec: WorkloadSpec,
    pub mode: String,
    pub batch: usize,
    pub requests: u64,
    pub releases: u64,
    pub resizes: u64,
    /// Requests refused with `PoolExhausted`.
    pub exhausted: u64,
    /// Large requests refused by the system allocator.
    pub system_refusals: u64,
    /// Allocations still live at the end, before cleanup.
    pub live_at_end: usize,
    /// Live allocations whose fill pattern did not survive.
    pub corrupted: usize,
    pub stats: StatsSnapshot,
    pub log_records: usize,
    pub log_records_dropped: u64,
}

/// A finished run: the report plus every lifecycle record, oldest first.
#[derive(Debug, Clone)]
pub struct WorkloadRun {
    pub report: WorkloadReport,
    pub records: Vec<PoolLogRecord>,
}

/// Runs `spec` against a fresh pool built from `config`.
pub fn run_workload(spec: &WorkloadSpec, config: PoolConfig) -> Result<WorkloadRun, HarnessError> {
    match spec.budget {
        Some(budget) => drive(PoolAllocator::with_system(BudgetedSystem::new(budget), config), spec),
        None => drive(PoolAllocator::with_system(HeapSystem, config), spec),
    }
}

fn pattern(slot: usize, seed: u64) -> u8 {
    ((slot as u64).wrapping_mul(0x9E37_79B9) ^ seed) as u8 | 1
}

fn intact<S: SystemAllocator>(pool: &PoolAllocator<S>, a: &Allocation, p: u8) -> Result<bool, AllocError> {
    Ok(pool.bytes(a)?.iter().all(|&b| b == p))
}

fn drive<S: SystemAllocator>(
    mut pool: PoolAllocator<S>,
    spec: &WorkloadSpec,
) -> Result<WorkloadRun, HarnessError> {
    let mut rng = XorShift64::new(spec.seed);
    let slots = spec.slots.max(1);
    let mut live: Vec<Option<Allocation>> = (0..slots).map(|_| None).collect();
    let mut records = Vec::new();
    let mut report = WorkloadReport {
        spec: *spec,
        mode: pool.config().validation().as_str().to_string(),
        batch: pool.config().batch(),
        requests: 0,
        releases: 0,
        resizes: 0,
        exhausted: 0,
        system_refusals: 0,
        live_at_end: 0,
        corrupted: 0,
        stats: StatsSnapshot::default(),
        log_records: 0,
        log_records_dropped: 0,
    };

    let size_for = |rng: &mut XorShift64| {
        if rng.gen_range_usize(0, 99) < usize::from(spec.large_pct) {
            rng.gen_range_usize(MAX_BLOCK + 1, spec.max_large.max(MAX_BLOCK + 1))
        } else {
            rng.gen_range_usize(0, MAX_BLOCK)
        }
    };

    for _ in 0..spec.steps {
        let op = rng.gen_range_usize(0, 99);
        let idx = rng.gen_range_usize(0, slots - 1);
        let p = pattern(idx, spec.seed);

        match (op, live[idx].take()) {
            (0..=54, None) => {
                let n = size_for(&mut rng);
                match pool.request(n) {
                    Ok(a) => {
                        pool.bytes_mut(&a)?.fill(p);
                        live[idx] = Some(a);
                        report.requests += 1;
                    }
                    Err(AllocError::PoolExhausted { .. }) => report.exhausted += 1,
                    Err(AllocError::SystemAllocation { .. }) => report.system_refusals += 1,
                    Err(err) => return Err(err.into()),
                }
            }
            (55..=79, Some(a)) => {
                if !intact(&pool, &a, p)? {
                    report.corrupted += 1;
                }
                pool.release(a)?;
                report.releases += 1;
            }
            (80..=99, Some(mut a)) => {
                let n = size_for(&mut rng);
                match pool.resize(&mut a, n) {
                    Ok(()) => {
                        report.resizes += 1;
                        pool.bytes_mut(&a)?.fill(p);
                    }
                    Err(AllocError::PoolExhausted { .. }) => report.exhausted += 1,
                    Err(AllocError::SystemAllocation { .. }) => report.system_refusals += 1,
                    Err(err) => return Err(err.into()),
                }
                live[idx] = Some(a);
            }
            (_, other) => live[idx] = other,
        }
        records.extend(pool.drain_lifecycle_logs());
    }

    for (idx, slot) in live.iter().enumerate() {
        if let Some(a) = slot {
            report.live_at_end += 1;
            if !intact(&pool, a, pattern(idx, spec.seed))? {
                report.corrupted += 1;
            }
        }
    }
    report.stats = pool.stats().into();

    for a in live.into_iter().flatten() {
        pool.release(a)?;
    }
    records.extend(pool.drain_lifecycle_logs());
    report.log_records = records.len();
    report.log_records_dropped = pool.dropped_log_records();

    Ok(WorkloadRun { report, records })
}
