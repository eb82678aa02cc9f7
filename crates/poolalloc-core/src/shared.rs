//! Thread-safe pool wrapper and the process-wide default pool.
//!
//! The pool engine itself holds no global state. Callers that want the
//! classic "one pool per process" behavior use [`global`], which lazily
//! builds a [`SharedPool`] from the environment on first use.

use std::sync::OnceLock;

use parking_lot::Mutex;

use crate::config::PoolConfig;
use crate::error::AllocError;
use crate::pool::{Allocation, HeapSystem, PoolAllocator, PoolLogRecord, PoolStats, SystemAllocator};

/// A [`PoolAllocator`] behind a `parking_lot::Mutex`.
///
/// Every operation takes the lock for its full duration, so refill and
/// growth are never observed half-done.
pub struct SharedPool<S: SystemAllocator = HeapSystem> {
    inner: Mutex<PoolAllocator<S>>,
}

impl SharedPool<HeapSystem> {
    pub fn new(config: PoolConfig) -> Self {
        Self::from_pool(PoolAllocator::with_config(config))
    }
}

impl<S: SystemAllocator> SharedPool<S> {
    pub fn from_pool(pool: PoolAllocator<S>) -> Self {
        Self {
            inner: Mutex::new(pool),
        }
    }

    /// See [`PoolAllocator::request`].
    pub fn request(&self, n: usize) -> Result<Allocation, AllocError> {
        self.inner.lock().request(n)
    }

    /// See [`PoolAllocator::release`].
    pub fn release(&self, allocation: Allocation) -> Result<(), AllocError> {
        self.inner.lock().release(allocation)
    }

    /// See [`PoolAllocator::resize`].
    pub fn resize(&self, allocation: &mut Allocation, new_n: usize) -> Result<(), AllocError> {
        self.inner.lock().resize(allocation, new_n)
    }

    /// Runs `f` with exclusive access to the pool.
    pub fn with<R>(&self, f: impl FnOnce(&mut PoolAllocator<S>) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn stats(&self) -> PoolStats {
        self.inner.lock().stats()
    }

    pub fn drain_lifecycle_logs(&self) -> Vec<PoolLogRecord> {
        self.inner.lock().drain_lifecycle_logs()
    }

    pub fn into_inner(self) -> PoolAllocator<S> {
        self.inner.into_inner()
    }
}

static GLOBAL_POOL: OnceLock<SharedPool> = OnceLock::new();

/// Process-wide pool, configured from `POOLALLOC_*` environment variables
/// on first access.
pub fn global() -> &'static SharedPool {
    GLOBAL_POOL.get_or_init(|| SharedPool::new(PoolConfig::from_env()))
}
