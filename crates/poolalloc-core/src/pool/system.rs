//! System allocator boundary.
//!
//! The pool talks to the environment through exactly two operations:
//! obtain a fresh byte region and give one back. Arena growth and large
//! requests are the only callers.

/// Bulk allocator the pool grows from.
pub trait SystemAllocator {
    /// Returns a zero-initialized region of exactly `bytes` bytes, or `None`
    /// if the request is refused.
    fn sys_alloc(&mut self, bytes: usize) -> Option<Box<[u8]>>;

    /// Returns a region previously produced by [`SystemAllocator::sys_alloc`].
    fn sys_free(&mut self, region: Box<[u8]>);
}

/// Production backend over the process heap.
///
/// Uses fallible reservation so a refused request surfaces as `None`
/// instead of aborting the process.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapSystem;

impl SystemAllocator for HeapSystem {
    fn sys_alloc(&mut self, bytes: usize) -> Option<Box<[u8]>> {
        let mut buf: Vec<u8> = Vec::new();
        buf.try_reserve_exact(bytes).ok()?;
        buf.resize(bytes, 0);
        Some(buf.into_boxed_slice())
    }

    fn sys_free(&mut self, region: Box<[u8]>) {
        drop(region);
    }
}

/// Backend that refuses every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingSystem {
    attempts: u64,
}

impl FailingSystem {
    /// Creates a new always-failing backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of refused requests so far.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }
}

impl SystemAllocator for FailingSystem {
    fn sys_alloc(&mut self, _bytes: usize) -> Option<Box<[u8]>> {
        self.attempts += 1;
        None
    }

    fn sys_free(&mut self, region: Box<[u8]>) {
        drop(region);
    }
}

/// Heap backend that caps the bytes outstanding at any one time.
///
/// Each grant is charged to the budget and each freed region is credited
/// back, so the cap applies to live bytes rather than to the total ever
/// handed out.
#[derive(Debug, Clone)]
pub struct BudgetedSystem {
    remaining: usize,
    granted: u64,
    refused: u64,
}

impl BudgetedSystem {
    /// Creates a backend whose outstanding regions never exceed `budget` bytes.
    pub fn new(budget: usize) -> Self {
        Self {
            remaining: budget,
            granted: 0,
            refused: 0,
        }
    }

    /// Bytes still available.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Number of granted requests.
    pub fn granted(&self) -> u64 {
        self.granted
    }

    /// Number of refused requests.
    pub fn refused(&self) -> u64 {
        self.refused
    }
}

impl SystemAllocator for BudgetedSystem {
    fn sys_alloc(&mut self, bytes: usize) -> Option<Box<[u8]>> {
        if bytes > self.remaining {
            self.refused += 1;
            return None;
        }
        let Some(region) = HeapSystem.sys_alloc(bytes) else {
            self.refused += 1;
            return None;
        };
        self.remaining -= bytes;
        self.granted += 1;
        Some(region)
    }

    fn sys_free(&mut self, region: Box<[u8]>) {
        self.remaining = self.remaining.saturating_add(region.len());
        drop(region);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_system_zeroed_exact_length() {
        let mut sys = HeapSystem;
        let region = sys.sys_alloc(320).unwrap();
        assert_eq!(region.len(), 320);
        assert!(region.iter().all(|&b| b == 0));
        sys.sys_free(region);
    }

    #[test]
    fn test_heap_system_refuses_impossible_request() {
        let mut sys = HeapSystem;
        assert!(sys.sys_alloc(usize::MAX).is_none());
    }

    #[test]
    fn test_failing_system_counts_attempts() {
        let mut sys = FailingSystem::new();
        assert!(sys.sys_alloc(8).is_none());
        assert!(sys.sys_alloc(4096).is_none());
        assert_eq!(sys.attempts(), 2);
    }

    #[test]
    fn test_budgeted_system_spends_and_credits() {
        let mut sys = BudgetedSystem::new(1000);
        let a = sys.sys_alloc(600).unwrap();
        assert_eq!(sys.remaining(), 400);
        assert!(sys.sys_alloc(500).is_none());
        assert_eq!(sys.refused(), 1);

        sys.sys_free(a);
        assert_eq!(sys.remaining(), 1000);
        assert!(sys.sys_alloc(500).is_some());
        assert_eq!(sys.granted(), 2);
    }
}
