use poolalloc_core::pool::{ALIGN, MAX_BLOCK, NUM_SIZE_CLASSES, class_of, round_up};
use poolalloc_core::{
    AllocError, Allocation, BudgetedSystem, FailingSystem, PoolAllocator, PoolConfig,
    SystemAllocator,
};

#[derive(Clone, Copy, Debug)]
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        // xorshift64*
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn gen_range_usize(&mut self, low: usize, high_inclusive: usize) -> usize {
        assert!(low <= high_inclusive);
        let span = high_inclusive - low + 1;
        low + (self.next_u64() as usize % span)
    }
}

fn pattern(slot: usize, seed: u64) -> u8 {
    (slot as u8).wrapping_mul(31) ^ (seed as u8) | 1
}

fn assert_disjoint<S: SystemAllocator>(pool: &PoolAllocator<S>, live: &[(usize, Allocation)]) {
    let mut spans: Vec<(u32, u32, u32)> = live
        .iter()
        .filter(|(_, a)| !a.is_large())
        .map(|(_, a)| {
            let b = a.block();
            (b.region(), b.offset(), b.offset() + a.usable_size() as u32)
        })
        .collect();
    spans.sort_unstable();
    for pair in spans.windows(2) {
        let (r0, _, end0) = pair[0];
        let (r1, start1, _) = pair[1];
        assert!(
            r0 != r1 || end0 <= start1,
            "overlapping live blocks {:?} and {:?}",
            pair[0],
            pair[1]
        );
    }
    for (_, a) in live {
        assert_eq!(pool.bytes(a).unwrap().len(), a.usable_size());
    }
}

#[test]
fn size_class_properties_hold_for_every_small_size() {
    for n in 1..=MAX_BLOCK {
        let r = round_up(n);
        assert_eq!(r % ALIGN, 0, "n={n}");
        assert!(r >= n && r - n < ALIGN, "n={n}");
        assert_eq!(class_of(n), class_of(r), "n={n}");
        assert!(class_of(n) < NUM_SIZE_CLASSES, "n={n}");
        assert_eq!(class_of(n), class_of(n), "n={n}");
    }
}

#[test]
fn deterministic_sequences_keep_live_contents_intact() {
    const SEEDS: [u64; 4] = [1, 2, 3, 4];
    const STEPS: usize = 3_000;
    const SLOTS: usize = 48;

    for seed in SEEDS {
        let mut pool = PoolAllocator::with_config(PoolConfig::default().with_log_capacity(64));
        let mut rng = XorShift64::new(seed);
        let mut slots: Vec<Option<Allocation>> = (0..SLOTS).map(|_| None).collect();

        for step in 0..STEPS {
            let op = rng.gen_range_usize(0, 99);
            let idx = rng.gen_range_usize(0, SLOTS - 1);
            match (op, slots[idx].take()) {
                (0..=49, None) => {
                    // Mostly small, occasionally large.
                    let n = if rng.gen_range_usize(0, 9) == 0 {
                        rng.gen_range_usize(MAX_BLOCK + 1, 1024)
                    } else {
                        rng.gen_range_usize(0, MAX_BLOCK)
                    };
                    let a = pool.request(n).unwrap();
                    pool.bytes_mut(&a).unwrap().fill(pattern(idx, seed));
                    slots[idx] = Some(a);
                }
                (50..=74, Some(a)) => {
                    pool.release(a).unwrap();
                }
                (75..=99, Some(mut a)) => {
                    let old = a.size().min(a.usable_size());
                    let n = rng.gen_range_usize(1, 400);
                    pool.resize(&mut a, n).unwrap();
                    let keep = old.min(a.usable_size()).min(n);
                    let p = pattern(idx, seed);
                    assert!(
                        pool.bytes(&a).unwrap()[..keep].iter().all(|&b| b == p),
                        "seed={seed} step={step}: resize lost contents"
                    );
                    pool.bytes_mut(&a).unwrap().fill(p);
                    slots[idx] = Some(a);
                }
                (_, other) => slots[idx] = other,
            }

            if step % 250 == 0 {
                for (i, a) in slots.iter().enumerate() {
                    if let Some(a) = a {
                        let p = pattern(i, seed);
                        assert!(
                            pool.bytes(a).unwrap().iter().all(|&b| b == p),
                            "seed={seed} step={step}: slot {i} corrupted"
                        );
                    }
                }
                let live: Vec<(usize, Allocation)> = slots
                    .iter_mut()
                    .enumerate()
                    .filter_map(|(i, s)| s.take().map(|a| (i, a)))
                    .collect();
                assert_disjoint(&pool, &live);
                for (i, a) in live {
                    slots[i] = Some(a);
                }
            }
        }

        let stats = pool.stats();
        let outstanding = slots.iter().filter(|s| s.is_some()).count() as u64;
        assert_eq!(stats.requests - stats.releases, outstanding, "seed={seed}");
        for a in slots.into_iter().flatten() {
            pool.release(a).unwrap();
        }
        assert_eq!(pool.stats().large_live, 0, "seed={seed}");
    }
}

fn run_until_exhausted(seed: u64) -> (usize, usize, Vec<usize>) {
    let mut pool = PoolAllocator::with_system(BudgetedSystem::new(8192), PoolConfig::default());
    let mut rng = XorShift64::new(seed);
    let mut held: Vec<Allocation> = Vec::new();

    for step in 0..100_000 {
        let n = rng.gen_range_usize(1, MAX_BLOCK);
        match pool.request(n) {
            Ok(a) => {
                pool.bytes_mut(&a).unwrap().fill(pattern(held.len(), seed));
                held.push(a);
            }
            Err(err) => {
                assert_eq!(err, AllocError::PoolExhausted { size: round_up(n) });
                // Exhaustion is sticky for the same size.
                assert!(pool.request(n).unwrap_err().is_exhaustion());
                for (i, a) in held.iter().enumerate() {
                    let p = pattern(i, seed);
                    assert!(pool.bytes(a).unwrap().iter().all(|&b| b == p));
                }
                let live: Vec<(usize, Allocation)> = held.into_iter().enumerate().collect();
                assert_disjoint(&pool, &live);
                let sizes = live.iter().map(|(_, a)| a.size()).collect();
                return (step, n, sizes);
            }
        }
    }
    panic!("seed={seed}: budget never ran out");
}

#[test]
fn exhaustion_is_deterministic_and_preserves_earlier_blocks() {
    for seed in [7, 11, 13] {
        let first = run_until_exhausted(seed);
        let second = run_until_exhausted(seed);
        assert_eq!(first, second, "seed={seed}");
    }
}

#[test]
fn failing_system_exhausts_on_first_small_request() {
    let mut pool = PoolAllocator::with_system(FailingSystem::new(), PoolConfig::default());
    for n in [1, 8, 64, MAX_BLOCK] {
        assert!(pool.request(n).unwrap_err().is_exhaustion());
    }
    assert!(matches!(
        pool.request(MAX_BLOCK + 1),
        Err(AllocError::SystemAllocation { .. })
    ));
    assert_eq!(pool.system().attempts(), 5);
}

#[test]
fn large_passthrough_never_touches_free_list_heads() {
    let mut pool = PoolAllocator::new();
    let small: Vec<_> = (1..=MAX_BLOCK)
        .step_by(ALIGN)
        .map(|n| pool.request(n).unwrap())
        .collect();
    let heads = pool.free_lists().heads();

    let mut big = Vec::new();
    for n in [MAX_BLOCK + 1, 4096, 65_536] {
        big.push(pool.request(n).unwrap());
        assert_eq!(pool.free_lists().heads(), heads);
    }
    for a in big {
        pool.release(a).unwrap();
        assert_eq!(pool.free_lists().heads(), heads);
    }
    for a in small {
        pool.release(a).unwrap();
    }
}

#[test]
fn first_request_seeds_nineteen_blocks_and_next_is_free() {
    let mut pool = PoolAllocator::new();
    let first = pool.request(8).unwrap();
    assert_eq!(pool.stats().system_alloc_calls, 1);
    assert_eq!(pool.free_lists().len(0), 19);

    let second = pool.request(8).unwrap();
    assert_eq!(pool.stats().system_alloc_calls, 1);
    assert_ne!(first.block(), second.block());
}
