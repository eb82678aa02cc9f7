#![no_main]
use libfuzzer_sys::fuzz_target;
use poolalloc_core::{AllocError, Allocation, BudgetedSystem, PoolAllocator, PoolConfig};

// Each 4-byte chunk is one operation: [op, size_lo, size_hi, slot].
fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    // A small budget keeps the exhaustion and salvage paths reachable.
    let budget = 4096 + usize::from(data[0]) * 256;
    let config = PoolConfig::default()
        .with_batch(usize::from(data[1] % 32) + 1)
        .with_log_capacity(16);
    let mut pool = PoolAllocator::with_system(BudgetedSystem::new(budget), config);
    let mut slots: Vec<Option<(Allocation, u8)>> = (0..16).map(|_| None).collect();

    for chunk in data[2..].chunks_exact(4) {
        let op = chunk[0] % 3;
        let size = usize::from(u16::from_le_bytes([chunk[1], chunk[2]])) % 1024;
        let idx = usize::from(chunk[3]) % slots.len();
        let fill = chunk[3] | 1;

        match (op, slots[idx].take()) {
            (0, None) => match pool.request(size) {
                Ok(a) => {
                    pool.bytes_mut(&a).unwrap().fill(fill);
                    slots[idx] = Some((a, fill));
                }
                Err(AllocError::PoolExhausted { .. } | AllocError::SystemAllocation { .. }) => {}
                Err(err) => panic!("unexpected error: {err}"),
            },
            (1, Some((a, f))) => {
                assert!(pool.bytes(&a).unwrap().iter().all(|&b| b == f));
                pool.release(a).unwrap();
            }
            (2, Some((mut a, f))) => {
                let keep = a.size().min(size.max(1));
                match pool.resize(&mut a, size) {
                    Ok(()) => {
                        assert!(pool.bytes(&a).unwrap()[..keep].iter().all(|&b| b == f));
                        pool.bytes_mut(&a).unwrap().fill(f);
                    }
                    Err(AllocError::PoolExhausted { .. } | AllocError::SystemAllocation { .. }) => {}
                    Err(err) => panic!("unexpected error: {err}"),
                }
                slots[idx] = Some((a, f));
            }
            (_, other) => slots[idx] = other,
        }
    }

    for (a, f) in slots.into_iter().flatten() {
        assert!(pool.bytes(&a).unwrap().iter().all(|&b| b == f));
        pool.release(a).unwrap();
    }
    assert_eq!(pool.stats().large_live, 0);
});
