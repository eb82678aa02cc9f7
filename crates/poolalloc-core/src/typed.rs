//! Element-count front end over the byte-oriented pool.
//!
//! Converts counts of `T` into byte requests. It never constructs or drops
//! values; callers view the returned bytes however they like.

use std::marker::PhantomData;

use crate::error::AllocError;
use crate::pool::{Allocation, PoolAllocator, SystemAllocator};

/// Allocates room for `T` values from a [`PoolAllocator`].
pub struct TypedAlloc<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for TypedAlloc<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TypedAlloc<T> {
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }

    /// Bytes needed for `count` values of `T`.
    pub fn bytes_for(count: usize) -> Result<usize, AllocError> {
        let elem_size = std::mem::size_of::<T>();
        count
            .checked_mul(elem_size)
            .ok_or(AllocError::SizeOverflow { count, elem_size })
    }

    /// Room for `count` values. A zero count allocates nothing.
    pub fn allocate<S: SystemAllocator>(
        pool: &mut PoolAllocator<S>,
        count: usize,
    ) -> Result<Option<Allocation>, AllocError> {
        if count == 0 {
            return Ok(None);
        }
        let bytes = Self::bytes_for(count)?;
        pool.request(bytes).map(Some)
    }

    /// Room for a single value.
    pub fn allocate_one<S: SystemAllocator>(
        pool: &mut PoolAllocator<S>,
    ) -> Result<Allocation, AllocError> {
        pool.request(std::mem::size_of::<T>())
    }

    pub fn deallocate<S: SystemAllocator>(
        pool: &mut PoolAllocator<S>,
        allocation: Allocation,
    ) -> Result<(), AllocError> {
        pool.release(allocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_count_allocates_nothing() {
        let mut pool = PoolAllocator::new();
        assert!(TypedAlloc::<u64>::allocate(&mut pool, 0).unwrap().is_none());
        assert_eq!(pool.stats().requests, 0);
    }

    #[test]
    fn test_count_scales_by_element_size() {
        let mut pool = PoolAllocator::new();
        let a = TypedAlloc::<u32>::allocate(&mut pool, 5).unwrap().unwrap();
        assert_eq!(a.size(), 20);
        assert_eq!(a.class(), Some(2));

        let big = TypedAlloc::<[u8; 64]>::allocate(&mut pool, 3).unwrap().unwrap();
        assert!(big.is_large());
        TypedAlloc::<[u8; 64]>::deallocate(&mut pool, big).unwrap();
        TypedAlloc::<u32>::deallocate(&mut pool, a).unwrap();
        assert_eq!(pool.stats().releases, 2);
    }

    #[test]
    fn test_overflow_is_reported() {
        let mut pool = PoolAllocator::new();
        let err = TypedAlloc::<u64>::allocate(&mut pool, usize::MAX).unwrap_err();
        assert_eq!(
            err,
            AllocError::SizeOverflow {
                count: usize::MAX,
                elem_size: 8
            }
        );
    }

    #[test]
    fn test_allocate_one() {
        let mut pool = PoolAllocator::new();
        let a = TypedAlloc::<(u64, u64, u8)>::allocate_one(&mut pool).unwrap();
        assert_eq!(a.usable_size(), 24);
        // Zero-sized types still get a real block.
        let z = TypedAlloc::<()>::allocate_one(&mut pool).unwrap();
        assert_eq!(z.class(), Some(0));
    }
}
