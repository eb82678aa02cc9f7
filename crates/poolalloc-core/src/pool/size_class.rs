//! Size class table for small allocations.
//!
//! Requests up to [`MAX_BLOCK`] bytes are rounded up to a multiple of
//! [`ALIGN`] and served from one of [`NUM_SIZE_CLASSES`] segregated free
//! lists. Class `i` holds blocks of exactly `(i + 1) * ALIGN` bytes.

/// Alignment granularity of small blocks (bytes).
pub const ALIGN: usize = 8;

/// Largest request served from the pool. Above this, use the system allocator.
pub const MAX_BLOCK: usize = 128;

/// Number of size classes (one free list each).
pub const NUM_SIZE_CLASSES: usize = MAX_BLOCK / ALIGN;

/// Blocks carved per refill when the arena allows it.
pub const DEFAULT_BATCH: usize = 20;

/// Upper bound accepted for a configured refill batch.
pub const MAX_BATCH: usize = 1024;

const _: () = assert!(ALIGN.is_power_of_two());
const _: () = assert!(MAX_BLOCK % ALIGN == 0);
const _: () = assert!(NUM_SIZE_CLASSES == 16);
// A free block must be able to hold an encoded link.
const _: () = assert!(ALIGN >= core::mem::size_of::<u64>());

/// Rounds `bytes` up to the nearest multiple of [`ALIGN`].
///
/// Callers pass sizes well below `usize::MAX`; the pool only rounds small
/// requests and growth amounts.
#[inline]
pub const fn round_up(bytes: usize) -> usize {
    (bytes + ALIGN - 1) & !(ALIGN - 1)
}

/// Returns the size class index serving `bytes`.
///
/// Only meaningful for `1 <= bytes <= MAX_BLOCK`; the allocator facade
/// guards both ends before calling this.
#[inline]
pub const fn class_of(bytes: usize) -> usize {
    round_up(bytes) / ALIGN - 1
}

/// Returns the block size of class `class`.
#[inline]
pub const fn class_size(class: usize) -> usize {
    (class + 1) * ALIGN
}

/// Returns true if `bytes` is served by the size-class path.
#[inline]
pub const fn is_small(bytes: usize) -> bool {
    bytes <= MAX_BLOCK
}
