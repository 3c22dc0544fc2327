// In: src/kernels/mod.rs

//! This module is the public entry point for all low-level kernels.
//!
//! Every kernel is a pure function over borrowed views that returns a freshly
//! allocated `OwnedBuffer`. Parallelism is delegated to a `ChunkRunner`; the
//! kernels themselves never spawn threads.

pub mod compact;
pub mod gather;
pub mod planner;
pub mod popcount;
pub mod simd;

pub use compact::compact;
pub use gather::gather;
pub use planner::{plan, ChunkPlan};
pub use popcount::{count_nonzero, count_nonzero_raw, count_nonzero_with};

/// Copies `n` bytes as 8-byte words followed by a byte remainder.
///
/// # Safety
/// `src` must be readable and `dst` writable for `n` bytes, and the two ranges
/// must not overlap. No alignment is required.
#[inline(always)]
pub(crate) unsafe fn copy_bytes(src: *const u8, dst: *mut u8, n: usize) {
    let mut i = 0;
    while i + 8 <= n {
        (dst.add(i) as *mut u64).write_unaligned((src.add(i) as *const u64).read_unaligned());
        i += 8;
    }
    while i < n {
        *dst.add(i) = *src.add(i);
        i += 1;
    }
}
