//! This module contains the population counter for byte-boolean buffers.
//!
//! Any nonzero byte counts as true. The vector path clamps every byte to 0/1
//! with a saturating minimum against an all-ones register, then adds the 0/1
//! lanes into per-lane byte counters. A byte counter overflows after 255
//! additions, so at most 255 registers are accumulated before the counters are
//! widened and folded into the scalar total. The tail shorter than one
//! register is summed with a plain scalar loop.

use crate::kernels::simd::{self, ByteLanes, PortableLanes, LANES};

/// Maximum register loads accumulated into byte counters before widening.
const MAX_BATCH: usize = u8::MAX as usize;

//==================================================================================
// 1. Private Core Logic
//==================================================================================

/// The batched counting loop, generic over the register implementation.
///
/// # Safety
/// `V`'s CPU requirements must be satisfied.
#[inline(always)]
unsafe fn count_lanes<V: ByteLanes>(data: &[u8]) -> u64 {
    let vector_count = data.len() / LANES;
    let ones = V::ones();
    let base = data.as_ptr();
    let mut total = 0u64;

    let mut i = 0;
    while i < vector_count {
        let batch = (vector_count - i).min(MAX_BATCH);
        let mut byte_counts = V::zero();
        for j in 0..batch {
            let clamped = V::load(base.add((i + j) * LANES)).min_u8(ones);
            byte_counts = byte_counts.add_u8(clamped);
        }
        total += byte_counts.widen_sum();
        i += batch;
    }

    total + count_scalar(&data[vector_count * LANES..])
}

#[inline]
fn count_scalar(data: &[u8]) -> u64 {
    data.iter().filter(|&&b| b != 0).count() as u64
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn count_avx2(data: &[u8]) -> u64 {
    count_lanes::<simd::Avx2Lanes>(data)
}

fn count_portable(data: &[u8]) -> u64 {
    // SAFETY: the portable lanes have no CPU requirements.
    unsafe { count_lanes::<PortableLanes>(data) }
}

//==================================================================================
// 2. Public API
//==================================================================================

/// Counts the nonzero bytes of `data`, taking the vector path when `allow_simd`
/// is set and the CPU supports it.
#[cfg_attr(not(target_arch = "x86_64"), allow(unused_variables))]
pub fn count_nonzero_with(data: &[u8], allow_simd: bool) -> usize {
    if data.len() < LANES {
        return count_scalar(data) as usize;
    }
    #[cfg(target_arch = "x86_64")]
    {
        if allow_simd && simd::has_avx2() {
            // SAFETY: AVX2 support was just verified.
            return unsafe { count_avx2(data) } as usize;
        }
    }
    count_portable(data) as usize
}

/// Counts the nonzero bytes of `data`.
pub fn count_nonzero(data: &[u8]) -> usize {
    count_nonzero_with(data, true)
}

/// Pointer-and-length form of the counter for host adapters.
///
/// Returns 0 for a null pointer or a negative length.
///
/// # Safety
/// If `data` is non-null and `length > 0`, `data` must be readable for
/// `length` bytes.
pub unsafe fn count_nonzero_raw(data: *const u8, length: i64) -> i64 {
    if data.is_null() || length <= 0 {
        return 0;
    }
    let bytes = std::slice::from_raw_parts(data, length as usize);
    count_nonzero(bytes) as i64
}

//==================================================================================
// 3. Unit Tests
//==================================================================================
