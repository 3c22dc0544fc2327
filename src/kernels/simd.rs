//! The narrow vector interface used by the population counter.
//!
//! A `ByteLanes` register holds 32 byte lanes. The operations are exactly the
//! ones the counter needs: load, saturating minimum, lane-wise add, and a
//! widening horizontal reduction. `PortableLanes` implements identical
//! semantics in scalar code; `Avx2Lanes` maps each operation onto one or a few
//! AVX2 instructions and is only reachable after a runtime capability check.

/// Number of byte lanes in one register.
pub const LANES: usize = 32;

/// A 32 x u8 register.
///
/// All methods are `unsafe` because implementations may require CPU features
/// that the caller must have verified.
pub(crate) trait ByteLanes: Copy {
    /// All lanes zero.
    unsafe fn zero() -> Self;
    /// All lanes one.
    unsafe fn ones() -> Self;
    /// Unaligned load of `LANES` bytes.
    ///
    /// # Safety
    /// `ptr` must be readable for `LANES` bytes.
    unsafe fn load(ptr: *const u8) -> Self;
    /// Lane-wise unsigned minimum.
    unsafe fn min_u8(self, other: Self) -> Self;
    /// Lane-wise wrapping add.
    unsafe fn add_u8(self, other: Self) -> Self;
    /// Sum of all lanes, widened 8 -> 16 -> 32 -> 64 bits.
    unsafe fn widen_sum(self) -> u64;
}

//==================================================================================
// 1. Portable Fallback
//==================================================================================

#[derive(Clone, Copy)]
pub(crate) struct PortableLanes([u8; LANES]);

impl ByteLanes for PortableLanes {
    #[inline(always)]
    unsafe fn zero() -> Self {
        Self([0; LANES])
    }

    #[inline(always)]
    unsafe fn ones() -> Self {
        Self([1; LANES])
    }

    #[inline(always)]
    unsafe fn load(ptr: *const u8) -> Self {
        Self(std::ptr::read_unaligned(ptr as *const [u8; LANES]))
    }

    #[inline(always)]
    unsafe fn min_u8(self, other: Self) -> Self {
        let mut out = [0u8; LANES];
        for (o, (a, b)) in out.iter_mut().zip(self.0.iter().zip(other.0.iter())) {
            *o = (*a).min(*b);
        }
        Self(out)
    }

    #[inline(always)]
    unsafe fn add_u8(self, other: Self) -> Self {
        let mut out = [0u8; LANES];
        for (o, (a, b)) in out.iter_mut().zip(self.0.iter().zip(other.0.iter())) {
            *o = a.wrapping_add(*b);
        }
        Self(out)
    }

    #[inline(always)]
    unsafe fn widen_sum(self) -> u64 {
        // Pairwise widening, mirroring the vector unpack-and-add ladder.
        let mut w16 = [0u16; LANES / 2];
        for (i, w) in w16.iter_mut().enumerate() {
            *w = self.0[2 * i] as u16 + self.0[2 * i + 1] as u16;
        }
        let mut w32 = [0u32; LANES / 4];
        for (i, w) in w32.iter_mut().enumerate() {
            *w = w16[2 * i] as u32 + w16[2 * i + 1] as u32;
        }
        let mut w64 = [0u64; LANES / 8];
        for (i, w) in w64.iter_mut().enumerate() {
            *w = w32[2 * i] as u64 + w32[2 * i + 1] as u64;
        }
        w64.iter().sum()
    }
}

//==================================================================================
// 2. AVX2
//==================================================================================

#[cfg(target_arch = "x86_64")]
pub(crate) use avx2::Avx2Lanes;

#[cfg(target_arch = "x86_64")]
mod avx2 {
    use super::{ByteLanes, LANES};
    use std::arch::x86_64::*;

    #[derive(Clone, Copy)]
    pub(crate) struct Avx2Lanes(__m256i);

    impl ByteLanes for Avx2Lanes {
        #[inline]
        #[target_feature(enable = "avx2")]
        unsafe fn zero() -> Self {
            Self(_mm256_setzero_si256())
        }

        #[inline]
        #[target_feature(enable = "avx2")]
        unsafe fn ones() -> Self {
            // cmpeq(0, 0) is all 0xFF; abs of -1 in every byte is 1.
            let zeros = _mm256_setzero_si256();
            Self(_mm256_abs_epi8(_mm256_cmpeq_epi8(zeros, zeros)))
        }

        #[inline]
        #[target_feature(enable = "avx2")]
        unsafe fn load(ptr: *const u8) -> Self {
            Self(_mm256_loadu_si256(ptr as *const __m256i))
        }

        #[inline]
        #[target_feature(enable = "avx2")]
        unsafe fn min_u8(self, other: Self) -> Self {
            Self(_mm256_min_epu8(self.0, other.0))
        }

        #[inline]
        #[target_feature(enable = "avx2")]
        unsafe fn add_u8(self, other: Self) -> Self {
            Self(_mm256_add_epi8(self.0, other.0))
        }

        #[inline]
        #[target_feature(enable = "avx2")]
        unsafe fn widen_sum(self) -> u64 {
            // Zeros go in the second operand so they land in the high half of each widened lane.
            let zeros = _mm256_setzero_si256();

            let w16 = _mm256_add_epi16(
                _mm256_unpacklo_epi8(self.0, zeros),
                _mm256_unpackhi_epi8(self.0, zeros),
            );
            let w32 = _mm256_add_epi32(
                _mm256_unpacklo_epi16(w16, zeros),
                _mm256_unpackhi_epi16(w16, zeros),
            );
            let w64 = _mm256_add_epi64(
                _mm256_unpacklo_epi32(w32, zeros),
                _mm256_unpackhi_epi32(w32, zeros),
            );

            let mut lanes = [0u64; LANES / 8];
            _mm256_storeu_si256(lanes.as_mut_ptr() as *mut __m256i, w64);
            lanes.iter().sum()
        }
    }
}

/// Whether the AVX2 path may be used on this CPU.
#[inline]
pub fn has_avx2() -> bool {
    #[cfg(target_arch = "x86_64")]
    {
        std::arch::is_x86_feature_detected!("avx2")
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        false
    }
}
