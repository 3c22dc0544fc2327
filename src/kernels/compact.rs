// In: src/kernels/compact.rs

//! This module contains the mask-driven compaction kernel.
//!
//! Given a values buffer and a byte-boolean mask of the same length, it copies
//! exactly the elements whose mask byte is nonzero, in input order, into a new
//! contiguous buffer. Each chunk writes into its own output region starting at
//! the chunk's prefix-sum offset from the `ChunkPlan`, so chunks never touch
//! each other's memory.
//!
//! The mask is consumed eight bytes at a time as a `u64` word. An all-zero word
//! skips eight elements with a single compare; otherwise the eight mask bytes
//! are tested from the lowest address to the highest. Element sizes of 1, 2, 4
//! and 8 bytes copy through a typed load/store; every other size uses an
//! 8-byte word copy plus a byte remainder.

use std::sync::atomic::{AtomicBool, Ordering};

use bytemuck::Pod;
use log::debug;

use crate::config::MASK_WORD_BYTES;
use crate::error::KernelError;
use crate::kernels::copy_bytes;
use crate::kernels::planner::{self, ChunkPlan};
use crate::kernels::popcount::count_nonzero_with;
use crate::runtime::{run_on_grid, ChunkRunner};
use crate::types::{ElementKind, OwnedBuffer, TypedBuffer};
use crate::utils::{try_alloc_output, DisjointOut};

/// Everything one chunk needs. Built once per call and shared by reference.
struct CompactJob<'a> {
    values: TypedBuffer<'a>,
    mask: &'a [u8],
    plan: &'a ChunkPlan,
    out: DisjointOut<'a, u8>,
    allow_simd: bool,
}

//==================================================================================
// 1. Inner Loops
//==================================================================================

/// Walks `mask`, moving the source cursor by `stride` per element and copying
/// selected elements through `copy`. Returns the number of elements written.
///
/// # Safety
/// `src` must address `mask.len()` readable elements `stride` bytes apart, and
/// `dst` must have room for every selected element.
#[inline(always)]
unsafe fn walk_mask<F>(
    mask: &[u8],
    mut src: *const u8,
    stride: usize,
    item_size: usize,
    mut dst: *mut u8,
    copy: F,
) -> usize
where
    F: Fn(*const u8, *mut u8),
{
    let start = dst;
    let mut words = mask.chunks_exact(MASK_WORD_BYTES);

    for word in words.by_ref() {
        let mut bits = u64::from_le_bytes([
            word[0], word[1], word[2], word[3], word[4], word[5], word[6], word[7],
        ]);
        if bits == 0 {
            src = src.wrapping_add(MASK_WORD_BYTES * stride);
            continue;
        }
        for _ in 0..MASK_WORD_BYTES {
            if bits & 0xFF != 0 {
                copy(src, dst);
                dst = dst.add(item_size);
            }
            bits >>= 8;
            src = src.wrapping_add(stride);
        }
    }

    for &flag in words.remainder() {
        if flag != 0 {
            copy(src, dst);
            dst = dst.add(item_size);
        }
        src = src.wrapping_add(stride);
    }

    (dst as usize - start as usize) / item_size
}

/// Typed copy for the power-of-two element sizes.
///
/// # Safety
/// As for `walk_mask`, with `size_of::<T>()` equal to the element size.
unsafe fn compact_typed<T: Pod>(
    mask: &[u8],
    src: *const u8,
    stride: usize,
    dst: *mut u8,
) -> usize {
    walk_mask(mask, src, stride, std::mem::size_of::<T>(), dst, |from, to| {
        (to as *mut T).write_unaligned((from as *const T).read_unaligned())
    })
}

/// Word-plus-remainder copy for every other element size.
///
/// # Safety
/// As for `walk_mask`.
unsafe fn compact_variable(
    mask: &[u8],
    src: *const u8,
    stride: usize,
    item_size: usize,
    dst: *mut u8,
) -> usize {
    walk_mask(mask, src, stride, item_size, dst, |from, to| {
        copy_bytes(from, to, item_size)
    })
}

/// Maps `[start, start + len)` to one of `job.plan`'s chunks and returns
/// `(chunk, first_slot, count)`. `None` if the range is not a chunk of the
/// plan or the mask bytes in it do not hold exactly the planned true-count.
fn locate_chunk(job: &CompactJob<'_>, start: usize, len: usize) -> Option<(usize, usize, usize)> {
    let chunk = if job.plan.chunk_count() == 1 {
        0
    } else {
        start / job.plan.chunk_size()
    };
    if chunk >= job.plan.chunk_count() || job.plan.chunk_bounds(chunk) != (start, len) {
        return None;
    }
    let (first_slot, expected) = job.plan.output_bounds(chunk);
    let actual = count_nonzero_with(&job.mask[start..start + len], job.allow_simd);
    (actual == expected).then_some((chunk, first_slot, expected))
}

/// Compacts chunk `[start, start + len)` into its own output region.
///
/// # Safety
/// `(chunk, first_slot, expected)` must come from `locate_chunk` for this
/// range, and no other thread may be processing the same chunk.
unsafe fn compact_chunk(
    job: &CompactJob<'_>,
    start: usize,
    len: usize,
    (chunk, first_slot, expected): (usize, usize, usize),
) {
    let item_size = job.values.item_size();
    let stride = job.values.stride();

    let mask = &job.mask[start..start + len];
    let src = job.values.as_ptr().wrapping_add(start * stride);
    let dst = job.out.ptr_at(first_slot * item_size);

    let written = match item_size {
        1 => compact_typed::<u8>(mask, src, stride, dst),
        2 => compact_typed::<u16>(mask, src, stride, dst),
        4 => compact_typed::<u32>(mask, src, stride, dst),
        8 => compact_typed::<u64>(mask, src, stride, dst),
        _ => compact_variable(mask, src, stride, item_size, dst),
    };
    debug_assert_eq!(written, expected, "chunk {} wrote outside its region", chunk);
}

//==================================================================================
// 2. Public API
//==================================================================================

/// Compacts `values` by `mask` using a precomputed plan.
///
/// Every chunk is checked against the plan before it writes, so a plan built
/// from a different mask is rejected with `InvalidArgument`. If `runner`
/// works on a different chunk grid than the plan, the plan's chunks run on
/// the calling thread instead.
pub(crate) fn compact_with_plan(
    values: &TypedBuffer<'_>,
    mask: &TypedBuffer<'_>,
    plan: &ChunkPlan,
    runner: &dyn ChunkRunner,
    allow_simd: bool,
) -> Result<OwnedBuffer, KernelError> {
    let mask = validate_inputs(values, mask)?;
    if plan.mask_len() != mask.len() {
        return Err(KernelError::InvalidArgument(format!(
            "plan was built for a {}-byte mask, got {} bytes",
            plan.mask_len(),
            mask.len()
        )));
    }

    let mut data = try_alloc_output(plan.total_true(), values.item_size())?;
    let mismatched = AtomicBool::new(false);
    {
        let job = CompactJob {
            values: *values,
            mask,
            plan,
            out: DisjointOut::new(&mut data),
            allow_simd,
        };
        let run_chunk = |start: usize, len: usize| match locate_chunk(&job, start, len) {
            Some(slots) => {
                // SAFETY: the slots were just checked against this range, and
                // each chunk of the plan runs exactly once.
                unsafe { compact_chunk(&job, start, len, slots) };
                true
            }
            None => {
                mismatched.store(true, Ordering::Relaxed);
                false
            }
        };

        if plan.chunk_count() == 1 {
            run_chunk(0, mask.len());
        } else if runner.chunk_size() != plan.chunk_size()
            || !run_on_grid(runner, mask.len(), &run_chunk)?
        {
            debug!("compacting {} chunks on the calling thread", plan.chunk_count());
            for chunk in 0..plan.chunk_count() {
                let (start, len) = plan.chunk_bounds(chunk);
                if !run_chunk(start, len) {
                    break;
                }
            }
        }
    }
    if mismatched.load(Ordering::Relaxed) {
        return Err(KernelError::InvalidArgument(
            "plan does not match the mask's per-chunk true-counts".to_string(),
        ));
    }

    log_metric!(
        "event" = "compact",
        "len" = mask.len(),
        "selected" = plan.total_true(),
        "item_size" = values.item_size()
    );
    Ok(OwnedBuffer::new(data, plan.total_true(), values.kind()))
}

/// Plans and compacts in one call.
pub fn compact(
    values: &TypedBuffer<'_>,
    mask: &TypedBuffer<'_>,
    runner: &dyn ChunkRunner,
    allow_simd: bool,
) -> Result<OwnedBuffer, KernelError> {
    let mask_bytes = validate_inputs(values, mask)?;
    let plan = planner::plan(mask_bytes, runner, allow_simd);
    compact_with_plan(values, mask, &plan, runner, allow_simd)
}

/// The mask must be a contiguous Bool view with one byte per value.
fn validate_inputs<'a>(
    values: &TypedBuffer<'_>,
    mask: &TypedBuffer<'a>,
) -> Result<&'a [u8], KernelError> {
    if mask.kind() != ElementKind::Bool {
        return Err(KernelError::InvalidArgument(format!(
            "mask must be bool, got {}",
            mask.kind()
        )));
    }
    let bytes = mask.contiguous_bytes().ok_or_else(|| {
        KernelError::InvalidArgument(format!(
            "mask must be contiguous, got stride {}",
            mask.stride()
        ))
    })?;
    if bytes.len() != values.len() {
        return Err(KernelError::InvalidArgument(format!(
            "mask length {} does not match values length {}",
            bytes.len(),
            values.len()
        )));
    }
    Ok(bytes)
}

//==================================================================================
// 3. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KernelConfig;
    use crate::runtime::{OverreachRunner, RayonRunner, SerialRunner};
    use crate::utils::typed_slice_to_bytes;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn parallel_runner(chunk_size: usize) -> RayonRunner {
        RayonRunner::new(&KernelConfig {
            chunk_size,
            parallel_threshold: 0,
            num_threads: Some(4),
            ..Default::default()
        })
        .unwrap()
    }

    fn bool_mask(flags: &[bool]) -> Vec<u8> {
        flags.iter().map(|&f| f as u8).collect()
    }

    /// Straightforward reference: the selected elements' bytes, in order.
    fn reference(values: &TypedBuffer<'_>, mask: &[u8]) -> Vec<u8> {
        (0..values.len())
            .filter(|&i| mask[i] != 0)
            .flat_map(|i| values.element(i).unwrap().to_vec())
            .collect()
    }

    #[test]
    fn test_selects_marked_int32_elements() {
        let values = [10i32, 20, 30, 40, 50];
        let mask = bool_mask(&[true, false, true, true, false]);
        let out = compact(
            &TypedBuffer::from_slice(&values, ElementKind::Int32).unwrap(),
            &TypedBuffer::from_bytes(&mask, ElementKind::Bool).unwrap(),
            &SerialRunner::new(64),
            true,
        )
        .unwrap();
        assert_eq!(out.kind(), ElementKind::Int32);
        assert_eq!(out.to_vec::<i32>().unwrap(), vec![10, 30, 40]);
    }

    #[test]
    fn test_all_false_mask_yields_empty() {
        let values = [1.5f64, 2.5, 3.5];
        let mask = [0u8; 3];
        let out = compact(
            &TypedBuffer::from_slice(&values, ElementKind::Float64).unwrap(),
            &TypedBuffer::from_bytes(&mask, ElementKind::Bool).unwrap(),
            &SerialRunner::new(64),
            true,
        )
        .unwrap();
        assert!(out.is_empty());
        assert_eq!(out.kind(), ElementKind::Float64);
    }

    #[test]
    fn test_empty_input() {
        let values: [u16; 0] = [];
        let out = compact(
            &TypedBuffer::from_slice(&values, ElementKind::UInt16).unwrap(),
            &TypedBuffer::from_bytes(&[], ElementKind::Bool).unwrap(),
            &parallel_runner(64),
            true,
        )
        .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_all_true_is_identity() {
        let values: Vec<u64> = (0..1000).collect();
        let mask = vec![0xFFu8; values.len()];
        let out = compact(
            &TypedBuffer::from_slice(&values, ElementKind::UInt64).unwrap(),
            &TypedBuffer::from_bytes(&mask, ElementKind::Bool).unwrap(),
            &parallel_runner(64),
            true,
        )
        .unwrap();
        assert_eq!(out.to_vec::<u64>().unwrap(), values);
    }

    #[test]
    fn test_rejects_bad_masks() {
        let values = [1u8, 2, 3, 4];
        let view = TypedBuffer::from_slice(&values, ElementKind::UInt8).unwrap();
        let runner = SerialRunner::new(64);

        let short = [1u8, 0, 1];
        let short = TypedBuffer::from_bytes(&short, ElementKind::Bool).unwrap();
        let result = compact(&view, &short, &runner, true);
        assert!(matches!(result, Err(KernelError::InvalidArgument(_))));

        let not_bool = [1u8, 0, 1, 1];
        let not_bool = TypedBuffer::from_bytes(&not_bool, ElementKind::UInt8).unwrap();
        let result = compact(&view, &not_bool, &runner, true);
        assert!(matches!(result, Err(KernelError::InvalidArgument(_))));

        let wide = [1u8, 0, 0, 0, 1, 0, 1, 0];
        let strided = TypedBuffer::strided(&wide, 4, 2, ElementKind::Bool).unwrap();
        let result = compact(&view, &strided, &runner, true);
        assert!(matches!(result, Err(KernelError::InvalidArgument(_))));
    }

    #[test]
    fn test_rejects_plan_for_another_mask() {
        let values = [1u8, 2, 3, 4];
        let mask = [1u8, 0, 1, 1];
        let runner = SerialRunner::new(64);
        let plan = planner::plan(&mask[..2], &runner, true);
        let result = compact_with_plan(
            &TypedBuffer::from_slice(&values, ElementKind::UInt8).unwrap(),
            &TypedBuffer::from_bytes(&mask, ElementKind::Bool).unwrap(),
            &plan,
            &runner,
            true,
        );
        assert!(matches!(result, Err(KernelError::InvalidArgument(_))));
    }

    #[test]
    fn test_rejects_plan_from_same_length_mask() {
        // Both masks hold two true bytes, split [1, 1] and [0, 2] across chunks.
        let values: Vec<u64> = (100..116).collect();
        let mut planned = [0u8; 16];
        planned[0] = 1;
        planned[8] = 1;
        let mut actual = [0u8; 16];
        actual[8] = 1;
        actual[9] = 1;

        let runner = parallel_runner(8);
        let plan = planner::plan(&planned, &runner, true);
        assert_eq!(plan.offsets(), &[0, 1]);

        let values = TypedBuffer::from_slice(&values, ElementKind::UInt64).unwrap();
        let actual = TypedBuffer::from_bytes(&actual, ElementKind::Bool).unwrap();
        for runner in [&runner as &dyn ChunkRunner, &SerialRunner::new(8)] {
            let result = compact_with_plan(&values, &actual, &plan, runner, true);
            assert!(matches!(result, Err(KernelError::InvalidArgument(_))));
        }

        let out = compact(&values, &actual, &runner, true).unwrap();
        assert_eq!(out.to_vec::<u64>().unwrap(), vec![108, 109]);
    }

    #[test]
    fn test_off_grid_runner_is_refused() {
        let values: Vec<u32> = (0..40).collect();
        let mask: Vec<u8> = (0..40).map(|i| (i % 5 == 0) as u8).collect();
        let values = TypedBuffer::from_slice(&values, ElementKind::UInt32).unwrap();
        let mask = TypedBuffer::from_bytes(&mask, ElementKind::Bool).unwrap();

        // Planning falls back to one chunk, which never goes through the runner.
        let out = compact(&values, &mask, &OverreachRunner, true).unwrap();
        assert_eq!(out.to_vec::<u32>().unwrap(), vec![0, 5, 10, 15, 20, 25, 30, 35]);

        // A multi-chunk plan on the runner's own grid has its range refused.
        let mask_bytes = mask.contiguous_bytes().unwrap();
        let plan = planner::plan(mask_bytes, &parallel_runner(8), true);
        assert_eq!(plan.chunk_count(), 5);
        let result = compact_with_plan(&values, &mask, &plan, &OverreachRunner, true);
        assert!(matches!(result, Err(KernelError::InternalError(_))));
    }

    #[test]
    fn test_zero_stride_values_repeat_one_element() {
        let single = 0x0102_0304u32.to_ne_bytes();
        let values = TypedBuffer::strided(&single, 20, 0, ElementKind::UInt32).unwrap();
        let mask: Vec<u8> = (0..20).map(|i| (i % 3 != 1) as u8).collect();
        let mask = TypedBuffer::from_bytes(&mask, ElementKind::Bool).unwrap();

        for runner in [&SerialRunner::new(8) as &dyn ChunkRunner, &parallel_runner(8)] {
            let out = compact(&values, &mask, runner, true).unwrap();
            assert_eq!(out.to_vec::<u32>().unwrap(), vec![0x0102_0304; 13]);
        }
    }

    #[test]
    fn test_every_item_size_matches_reference() {
        let mut rng = StdRng::seed_from_u64(11);
        let len = 1037;
        for item_size in [1usize, 2, 3, 4, 8, 12, 16, 24] {
            let bytes: Vec<u8> = (0..len * item_size).map(|_| rng.random()).collect();
            let mask: Vec<u8> = (0..len).map(|_| rng.random_bool(0.5) as u8).collect();
            let values = TypedBuffer::from_bytes(&bytes, ElementKind::Opaque(item_size)).unwrap();
            let expected = reference(&values, &mask);

            for runner in [&SerialRunner::new(64) as &dyn ChunkRunner, &parallel_runner(64)] {
                let out = compact(
                    &values,
                    &TypedBuffer::from_bytes(&mask, ElementKind::Bool).unwrap(),
                    runner,
                    true,
                )
                .unwrap();
                assert_eq!(out.as_bytes(), expected.as_slice(), "item_size {}", item_size);
                assert_eq!(out.len() * item_size, expected.len());
            }
        }
    }

    #[test]
    fn test_result_independent_of_chunk_size() {
        let mut rng = StdRng::seed_from_u64(99);
        let values: Vec<i32> = (0..50_000).map(|_| rng.random()).collect();
        let mask: Vec<u8> = (0..values.len()).map(|_| rng.random_bool(0.1) as u8).collect();
        let view = TypedBuffer::from_slice(&values, ElementKind::Int32).unwrap();
        let mask_view = TypedBuffer::from_bytes(&mask, ElementKind::Bool).unwrap();

        let baseline = compact(&view, &mask_view, &SerialRunner::new(8), false).unwrap();
        for chunk_size in [8, 64, 1000, 4096, 65_536] {
            let out = compact(&view, &mask_view, &parallel_runner(chunk_size), true).unwrap();
            assert_eq!(out, baseline, "chunk_size {}", chunk_size);
        }
    }

    #[test]
    fn test_strided_values() {
        // Every third i16 of a larger buffer.
        let backing: Vec<i16> = (0..30).collect();
        let bytes = typed_slice_to_bytes(&backing);
        let values = TypedBuffer::strided(&bytes, 10, 6, ElementKind::Int16).unwrap();
        let mask = bool_mask(&[true, true, false, false, true, false, false, false, true, true]);
        let out = compact(
            &values,
            &TypedBuffer::from_bytes(&mask, ElementKind::Bool).unwrap(),
            &SerialRunner::new(8),
            true,
        )
        .unwrap();
        assert_eq!(out.to_vec::<i16>().unwrap(), vec![0, 3, 12, 24, 27]);
    }

    #[test]
    fn test_plan_from_foreign_grid_runs_serially() {
        let values: Vec<u32> = (0..500).collect();
        let mask: Vec<u8> = (0..500).map(|i| (i % 7 == 0) as u8).collect();
        let plan = planner::plan(&mask, &parallel_runner(64), true);
        assert!(plan.chunk_count() > 1);

        let out = compact_with_plan(
            &TypedBuffer::from_slice(&values, ElementKind::UInt32).unwrap(),
            &TypedBuffer::from_bytes(&mask, ElementKind::Bool).unwrap(),
            &plan,
            &parallel_runner(128),
            true,
        )
        .unwrap();
        let expected: Vec<u32> = (0..500).filter(|i| i % 7 == 0).collect();
        assert_eq!(out.to_vec::<u32>().unwrap(), expected);
    }
}
