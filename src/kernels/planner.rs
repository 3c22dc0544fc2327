// In: src/kernels/planner.rs

//! The chunk planner for mask compaction.
//!
//! This module turns a byte-boolean mask into a `ChunkPlan`:
//! 1. The mask is cut into the runner's chunks and each chunk's true-count is
//!    taken in parallel (one population count per chunk).
//! 2. After the join, a strictly sequential left-to-right pass rewrites the
//!    per-chunk counts into exclusive prefix sums.
//!
//! Entry `i` of the resulting table is the first output slot owned by chunk
//! `i`, so the compaction pass can write every chunk into a disjoint region
//! without any coordination. If the runner does not parallelize, the whole
//! mask becomes a single logical chunk.

use log::{debug, warn};

use crate::kernels::popcount::count_nonzero_with;
use crate::runtime::{chunk_count, run_on_grid, ChunkRunner};
use crate::utils::DisjointOut;

//==================================================================================
// 1. The Plan
//==================================================================================

/// Per-chunk output offsets for one mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    mask_len: usize,
    chunk_size: usize,
    /// Exclusive prefix sums of the per-chunk true-counts. Never empty.
    offsets: Vec<i64>,
    total_true: usize,
}

impl ChunkPlan {
    /// Number of chunks. At least one, even for an empty mask.
    pub fn chunk_count(&self) -> usize {
        self.offsets.len()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn mask_len(&self) -> usize {
        self.mask_len
    }

    /// The offset table: entry `i` is the total true-count of chunks `0..i`.
    pub fn offsets(&self) -> &[i64] {
        &self.offsets
    }

    /// Total number of true bytes in the mask, i.e. the compacted length.
    pub fn total_true(&self) -> usize {
        self.total_true
    }

    /// The element range `[start, start + len)` covered by chunk `index`.
    pub fn chunk_bounds(&self, index: usize) -> (usize, usize) {
        if self.offsets.len() == 1 {
            return (0, self.mask_len);
        }
        let start = index * self.chunk_size;
        (start, self.chunk_size.min(self.mask_len - start))
    }

    /// The output slot range owned by chunk `index`: `(first_slot, count)`.
    pub fn output_bounds(&self, index: usize) -> (usize, usize) {
        let first = self.offsets[index] as usize;
        let next = self
            .offsets
            .get(index + 1)
            .map_or(self.total_true, |&o| o as usize);
        (first, next - first)
    }
}

//==================================================================================
// 2. Planning
//==================================================================================

/// Counts the mask per chunk (in parallel when the runner allows) and builds
/// the offset table.
pub fn plan(mask: &[u8], runner: &dyn ChunkRunner, allow_simd: bool) -> ChunkPlan {
    let chunk_size = runner.chunk_size();
    let mut counts = vec![0i64; chunk_count(mask.len(), chunk_size)];

    let parallel = {
        let out = DisjointOut::new(&mut counts);
        let count_chunk = |start: usize, len: usize| {
            let total = count_nonzero_with(&mask[start..start + len], allow_simd);
            // SAFETY: `run_on_grid` only passes grid chunks, so the index is in
            // bounds, and each chunk index is claimed by exactly one worker.
            unsafe { out.write(start / chunk_size, total as i64) };
            true
        };
        match run_on_grid(runner, mask.len(), &count_chunk) {
            Ok(ran) => ran,
            Err(err) => {
                warn!("discarding parallel counts: {}", err);
                false
            }
        }
    };

    if !parallel {
        counts.truncate(1);
        counts[0] = count_nonzero_with(mask, allow_simd) as i64;
    }

    let total_true = exclusive_prefix_sum(&mut counts) as usize;
    debug!(
        "planned mask of {} bytes: {} chunk(s), {} true, parallel={}",
        mask.len(),
        counts.len(),
        total_true,
        parallel
    );
    log_metric!("event" = "plan", "chunks" = counts.len(), "total_true" = total_true);

    ChunkPlan {
        mask_len: mask.len(),
        chunk_size,
        offsets: counts,
        total_true,
    }
}

/// Rewrites counts in place into exclusive prefix sums and returns the grand total.
pub fn exclusive_prefix_sum(counts: &mut [i64]) -> i64 {
    let mut running = 0i64;
    for entry in counts.iter_mut() {
        let count = *entry;
        *entry = running;
        running += count;
    }
    running
}

//==================================================================================
// 3. Unit Tests
//==================================================================================
