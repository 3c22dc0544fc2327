// In: src/runtime/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Work-Distribution Contract
// ====================================================================================
//
// Kernels never create or manage threads. They express their work as a half-open
// range `[0, total)` cut into fixed-size chunks and hand a pure per-chunk function
// to a `ChunkRunner`:
//
//   1. [Kernel]       -> builds a per-dispatch context, calls `run_chunked(total, f)`
//         |
//         `-> returns `true`  : every chunk ran (in parallel) before the call returned
//         `-> returns `false` : nothing ran; the kernel runs the same work inline
//
//   2. [ChunkRunner]  -> one `WorkItem` per dispatch; workers claim the next chunk,
//                        call `f(start, len)`, mark it complete, and the caller joins.
//
// There is no cancellation and no asynchronous return: a dispatch runs to completion.
// ====================================================================================

use std::sync::atomic::{AtomicBool, Ordering};

use log::warn;

use crate::error::KernelError;

pub mod rayon_runner;
pub mod work_item;

pub use rayon_runner::RayonRunner;
pub use work_item::{Chunk, WorkItem};

/// A per-chunk function: `(chunk_start, chunk_len) -> did_work`.
pub type ChunkFn<'a> = dyn Fn(usize, usize) -> bool + Sync + 'a;

/// The consumed thread-pool contract.
///
/// # Safety
/// Kernels write through raw pointers at offsets derived from the ranges a
/// runner hands to `f`. When `run_chunked` returns `true`, an implementation
/// must have called `f` exactly once for every chunk of `[0, total)` cut on
/// the `chunk_size()` grid (chunk `i` is `[i * chunk_size, min((i + 1) *
/// chunk_size, total))`), with no other ranges, and joined before returning.
/// When it returns `false` it must not have called `f` at all.
pub unsafe trait ChunkRunner: Send + Sync {
    /// The native work-unit size, in elements.
    fn chunk_size(&self) -> usize;

    /// Runs `f` over every chunk of `[0, total)` and joins.
    ///
    /// Returns `false`, without calling `f`, if the work was not parallelized;
    /// the caller must then run the same logical work itself.
    fn run_chunked(&self, total: usize, f: &ChunkFn<'_>) -> bool;
}

/// Number of chunks covering `total` elements. Never zero, so per-chunk
/// tables always have at least one entry.
pub fn chunk_count(total: usize, chunk_size: usize) -> usize {
    total.div_ceil(chunk_size).max(1)
}

/// Dispatches `f` through `runner`, refusing any range that is not a chunk of
/// the runner's grid over `[0, total)`.
///
/// Returns `Ok(true)` if the runner ran every chunk, `Ok(false)` if it
/// declined, and `InternalError` if it handed out a range off the grid. `f`
/// never sees a refused range.
pub(crate) fn run_on_grid(
    runner: &dyn ChunkRunner,
    total: usize,
    f: &ChunkFn<'_>,
) -> Result<bool, KernelError> {
    let chunk_size = runner.chunk_size();
    let stray = AtomicBool::new(false);
    let guarded = |start: usize, len: usize| {
        if !is_grid_chunk(start, len, total, chunk_size) {
            warn!(
                "runner produced range [{}, +{}) outside the {}-element grid over {}",
                start, len, chunk_size, total
            );
            stray.store(true, Ordering::Relaxed);
            return false;
        }
        f(start, len)
    };
    let ran = runner.run_chunked(total, &guarded);
    if stray.load(Ordering::Relaxed) {
        return Err(KernelError::InternalError(format!(
            "runner produced a chunk off its {}-element grid over {} elements",
            chunk_size, total
        )));
    }
    Ok(ran)
}

/// Runs `f` through `runner`, or over the whole range on the calling thread if
/// the runner declines. Returns whether the work ran in parallel.
pub(crate) fn run_or_inline(
    runner: &dyn ChunkRunner,
    total: usize,
    f: &ChunkFn<'_>,
) -> Result<bool, KernelError> {
    if run_on_grid(runner, total, f)? {
        return Ok(true);
    }
    f(0, total);
    Ok(false)
}

/// Whether `[start, start + len)` is exactly one chunk of the `chunk_size`
/// grid over `[0, total)`.
pub(crate) fn is_grid_chunk(start: usize, len: usize, total: usize, chunk_size: usize) -> bool {
    if chunk_size == 0 || start % chunk_size != 0 {
        return false;
    }
    if total == 0 {
        return start == 0 && len == 0;
    }
    start < total && len == chunk_size.min(total - start)
}

//==================================================================================
// Serial Runner
//==================================================================================

/// A runner that never parallelizes. Every kernel falls back to running on
/// the calling thread.
#[derive(Debug, Clone, Copy)]
pub struct SerialRunner {
    chunk_size: usize,
}

impl SerialRunner {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }
}

// SAFETY: never calls `f` and always declines.
unsafe impl ChunkRunner for SerialRunner {
    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn run_chunked(&self, _total: usize, _f: &ChunkFn<'_>) -> bool {
        false
    }
}

/// A runner that hands the callback one range running far past the end of
/// the work, then claims success.
#[cfg(test)]
pub(crate) struct OverreachRunner;

// SAFETY: not upheld; kernel tests use this to check the grid guard in
// `run_on_grid`.
#[cfg(test)]
unsafe impl ChunkRunner for OverreachRunner {
    fn chunk_size(&self) -> usize {
        8
    }

    fn run_chunked(&self, total: usize, f: &ChunkFn<'_>) -> bool {
        f(0, total + 4096);
        true
    }
}
