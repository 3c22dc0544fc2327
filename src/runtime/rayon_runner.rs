//! A `ChunkRunner` backed by rayon worker threads.

use log::{trace, warn};
use rayon::{BroadcastContext, ThreadPool, ThreadPoolBuilder};

use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::runtime::{ChunkFn, ChunkRunner, WorkItem};

/// Distributes chunks over either a dedicated pool (`num_threads`) or rayon's
/// global pool.
pub struct RayonRunner {
    pool: Option<ThreadPool>,
    chunk_size: usize,
    parallel_threshold: usize,
    threading: bool,
}

impl RayonRunner {
    pub fn new(config: &KernelConfig) -> Result<Self, KernelError> {
        config.validate()?;
        let pool = match config.num_threads {
            Some(n) if config.threading => match ThreadPoolBuilder::new()
                .num_threads(n)
                .thread_name(|i| format!("fastloops-worker-{}", i))
                .build()
            {
                Ok(pool) => Some(pool),
                Err(e) => {
                    warn!(
                        "could not build a {}-thread pool ({}); using the global pool",
                        n, e
                    );
                    None
                }
            },
            _ => None,
        };
        Ok(Self {
            pool,
            chunk_size: config.chunk_size,
            parallel_threshold: config.parallel_threshold,
            threading: config.threading,
        })
    }

    /// Number of workers a dispatch would use.
    pub fn num_threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }
}

// SAFETY: chunks come from a fresh `WorkItem` cut on `chunk_size`, each index
// is claimed once by an atomic counter, and `broadcast` joins before returning.
unsafe impl ChunkRunner for RayonRunner {
    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn run_chunked(&self, total: usize, f: &ChunkFn<'_>) -> bool {
        if !self.threading || total < self.parallel_threshold {
            return false;
        }
        let work = WorkItem::new(total, self.chunk_size);
        let workers = self.num_threads();
        if work.chunk_count() < 2 || workers < 2 {
            return false;
        }
        trace!(
            "dispatching {} chunks of {} over {} workers",
            work.chunk_count(),
            self.chunk_size,
            workers
        );

        let drain = |_ctx: BroadcastContext<'_>| {
            while let Some(chunk) = work.claim_next() {
                f(chunk.start, chunk.len);
                work.complete();
            }
        };
        match &self.pool {
            Some(pool) => {
                pool.broadcast(drain);
            }
            None => {
                rayon::broadcast(drain);
            }
        }
        debug_assert!(work.is_finished());
        true
    }
}
