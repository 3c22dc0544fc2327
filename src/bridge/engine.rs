// In: src/bridge/engine.rs

use std::sync::Arc;

use log::debug;

use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::kernels;
use crate::runtime::{ChunkRunner, RayonRunner};
use crate::types::{ElementKind, OwnedBuffer, TypedBuffer};

/// A high-level, stateful object that owns an execution configuration and the
/// runner built from it. Every kernel call through the same engine shares the
/// same worker pool.
pub struct Engine {
    config: Arc<KernelConfig>,
    runner: Box<dyn ChunkRunner>,
}

impl Engine {
    /// Creates an engine backed by rayon workers.
    pub fn new(config: KernelConfig) -> Result<Self, KernelError> {
        let runner = RayonRunner::new(&config)?;
        debug!(
            "engine ready: chunk_size={}, threshold={}, threading={}, workers={}, simd={}",
            config.chunk_size,
            config.parallel_threshold,
            config.threading,
            runner.num_threads(),
            config.simd
        );
        Ok(Self {
            config: Arc::new(config),
            runner: Box::new(runner),
        })
    }

    /// Creates an engine that dispatches through a caller-supplied runner.
    /// The runner's chunk size takes precedence over `config.chunk_size`.
    pub fn with_runner(
        config: KernelConfig,
        runner: Box<dyn ChunkRunner>,
    ) -> Result<Self, KernelError> {
        config.validate()?;
        if runner.chunk_size() == 0 {
            return Err(KernelError::InvalidArgument(
                "runner reports a zero chunk size".to_string(),
            ));
        }
        Ok(Self {
            config: Arc::new(config),
            runner,
        })
    }

    pub fn config(&self) -> &Arc<KernelConfig> {
        &self.config
    }

    pub fn runner(&self) -> &dyn ChunkRunner {
        self.runner.as_ref()
    }

    /// Counts the true bytes of a Bool mask.
    pub fn count_nonzero(&self, mask: &TypedBuffer<'_>) -> Result<usize, KernelError> {
        let bytes = bool_mask_bytes(mask)?;
        Ok(kernels::count_nonzero_with(bytes, self.config.simd))
    }

    /// Selects the elements of `values` whose mask byte is nonzero.
    pub fn compact(
        &self,
        values: &TypedBuffer<'_>,
        mask: &TypedBuffer<'_>,
    ) -> Result<OwnedBuffer, KernelError> {
        debug!(
            "compact: {} x {} (stride {}), mask of {}",
            values.len(),
            values.kind(),
            values.stride(),
            mask.len()
        );
        kernels::compact(values, mask, self.runner(), self.config.simd)
    }

    /// Reads `values` at every index, substituting a default for indices out of range.
    pub fn gather(
        &self,
        values: &TypedBuffer<'_>,
        indices: &TypedBuffer<'_>,
        default: Option<&[u8]>,
    ) -> Result<OwnedBuffer, KernelError> {
        debug!(
            "gather: {} x {} from {} values of {} (default override: {})",
            indices.len(),
            indices.kind(),
            values.len(),
            values.kind(),
            default.is_some()
        );
        kernels::gather(values, indices, default, self.runner())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("chunk_size", &self.runner.chunk_size())
            .finish()
    }
}

fn bool_mask_bytes<'a>(mask: &TypedBuffer<'a>) -> Result<&'a [u8], KernelError> {
    if mask.kind() != ElementKind::Bool {
        return Err(KernelError::InvalidArgument(format!(
            "mask must be bool, got {}",
            mask.kind()
        )));
    }
    mask.contiguous_bytes().ok_or_else(|| {
        KernelError::InvalidArgument(format!(
            "mask must be contiguous, got stride {}",
            mask.stride()
        ))
    })
}
