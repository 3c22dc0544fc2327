// In: src/config.rs

//! The single source of truth for kernel execution settings.
//!
//! `KernelConfig` is created once at the application boundary (e.g. from a
//! host runtime's options or a JSON document) and then shared read-only
//! through an `Arc<KernelConfig>` by the `Engine` and its chunk runner.

use serde::{Deserialize, Serialize};

use crate::error::KernelError;

/// The mask walk consumes 8 bytes per word, so every chunk boundary must fall
/// on a multiple of this.
pub const MASK_WORD_BYTES: usize = 8;

//==================================================================================
// I. The Unified KernelConfig
//==================================================================================

/// Execution settings shared by every kernel dispatch.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct KernelConfig {
    /// **The number of elements per unit of parallel work.**
    /// Per-chunk counts, output offsets and gather ranges are all laid out on
    /// this grid. Must be a positive multiple of 8.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Inputs shorter than this run directly on the calling thread; the
    /// dispatch overhead is not worth paying for them.
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,

    /// If false, every kernel runs single-threaded.
    #[serde(default = "default_true")]
    pub threading: bool,

    /// Size of a dedicated worker pool. `None` shares rayon's global pool.
    #[serde(default)]
    pub num_threads: Option<usize>,

    /// If false, population counting always takes the portable scalar path,
    /// even on CPUs that support the vector path.
    #[serde(default = "default_true")]
    pub simd: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            parallel_threshold: default_parallel_threshold(),
            threading: true,
            num_threads: None,
            simd: true,
        }
    }
}

impl KernelConfig {
    /// A configuration that never leaves the calling thread.
    pub fn single_threaded() -> Self {
        Self {
            threading: false,
            ..Default::default()
        }
    }

    /// Parses a JSON document; absent fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, KernelError> {
        let config: KernelConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the kernels cannot honour.
    pub fn validate(&self) -> Result<(), KernelError> {
        if self.chunk_size == 0 || self.chunk_size % MASK_WORD_BYTES != 0 {
            return Err(KernelError::InvalidArgument(format!(
                "chunk_size must be a positive multiple of {}, got {}",
                MASK_WORD_BYTES, self.chunk_size
            )));
        }
        if self.num_threads == Some(0) {
            return Err(KernelError::InvalidArgument(
                "num_threads must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Helper for `serde` to default a boolean field to true.
fn default_true() -> bool {
    true
}

/// Helper for `serde` to provide a default for `chunk_size`.
fn default_chunk_size() -> usize {
    16_384
}

/// Helper for `serde` to provide a default for `parallel_threshold`.
fn default_parallel_threshold() -> usize {
    65_536
}
