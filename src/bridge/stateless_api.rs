// In: src/bridge/stateless_api.rs

use crate::bridge::Engine;
use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::kernels;
use crate::types::{OwnedBuffer, TypedBuffer};

/// Compacts `values` by a Bool `mask` with the default configuration.
pub fn compact(
    values: &TypedBuffer<'_>,
    mask: &TypedBuffer<'_>,
) -> Result<OwnedBuffer, KernelError> {
    // Since this is a stateless API, we don't have a user-provided config.
    let engine = Engine::new(KernelConfig::default())?;
    engine.compact(values, mask)
}

/// Gathers `values` at `indices` with the default configuration.
pub fn gather(
    values: &TypedBuffer<'_>,
    indices: &TypedBuffer<'_>,
    default: Option<&[u8]>,
) -> Result<OwnedBuffer, KernelError> {
    let engine = Engine::new(KernelConfig::default())?;
    engine.gather(values, indices, default)
}

/// Counts the nonzero bytes of a raw byte-boolean buffer.
pub fn count_nonzero(mask: &[u8]) -> usize {
    kernels::count_nonzero(mask)
}
