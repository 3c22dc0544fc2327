// In: src/error.rs

//! This module defines the single, unified error type for the fastloops kernels.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.
//!
//! Every variant is raised before a parallel phase starts. Once chunks are
//! dispatched, no worker can fail.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KernelError {
    // =========================================================================
    // === Input Errors (rejected before any work begins)
    // =========================================================================
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unsupported type combination: {0}")]
    UnsupportedType(String),

    #[error("Out of memory: failed to allocate {bytes} bytes for the output buffer")]
    OutOfMemory { bytes: usize },

    #[error("Buffer length mismatch: expected a multiple of {1}, got {0}")]
    BufferMismatch(usize, usize),

    // =========================================================================
    // === External Error Wrappers
    // =========================================================================
    /// An error from a safe byte-casting operation failing.
    #[error("Byte slice casting error: {0}")]
    PodCast(String), // bytemuck::PodCastError doesn't impl Error

    /// A configuration document could not be parsed.
    #[error("Configuration parse error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Internal logic error (this is a bug): {0}")]
    InternalError(String),
}

// =============================================================================
// === Manual `From` Implementations ===
// =============================================================================

impl From<bytemuck::PodCastError> for KernelError {
    fn from(err: bytemuck::PodCastError) -> Self {
        KernelError::PodCast(err.to_string())
    }
}
