//! This module provides a set of shared, low-level utility functions used
//! throughout the fastloops kernels.
//!
//! Its primary responsibilities include:
//! 1.  Providing safe, validated conversions between raw byte slices and typed slices.
//! 2.  Allocating output buffers fallibly, so an allocation failure surfaces as
//!     `KernelError::OutOfMemory` instead of aborting.
//! 3.  Encapsulating the one shared-mutable-pointer type that parallel chunk
//!     functions write through.

use std::marker::PhantomData;

use crate::error::KernelError;

//==================================================================================
// 1. Core Utility Functions
//==================================================================================

/// Safely reinterprets a byte slice as a slice of a plain-old-data type.
///
/// # Errors
/// Returns `KernelError::BufferMismatch` if the length is not a multiple of the
/// element size, or `KernelError::PodCast` if the slice is misaligned for `T`.
pub fn safe_bytes_to_typed_slice<T>(bytes: &[u8]) -> Result<&[T], KernelError>
where
    T: bytemuck::Pod,
{
    let size = std::mem::size_of::<T>();
    if size != 0 && bytes.len() % size != 0 {
        return Err(KernelError::BufferMismatch(bytes.len(), size));
    }
    Ok(bytemuck::try_cast_slice(bytes)?)
}

/// Converts a slice of plain-old-data values into an owned `Vec<u8>`.
pub fn typed_slice_to_bytes<T: bytemuck::Pod>(data: &[T]) -> Vec<u8> {
    bytemuck::cast_slice(data).to_vec()
}

/// Allocates a zero-filled output buffer of exactly `len * item_size` bytes.
///
/// Overflow of the byte count and allocator refusal are both reported as
/// `OutOfMemory`.
pub fn try_alloc_output(len: usize, item_size: usize) -> Result<Vec<u8>, KernelError> {
    let bytes = len.checked_mul(item_size).ok_or(KernelError::OutOfMemory {
        bytes: usize::MAX,
    })?;
    let mut buf: Vec<u8> = Vec::new();
    buf.try_reserve_exact(bytes)
        .map_err(|_| KernelError::OutOfMemory { bytes })?;
    buf.resize(bytes, 0);
    Ok(buf)
}

//==================================================================================
// 2. Disjoint Parallel Output
//==================================================================================

/// A raw pointer to the start of an output buffer that may be shared across
/// chunk workers.
///
/// Each worker writes only to a sub-range that no other worker touches (the
/// prefix-sum offsets for compaction, the chunk's own range for gather). That
/// invariant is the caller's obligation; this type only carries the pointer
/// across the `Sync` boundary.
#[derive(Clone, Copy)]
pub(crate) struct DisjointOut<'a, T> {
    ptr: *mut T,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

// SAFETY: writes through `DisjointOut` are confined to disjoint ranges by every
// caller, so concurrent use from several threads never aliases.
unsafe impl<T: Send> Send for DisjointOut<'_, T> {}
unsafe impl<T: Send> Sync for DisjointOut<'_, T> {}

impl<'a, T> DisjointOut<'a, T> {
    pub(crate) fn new(slice: &'a mut [T]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
            _marker: PhantomData,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Writes one element.
    ///
    /// # Safety
    /// `index < len`, and no other thread reads or writes `index` concurrently.
    #[inline]
    pub(crate) unsafe fn write(&self, index: usize, value: T) {
        debug_assert!(index < self.len());
        self.ptr.add(index).write(value);
    }

    /// Returns the raw pointer to element `index`.
    ///
    /// # Safety
    /// `index <= len`, and the range written through the pointer is owned by
    /// the calling worker alone.
    #[inline]
    pub(crate) unsafe fn ptr_at(&self, index: usize) -> *mut T {
        debug_assert!(index <= self.len());
        self.ptr.add(index)
    }
}
