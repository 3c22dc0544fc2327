//! Bounds-carrying views over flat memory, and the owned buffer every kernel
//! returns.
//!
//! `TypedBuffer` borrows caller-owned storage for the duration of one
//! operation. All validation (item size, stride, reach of the last element)
//! happens in the constructors, so kernels can step raw pointers inside their
//! innermost loops without re-checking bounds.

use bytemuck::Pod;
use std::marker::PhantomData;

use crate::error::KernelError;
use crate::types::ElementKind;
use crate::utils::safe_bytes_to_typed_slice;

//==================================================================================
// 1. Borrowed View
//==================================================================================

/// A read-only view of `len` elements of `kind`, `stride` bytes apart.
///
/// `stride == item_size` denotes a contiguous view; any other stride
/// (including zero, which repeats the first element) is a strided view.
#[derive(Clone, Copy, Debug)]
pub struct TypedBuffer<'a> {
    data: *const u8,
    len: usize,
    item_size: usize,
    stride: usize,
    kind: ElementKind,
    _marker: PhantomData<&'a [u8]>,
}

// SAFETY: a `TypedBuffer` is a shared borrow of immutable bytes.
unsafe impl Send for TypedBuffer<'_> {}
unsafe impl Sync for TypedBuffer<'_> {}

impl<'a> TypedBuffer<'a> {
    /// Views a typed slice. `T` must have the same size as one `kind` element.
    pub fn from_slice<T: Pod>(values: &'a [T], kind: ElementKind) -> Result<Self, KernelError> {
        let item_size = checked_item_size(kind)?;
        if std::mem::size_of::<T>() != item_size {
            return Err(KernelError::InvalidArgument(format!(
                "{} elements are {} bytes, but {} is {} bytes",
                kind,
                item_size,
                std::any::type_name::<T>(),
                std::mem::size_of::<T>()
            )));
        }
        Ok(Self::new_unchecked(
            values.as_ptr() as *const u8,
            values.len(),
            item_size,
            item_size,
            kind,
        ))
    }

    /// Views a contiguous byte slice as elements of `kind`.
    pub fn from_bytes(bytes: &'a [u8], kind: ElementKind) -> Result<Self, KernelError> {
        let item_size = checked_item_size(kind)?;
        if bytes.len() % item_size != 0 {
            return Err(KernelError::BufferMismatch(bytes.len(), item_size));
        }
        Ok(Self::new_unchecked(
            bytes.as_ptr(),
            bytes.len() / item_size,
            item_size,
            item_size,
            kind,
        ))
    }

    /// Views `len` elements of `kind` starting at `bytes[0]`, `stride` bytes apart.
    pub fn strided(
        bytes: &'a [u8],
        len: usize,
        stride: usize,
        kind: ElementKind,
    ) -> Result<Self, KernelError> {
        let item_size = checked_item_size(kind)?;
        if len > 0 {
            let reach = (len - 1)
                .checked_mul(stride)
                .and_then(|last| last.checked_add(item_size));
            match reach {
                Some(reach) if reach <= bytes.len() => {}
                _ => {
                    return Err(KernelError::InvalidArgument(format!(
                        "strided view of {} x {} (stride {}) exceeds the {}-byte backing buffer",
                        len,
                        kind,
                        stride,
                        bytes.len()
                    )))
                }
            }
        }
        Ok(Self::new_unchecked(bytes.as_ptr(), len, item_size, stride, kind))
    }

    /// Builds a view from raw parts supplied by a host adapter.
    ///
    /// # Safety
    /// For every `i < len`, the `item_size` bytes at `data + i * stride` must
    /// be readable and unmodified for the lifetime `'a`. `item_size` must
    /// equal `kind.item_size()`.
    pub unsafe fn from_raw_parts(
        data: *const u8,
        len: usize,
        stride: usize,
        kind: ElementKind,
    ) -> Result<Self, KernelError> {
        let item_size = checked_item_size(kind)?;
        if data.is_null() && len > 0 {
            return Err(KernelError::InvalidArgument(
                "null data pointer for a non-empty view".to_string(),
            ));
        }
        Ok(Self::new_unchecked(data, len, item_size, stride, kind))
    }

    fn new_unchecked(
        data: *const u8,
        len: usize,
        item_size: usize,
        stride: usize,
        kind: ElementKind,
    ) -> Self {
        Self {
            data,
            len,
            item_size,
            stride,
            kind,
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn item_size(&self) -> usize {
        self.item_size
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn is_contiguous(&self) -> bool {
        self.stride == self.item_size
    }

    pub(crate) fn as_ptr(&self) -> *const u8 {
        self.data
    }

    /// The bytes of element `index`, or `None` past the end.
    pub fn element(&self, index: usize) -> Option<&'a [u8]> {
        if index >= self.len {
            return None;
        }
        // SAFETY: the constructors guarantee every in-range element is readable.
        unsafe {
            Some(std::slice::from_raw_parts(
                self.data.add(index * self.stride),
                self.item_size,
            ))
        }
    }

    /// The whole contiguous view as one byte slice.
    pub fn contiguous_bytes(&self) -> Option<&'a [u8]> {
        if !self.is_contiguous() {
            return None;
        }
        if self.len == 0 {
            return Some(&[]);
        }
        // SAFETY: a contiguous view covers exactly `len * item_size` readable bytes.
        unsafe {
            Some(std::slice::from_raw_parts(
                self.data,
                self.len * self.item_size,
            ))
        }
    }
}

fn checked_item_size(kind: ElementKind) -> Result<usize, KernelError> {
    match kind.item_size() {
        0 => Err(KernelError::InvalidArgument(format!(
            "element kind {} has a zero item size",
            kind
        ))),
        usize::MAX => Err(KernelError::InvalidArgument(format!(
            "element kind {} has an item size that overflows",
            kind
        ))),
        n => Ok(n),
    }
}

//==================================================================================
// 2. Owned Result
//==================================================================================

/// A freshly allocated, always-contiguous kernel result. Ownership passes to
/// the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedBuffer {
    data: Vec<u8>,
    len: usize,
    item_size: usize,
    kind: ElementKind,
}

impl OwnedBuffer {
    pub(crate) fn new(data: Vec<u8>, len: usize, kind: ElementKind) -> Self {
        let item_size = kind.item_size();
        debug_assert_eq!(data.len(), len * item_size);
        Self {
            data,
            len,
            item_size,
            kind,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn item_size(&self) -> usize {
        self.item_size
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Re-borrows the result as an input view for a follow-up kernel.
    pub fn as_view(&self) -> TypedBuffer<'_> {
        TypedBuffer::new_unchecked(
            self.data.as_ptr(),
            self.len,
            self.item_size,
            self.item_size,
            self.kind,
        )
    }

    /// Borrows the result as typed values without copying.
    ///
    /// Fails with `PodCast` if the allocation happens not to be aligned for `T`;
    /// `to_vec` never has that restriction.
    pub fn as_typed<T: Pod>(&self) -> Result<&[T], KernelError> {
        if std::mem::size_of::<T>() != self.item_size {
            return Err(KernelError::BufferMismatch(
                self.item_size,
                std::mem::size_of::<T>(),
            ));
        }
        safe_bytes_to_typed_slice(&self.data)
    }

    /// Copies the result out as typed values. Alignment-safe.
    pub fn to_vec<T: Pod>(&self) -> Result<Vec<T>, KernelError> {
        if std::mem::size_of::<T>() != self.item_size {
            return Err(KernelError::BufferMismatch(
                self.item_size,
                std::mem::size_of::<T>(),
            ));
        }
        Ok(bytemuck::pod_collect_to_vec(&self.data))
    }
}
