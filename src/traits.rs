//! This module defines the traits shared across the gather kernels.
//!
//! An index element resolves itself against the length of the value array.
//! Which policy applies is fixed by the integer type, never by the runtime
//! value: signed types wrap negative indices to the end, unsigned types only
//! accept `index < len`.

use bytemuck::Pod;
use num_traits::AsPrimitive;

use crate::types::ElementKind;

/// An integer type usable as a gather index.
pub trait GatherIndex: Pod + Send + Sync {
    /// The element kind this type is declared as.
    const KIND: ElementKind;

    /// Resolves `self` against a value array of length `len`.
    /// Returns `None` when the default must be substituted.
    fn resolve(self, len: usize) -> Option<usize>;
}

/// Signed policy: valid iff `-len <= index < len`; negative indices map to `index + len`.
#[inline(always)]
fn resolve_signed(index: i64, len: usize) -> Option<usize> {
    // Slices never exceed isize::MAX bytes, so `len` fits in i64.
    let len = len as i64;
    if index >= 0 {
        (index < len).then_some(index as usize)
    } else {
        (index >= -len).then(|| (index + len) as usize)
    }
}

/// Unsigned policy: valid iff `index < len`.
#[inline(always)]
fn resolve_unsigned(index: u64, len: usize) -> Option<usize> {
    (index < len as u64).then_some(index as usize)
}

// Implement the trait for each signed/unsigned pair of index widths.
macro_rules! impl_gather_index_pair {
    ($S:ty, $SK:ident, $U:ty, $UK:ident) => {
        impl GatherIndex for $S {
            const KIND: ElementKind = ElementKind::$SK;

            #[inline(always)]
            fn resolve(self, len: usize) -> Option<usize> {
                resolve_signed(AsPrimitive::<i64>::as_(self), len)
            }
        }
        impl GatherIndex for $U {
            const KIND: ElementKind = ElementKind::$UK;

            #[inline(always)]
            fn resolve(self, len: usize) -> Option<usize> {
                resolve_unsigned(AsPrimitive::<u64>::as_(self), len)
            }
        }
    };
}

impl_gather_index_pair!(i8, Int8, u8, UInt8);
impl_gather_index_pair!(i16, Int16, u16, UInt16);
impl_gather_index_pair!(i32, Int32, u32, UInt32);
impl_gather_index_pair!(i64, Int64, u64, UInt64);
