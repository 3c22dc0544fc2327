// In: src/kernels/gather.rs

//! This module contains the indexed gather kernel.
//!
//! For every position `k` of an index buffer, the output holds the value the
//! index selects, or a default scalar when the index is out of range. Whether
//! an index is in range is decided by `GatherIndex::resolve`, so signed index
//! buffers wrap negative indices to the end while unsigned ones do not.
//!
//! The concrete inner loop is picked once per call from `GATHER_TABLE`, keyed
//! by the index kind and the value element size. Sizes of 1, 2, 4, 8 and 16
//! bytes get a typed loop; every other size gets the variable-width loop. Each
//! loop has a contiguous fast path and a strided path.

use bytemuck::Pod;
use log::trace;

use crate::error::KernelError;
use crate::kernels::copy_bytes;
use crate::runtime::{run_or_inline, ChunkRunner};
use crate::traits::GatherIndex;
use crate::types::{resolve_default, ElementKind, OwnedBuffer, TypedBuffer};
use crate::utils::{try_alloc_output, DisjointOut};

/// Per-call context shared by every chunk.
pub(crate) struct GatherJob<'a> {
    values: TypedBuffer<'a>,
    indices: TypedBuffer<'a>,
    default: &'a [u8],
    out: DisjointOut<'a, u8>,
}

/// A specialized inner loop. Fills output positions `[start, start + len)`.
type GatherFn = unsafe fn(&GatherJob<'_>, usize, usize);

//==================================================================================
// 1. Inner Loops
//==================================================================================

/// Fixed-width loop: values move as one `V` load/store.
///
/// # Safety
/// `[start, start + len)` must lie within the index buffer, `size_of::<V>()`
/// must equal the value item size, and no other thread may write the range.
unsafe fn gather_fixed<V: Pod, I: GatherIndex>(job: &GatherJob<'_>, start: usize, len: usize) {
    let default = (job.default.as_ptr() as *const V).read_unaligned();
    let value_len = job.values.len();
    let base = job.values.as_ptr();
    let mut dst = job.out.ptr_at(start * std::mem::size_of::<V>()) as *mut V;
    let end = dst.add(len);

    if job.values.is_contiguous() && job.indices.is_contiguous() {
        let src = base as *const V;
        let mut idx = (job.indices.as_ptr() as *const I).add(start);
        while dst != end {
            let value = match idx.read_unaligned().resolve(value_len) {
                Some(i) => src.add(i).read_unaligned(),
                None => default,
            };
            dst.write_unaligned(value);
            idx = idx.add(1);
            dst = dst.add(1);
        }
    } else {
        let value_stride = job.values.stride();
        let index_stride = job.indices.stride();
        let mut idx = job.indices.as_ptr().wrapping_add(start * index_stride);
        while dst != end {
            let value = match (idx as *const I).read_unaligned().resolve(value_len) {
                Some(i) => (base.add(i * value_stride) as *const V).read_unaligned(),
                None => default,
            };
            dst.write_unaligned(value);
            idx = idx.wrapping_add(index_stride);
            dst = dst.add(1);
        }
    }
}

/// Variable-width loop: each value is copied as 8-byte words plus a remainder.
///
/// # Safety
/// As for `gather_fixed`.
unsafe fn gather_variable<I: GatherIndex>(job: &GatherJob<'_>, start: usize, len: usize) {
    let item_size = job.values.item_size();
    let value_len = job.values.len();
    let value_stride = job.values.stride();
    let index_stride = job.indices.stride();
    let base = job.values.as_ptr();

    let mut idx = job.indices.as_ptr().wrapping_add(start * index_stride);
    let mut dst = job.out.ptr_at(start * item_size);
    for _ in 0..len {
        let src = match (idx as *const I).read_unaligned().resolve(value_len) {
            Some(i) => base.add(i * value_stride),
            None => job.default.as_ptr(),
        };
        copy_bytes(src, dst, item_size);
        idx = idx.wrapping_add(index_stride);
        dst = dst.add(item_size);
    }
}

//==================================================================================
// 2. Dispatch Table
//==================================================================================

/// Column of `GATHER_TABLE` for a value element size.
fn value_column(item_size: usize) -> usize {
    match item_size {
        1 => 0,
        2 => 1,
        4 => 2,
        8 => 3,
        16 => 4,
        _ => 5,
    }
}

macro_rules! gather_row {
    ($I:ty) => {
        (
            <$I as GatherIndex>::KIND,
            [
                gather_fixed::<u8, $I> as GatherFn,
                gather_fixed::<u16, $I>,
                gather_fixed::<u32, $I>,
                gather_fixed::<u64, $I>,
                gather_fixed::<u128, $I>,
                gather_variable::<$I>,
            ],
        )
    };
}

/// One row per index kind, one column per value size bucket.
static GATHER_TABLE: [(ElementKind, [GatherFn; 6]); 8] = [
    gather_row!(i8),
    gather_row!(u8),
    gather_row!(i16),
    gather_row!(u16),
    gather_row!(i32),
    gather_row!(u32),
    gather_row!(i64),
    gather_row!(u64),
];

fn select_kernel(index_kind: ElementKind, item_size: usize) -> Result<GatherFn, KernelError> {
    GATHER_TABLE
        .iter()
        .find(|(kind, _)| *kind == index_kind)
        .map(|(_, row)| row[value_column(item_size)])
        .ok_or_else(|| {
            KernelError::UnsupportedType(format!(
                "cannot gather {}-byte values with {} indices (signed: {}); expected an integer index kind",
                item_size,
                index_kind,
                index_kind.is_signed_int()
            ))
        })
}

//==================================================================================
// 3. Public API
//==================================================================================

/// Gathers `values[indices[k]]` for every `k`, substituting a default for
/// out-of-range indices.
///
/// `default_override` must be exactly one value element; `None` uses the
/// canonical default for the value kind. The output has `indices.len()`
/// elements of the value kind, and position `k` always holds the result for
/// `indices[k]`.
pub fn gather(
    values: &TypedBuffer<'_>,
    indices: &TypedBuffer<'_>,
    default_override: Option<&[u8]>,
    runner: &dyn ChunkRunner,
) -> Result<OwnedBuffer, KernelError> {
    let kernel = select_kernel(indices.kind(), values.item_size())?;
    let default = resolve_default(values.kind(), default_override)?;
    let mut data = try_alloc_output(indices.len(), values.item_size())?;

    if !indices.is_empty() {
        let job = GatherJob {
            values: *values,
            indices: *indices,
            default: &default,
            out: DisjointOut::new(&mut data),
        };
        let parallel = run_or_inline(runner, indices.len(), &|start, len| {
            // SAFETY: `run_or_inline` only passes in-bounds grid chunks or the
            // whole range, each once, and output position k is owned by
            // whoever processes index k.
            unsafe { kernel(&job, start, len) };
            true
        })?;
        trace!("gathered {} elements, parallel={}", indices.len(), parallel);
        log_metric!(
            "event" = "gather",
            "len" = indices.len(),
            "index_kind" = indices.kind(),
            "item_size" = values.item_size(),
            "parallel" = parallel
        );
    }

    Ok(OwnedBuffer::new(data, indices.len(), values.kind()))
}

//==================================================================================
// 4. Unit Tests
//==================================================================================
