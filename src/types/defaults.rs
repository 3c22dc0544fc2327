//! Canonical "invalid" values substituted by gather for out-of-range indices.
//!
//! This is a pure mapping from element kind to a byte pattern, computed on
//! demand. Nothing here is global or mutable.

use crate::error::KernelError;
use crate::types::ElementKind;
use crate::utils::typed_slice_to_bytes;

const F16_QUIET_NAN: u16 = 0x7E00;

/// Returns the canonical default for `kind`, exactly `kind.item_size()` bytes
/// in native byte order.
///
/// - signed integers: the most negative value
/// - unsigned integers: all bits set
/// - floats: quiet NaN (both parts for complex kinds)
/// - bool: zero
/// - text and opaque records: zero-filled
pub fn canonical_default(kind: ElementKind) -> Vec<u8> {
    match kind {
        ElementKind::Int8 => i8::MIN.to_ne_bytes().to_vec(),
        ElementKind::Int16 => i16::MIN.to_ne_bytes().to_vec(),
        ElementKind::Int32 => i32::MIN.to_ne_bytes().to_vec(),
        ElementKind::Int64 => i64::MIN.to_ne_bytes().to_vec(),
        ElementKind::UInt8 | ElementKind::UInt16 | ElementKind::UInt32 | ElementKind::UInt64 => {
            vec![0xFF; kind.item_size()]
        }
        ElementKind::Float16 => F16_QUIET_NAN.to_ne_bytes().to_vec(),
        ElementKind::Float32 => f32::NAN.to_ne_bytes().to_vec(),
        ElementKind::Float64 => f64::NAN.to_ne_bytes().to_vec(),
        ElementKind::Complex64 => typed_slice_to_bytes(&[f32::NAN, f32::NAN]),
        ElementKind::Complex128 => typed_slice_to_bytes(&[f64::NAN, f64::NAN]),
        ElementKind::Bool
        | ElementKind::Bytes(_)
        | ElementKind::Unicode(_)
        | ElementKind::Opaque(_) => vec![0; kind.item_size()],
    }
}

/// Resolves the default scalar for one gather: the caller's override if
/// given, otherwise the canonical default for `kind`.
pub fn resolve_default(
    kind: ElementKind,
    override_bytes: Option<&[u8]>,
) -> Result<Vec<u8>, KernelError> {
    match override_bytes {
        None => Ok(canonical_default(kind)),
        Some(bytes) if bytes.len() == kind.item_size() => Ok(bytes.to_vec()),
        Some(bytes) => Err(KernelError::InvalidArgument(format!(
            "default value for {} must be {} bytes, got {}",
            kind,
            kind.item_size(),
            bytes.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sizes_match_kinds() {
        for kind in [
            ElementKind::Bool,
            ElementKind::Int8,
            ElementKind::Int64,
            ElementKind::UInt32,
            ElementKind::Float16,
            ElementKind::Complex128,
            ElementKind::Bytes(5),
            ElementKind::Unicode(3),
        ] {
            assert_eq!(canonical_default(kind).len(), kind.item_size(), "{}", kind);
        }
    }

    #[test]
    fn test_signed_defaults_are_most_negative() {
        let bytes = canonical_default(ElementKind::Int32);
        assert_eq!(i32::from_ne_bytes(bytes.try_into().unwrap()), i32::MIN);
        assert_eq!(canonical_default(ElementKind::Int8), vec![0x80]);
    }

    #[test]
    fn test_unsigned_defaults_are_all_ones() {
        let bytes = canonical_default(ElementKind::UInt16);
        assert_eq!(u16::from_ne_bytes(bytes.try_into().unwrap()), u16::MAX);
    }

    #[test]
    fn test_float_defaults_are_nan() {
        let bytes = canonical_default(ElementKind::Float64);
        assert!(f64::from_ne_bytes(bytes.try_into().unwrap()).is_nan());

        let bytes = canonical_default(ElementKind::Complex64);
        let parts: Vec<f32> = bytemuck::pod_collect_to_vec(&bytes);
        assert!(parts.iter().all(|p| p.is_nan()));
    }

    #[test]
    fn test_bool_and_text_defaults_are_zero() {
        assert_eq!(canonical_default(ElementKind::Bool), vec![0]);
        assert_eq!(canonical_default(ElementKind::Bytes(4)), vec![0; 4]);
    }

    #[test]
    fn test_override_must_match_item_size() {
        let ok = resolve_default(ElementKind::Int16, Some(&7i16.to_ne_bytes())).unwrap();
        assert_eq!(ok, 7i16.to_ne_bytes().to_vec());

        let bad = resolve_default(ElementKind::Int16, Some(&[1, 2, 3]));
        assert!(matches!(bad, Err(KernelError::InvalidArgument(_))));
    }
}
