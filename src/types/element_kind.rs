//! This module defines the canonical element type tag carried by every
//! buffer view handed to the kernels.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::KernelError;

/// The element type of a flat buffer, as marshalled by the host runtime.
///
/// Fixed-width text and opaque records carry their width: `Bytes(n)` is `n`
/// single-byte characters, `Unicode(n)` is `n` UCS-4 code points (4·n bytes),
/// `Opaque(n)` is an `n`-byte record.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementKind {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float16,
    Float32,
    Float64,
    Complex64,
    Complex128,
    Bytes(usize),
    Unicode(usize),
    Opaque(usize),
}

impl ElementKind {
    /// The size in bytes of one element of this kind.
    pub fn item_size(&self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 | Self::Float16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 | Self::Complex64 => 8,
            Self::Complex128 => 16,
            Self::Bytes(n) | Self::Opaque(n) => *n,
            Self::Unicode(n) => n.saturating_mul(4),
        }
    }

    /// Returns `true` if the kind is a signed integer.
    pub fn is_signed_int(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    /// Returns `true` if the kind is an unsigned integer.
    pub fn is_unsigned_int(&self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }

    /// Returns `true` if the kind is a real or complex floating-point number.
    pub fn is_float(&self) -> bool {
        matches!(
            self,
            Self::Float16 | Self::Float32 | Self::Float64 | Self::Complex64 | Self::Complex128
        )
    }

    /// Returns `true` for fixed-width text and opaque records.
    pub fn is_flexible(&self) -> bool {
        matches!(self, Self::Bytes(_) | Self::Unicode(_) | Self::Opaque(_))
    }

    /// Maps a host type name (e.g. `"int64"`, `"S12"`, `"V24"`) to a kind.
    pub fn from_type_name(name: &str) -> Result<Self, KernelError> {
        let kind = match name {
            "bool" => Self::Bool,
            "int8" => Self::Int8,
            "int16" => Self::Int16,
            "int32" => Self::Int32,
            "int64" => Self::Int64,
            "uint8" => Self::UInt8,
            "uint16" => Self::UInt16,
            "uint32" => Self::UInt32,
            "uint64" => Self::UInt64,
            "float16" => Self::Float16,
            "float32" => Self::Float32,
            "float64" => Self::Float64,
            "complex64" => Self::Complex64,
            "complex128" => Self::Complex128,
            other => {
                let mut chars = other.chars();
                let prefix = chars.next();
                let width: usize = chars.as_str().parse().map_err(|_| {
                    KernelError::UnsupportedType(format!("Unknown element type name '{}'", name))
                })?;
                match prefix {
                    Some('S') => Self::Bytes(width),
                    Some('U') if width.checked_mul(4).is_some() => Self::Unicode(width),
                    Some('V') => Self::Opaque(width),
                    _ => {
                        return Err(KernelError::UnsupportedType(format!(
                            "Unknown element type name '{}'",
                            name
                        )))
                    }
                }
            }
        };
        Ok(kind)
    }
}

/// Provides the canonical string representation for an `ElementKind`.
impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(n) => write!(f, "S{}", n),
            Self::Unicode(n) => write!(f, "U{}", n),
            Self::Opaque(n) => write!(f, "V{}", n),
            other => write!(f, "{}", format!("{:?}", other).to_lowercase()),
        }
    }
}
