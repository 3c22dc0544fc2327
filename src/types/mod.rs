//! This module defines the core, strongly-typed data representations shared by
//! every kernel: the element type tag, borrowed buffer views, owned results,
//! and the canonical default-value mapping.

pub mod defaults;
pub mod element_kind;
pub mod typed_buffer;

// Re-export the main types for easier access.
pub use defaults::{canonical_default, resolve_default};
pub use element_kind::ElementKind;
pub use typed_buffer::{OwnedBuffer, TypedBuffer};
