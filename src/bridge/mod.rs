// In: src/bridge/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Bridge Layer
// ====================================================================================
//
// The `bridge` is the public-facing API of the fastloops library. It binds the pure
// kernels to an execution configuration so callers never wire runners by hand.
//
// Data Flow (Compaction):
//
//   1. [Stateful Facade (Engine)]          -> Receives `TypedBuffer` values + Bool mask
//         |
//         `-> a. `kernels::planner::plan`   : per-chunk counts -> exclusive prefix sums
//         |
//         `-> b. `kernels::compact`         : each chunk writes its own output region
//
//   2. [Owned Result (OwnedBuffer)]        -> Returned to the caller
//
// Data Flow (Gather):
//
//   1. [Stateful Facade (Engine)]          -> Receives values, indices, optional default
//         |
//         `-> `kernels::gather`             : dispatch table -> specialized loop per chunk
//
//   2. [Owned Result (OwnedBuffer)]        -> Returned to the caller
//
// The Stateless API builds a default `Engine` per call for hosts that do not keep one.
// ====================================================================================
pub mod engine;
pub mod stateless_api;

// --- High-Level Stateful API ---
pub use engine::Engine;

// --- Low-Level Stateless API ---
pub use stateless_api::{compact, count_nonzero, gather};

#[cfg(test)]
mod tests;
