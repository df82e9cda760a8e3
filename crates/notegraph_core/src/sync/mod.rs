//! Event-sourced state reconstruction.
//!
//! # Responsibility
//! - Order event batches causally and deterministically.
//! - Fold per-event reducers over a cloned snapshot.
//! - Detect concurrent edits and keep a conflict backlog.
//!
//! # Invariants
//! - Replays are pure, synchronous and single-threaded.
//! - Any permutation of the same event set converges to the same snapshot.

pub mod causal;
pub mod clock;
pub mod conflict;
pub mod engine;
pub mod reducer;
