//! Domain model for event-sourced note state.
//!
//! # Responsibility
//! - Define notes, links, tag schemas and the events that mutate them.
//! - Keep wire shapes (camelCase JSON) next to the types they describe.
//!
//! # Invariants
//! - Entities are identified by stable string ids that never change.
//! - Deletion removes an entity outright; tombstones belong to the log layer.

pub mod event;
pub mod fingerprint;
pub mod note;
pub mod state;
pub mod supertag;
