//! Event log persistence.
//!
//! # Responsibility
//! - Define the append-only log contract consumed by replay services.
//! - Keep SQLite query details inside the persistence boundary.
//!
//! # Invariants
//! - Event ids are unique within one log.
//!
//! The JSON Lines backend lives next to the vault layout in
//! [`crate::vault::event_file`].

pub mod event_repo;
