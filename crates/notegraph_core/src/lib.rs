//! Event-sourced state reconstruction for the note graph.
//!
//! Notes, typed links and SuperTag schemas are never stored directly: every
//! change is an immutable [`Event`], and the current snapshot is rebuilt by
//! replaying the log in causal order. This crate owns that replay plus the
//! logs it reads from.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sync;
pub mod vault;

pub use logging::{
    default_log_level, init_logging, logging_status, LoggingConfig, LoggingError,
};
pub use model::event::{ClockStamp, Event, EventId, EventPayload, EventType};
pub use model::fingerprint::Fingerprint;
pub use model::note::{Frontmatter, LinkDefinition, Note, NoteId};
pub use model::state::{NoteMap, SuperTagMap, VaultState};
pub use model::supertag::{AttributeDefinition, AttributeType, SuperTag, SuperTagId};
pub use repo::event_repo::{EventLog, LogError, LogResult, SqliteEventLog};
pub use service::replay_service::{ReplayService, ReplayServiceError};
pub use sync::causal::sort_events_causally;
pub use sync::clock::HybridClock;
pub use sync::conflict::{ConflictResolution, ConflictResult, ConflictType};
pub use sync::engine::{apply_events, ReplayOutcome, ReplayStats, SyncEngine, SyncStatus};
pub use sync::reducer::{apply_event, ApplyError, ApplyOutcome};
pub use vault::event_file::JsonlEventLog;
pub use vault::{init_vault, is_vault, VaultConfig, VaultError, VaultPaths};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
