//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate event log and replay calls into replica-level APIs.
//! - Keep CLI and host layers decoupled from storage details.

pub mod replay_service;
