//! CSV-directive personalization engine.
//!
//! This crate provides:
//! - Control-file parsing for the four override actions (ADD, DELETE,
//!   REPLACE, REPLACE_KEY) across list and command categories
//! - A merge engine replaying directives over the host's base data
//! - Dotted-namespace ↔ filesystem path translation
//! - Idempotent purge-then-write artifact generation
//! - Watch-driven incremental reloads with duplicate suppression
//! - A JSON-snapshot registry and worker binary for standalone runs

pub mod artifact;
pub mod control;
pub mod csv;
pub mod merge;
pub mod orchestrator;
pub mod path;
pub mod snapshot;
pub mod store;
pub mod watch;

pub use orchestrator::{EngineState, ReloadOrchestrator};
