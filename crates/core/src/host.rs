//! Collaborator traits at the boundary with the host application.
//!
//! The engine never talks to the host directly; it consumes these four
//! interfaces:
//! - [`Registry`] — source of base collection/rule data and match predicates
//! - [`WatchService`] — file-change notifications, at-least-once, duplicates
//!   possible
//! - [`EnableFlag`] — the boolean setting gating the whole engine
//! - [`NotificationSink`] — fire-and-forget user-visible messages
//!
//! All traits are synchronous: the engine is purely reactive and runs every
//! pass to completion on the caller's thread under a single lock.

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::Result;
use crate::namespace::NamespacePath;

/// The host's declaration registry, queried for unmodified base data.
///
/// Freshness is best-effort: the host's own file-update and registry-refresh
/// ordering is not synchronized with watch notifications, so the data
/// returned here may still reflect pre-change content at the instant a
/// reload runs. Documented race, not worked around.
pub trait Registry: Send + Sync {
    /// Base key→value pairs of a named list collection, in the host's
    /// declaration order. `None` if the collection is not declared.
    fn base_list_collection(&self, name: &str) -> Option<IndexMap<String, String>>;

    /// Base rule-text → implementation-text map of a command context.
    /// `None` if the namespace declares no commands.
    fn base_command_rules(&self, namespace: &NamespacePath) -> Option<IndexMap<String, String>>;

    /// The context's original match predicate text.
    fn match_predicate(&self, namespace: &NamespacePath) -> Option<String>;

    /// Auxiliary tag declarations carried by the context, reproduced
    /// verbatim in command-mode artifacts.
    fn context_tags(&self, namespace: &NamespacePath) -> Vec<String>;
}

/// Callback invoked by the watch service with `(path, exists)`.
pub type WatchCallback = Arc<dyn Fn(&Path, bool) + Send + Sync>;

/// Opaque subscription handle returned by [`WatchService::subscribe`].
///
/// Unsubscription requires the handle, never callback identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchHandle(pub u64);

/// The host's file-watch primitive.
///
/// Delivery is at-least-once and may be duplicated or reordered; callers
/// de-duplicate on their side (the coordinator keys on modification times).
pub trait WatchService: Send + Sync {
    /// Start watching `path`. The callback may fire on the host's threads.
    fn subscribe(&self, path: &Path, callback: WatchCallback) -> Result<WatchHandle>;

    /// Stop a subscription previously returned by [`subscribe`](Self::subscribe).
    fn unsubscribe(&self, handle: WatchHandle) -> Result<()>;
}

/// The boolean setting that turns personalization on and off.
///
/// Change notification arrives by the host invoking the orchestrator's
/// flag-change entry point; this trait only exposes the current value.
pub trait EnableFlag: Send + Sync {
    fn enabled(&self) -> bool;
}

/// Fire-and-forget user-visible message channel.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, message: &str);
}
