//! Watch subscriptions: de-duplication, lifecycle, and the `notify` backend.
//!
//! The coordinator owns the subscription table and the last-seen
//! modification times used to suppress the host's duplicate notifications.
//! `FsWatchService` is the production [`WatchService`] implementation on top
//! of the `notify` crate; tests substitute an in-memory service.

mod coordinator;
mod fs;

pub use self::coordinator::WatchCoordinator;
pub use self::fs::FsWatchService;
