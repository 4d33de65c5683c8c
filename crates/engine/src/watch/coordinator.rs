//! Subscription table and duplicate suppression.
//!
//! The host's watch primitive delivers at-least-once and may repeat or
//! reorder notifications. Every subscribed path carries the modification
//! time last acted upon; a notification whose stat matches it is discarded.
//! When the config root itself disappears the coordinator drops the
//! subscriptions beneath it but keeps the root's own, which lives on the
//! parent directory and still fires when the root reappears.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use personalize_core::{Result, WatchCallback, WatchHandle, WatchService};

fn mod_time(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

/// Manages `(path → handle, last-seen mtime)` state for the engine's single
/// watch callback. At most one subscription per path at any time.
pub struct WatchCoordinator {
    service: Arc<dyn WatchService>,
    subs: HashMap<PathBuf, WatchHandle>,
    last_seen: HashMap<PathBuf, DateTime<Utc>>,
    /// Set while the config root is gone; holds its parent for reporting.
    fallback: Option<PathBuf>,
}

impl WatchCoordinator {
    pub fn new(service: Arc<dyn WatchService>) -> Self {
        Self {
            service,
            subs: HashMap::new(),
            last_seen: HashMap::new(),
            fallback: None,
        }
    }

    /// Subscribe to a path; a no-op if already watched.
    ///
    /// The current modification time is recorded as last-seen, since the
    /// caller subscribes only after having processed the file's content.
    pub fn watch(&mut self, path: &Path, callback: &WatchCallback) -> Result<()> {
        if self.subs.contains_key(path) {
            return Ok(());
        }
        let handle = self.service.subscribe(path, Arc::clone(callback))?;
        self.subs.insert(path.to_path_buf(), handle);
        if let Some(mtime) = mod_time(path) {
            self.last_seen.insert(path.to_path_buf(), mtime);
        }
        debug!(path = %path.display(), "watching");
        Ok(())
    }

    pub fn unwatch(&mut self, path: &Path) {
        if let Some(handle) = self.subs.remove(path) {
            if let Err(e) = self.service.unsubscribe(handle) {
                warn!(path = %path.display(), error = %e, "failed to unsubscribe");
            }
        }
        self.last_seen.remove(path);
    }

    pub fn unwatch_all(&mut self) {
        let paths: Vec<PathBuf> = self.subs.keys().cloned().collect();
        for path in paths {
            self.unwatch(&path);
        }
        self.clear_fallback();
    }

    /// Reconcile the subscription table with the desired path set:
    /// drop stale subscriptions, add missing ones.
    pub fn sync(&mut self, desired: &[PathBuf], callback: &WatchCallback) {
        let stale: Vec<PathBuf> = self
            .subs
            .keys()
            .filter(|p| !desired.contains(p))
            .cloned()
            .collect();
        for path in stale {
            self.unwatch(&path);
        }
        for path in desired {
            if let Err(e) = self.watch(path, callback) {
                warn!(path = %path.display(), error = %e, "failed to watch");
            }
        }
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.subs.contains_key(path)
    }

    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.subs.keys().cloned().collect()
    }

    /// Duplicate suppression: decide whether a notification represents a
    /// change not yet acted upon, updating the last-seen table if so.
    pub fn should_process(&mut self, path: &Path, exists: bool) -> bool {
        if !exists {
            self.last_seen.remove(path);
            return true;
        }
        match mod_time(path) {
            // vanished between the notification and our stat; let the
            // handler re-evaluate against current state
            None => {
                self.last_seen.remove(path);
                true
            }
            Some(mtime) => {
                if self.last_seen.get(path) == Some(&mtime) {
                    debug!(path = %path.display(), "discarding duplicate notification");
                    false
                } else {
                    self.last_seen.insert(path.to_path_buf(), mtime);
                    true
                }
            }
        }
    }

    // ── Config-root fallback ────────────────────────────────────────

    /// The config root disappeared: drop every subscription beneath it but
    /// keep (or re-create) the root's own subscription.
    ///
    /// A subscription is implemented by watching the path's parent directory
    /// and filtering events to the path, so the root's subscription survives
    /// the deletion and fires again when the root is recreated.
    pub fn root_vanished(&mut self, config_root: &Path, callback: &WatchCallback) -> Result<()> {
        let doomed: Vec<PathBuf> = self
            .subs
            .keys()
            .filter(|p| p.starts_with(config_root) && p.as_path() != config_root)
            .cloned()
            .collect();
        for path in doomed {
            self.unwatch(&path);
        }
        self.watch(config_root, callback)?;
        if self.fallback.is_none() {
            if let Some(parent) = config_root.parent() {
                self.fallback = Some(parent.to_path_buf());
                warn!(
                    root = %config_root.display(),
                    parent = %parent.display(),
                    "config root vanished, awaiting reappearance"
                );
            }
        }
        Ok(())
    }

    pub fn fallback_path(&self) -> Option<&Path> {
        self.fallback.as_deref()
    }

    pub fn clear_fallback(&mut self) {
        self.fallback = None;
    }
}
