//! `notify`-backed implementation of the [`WatchService`] collaborator.
//!
//! Each subscription watches the target's parent directory non-recursively
//! and filters events down to the subscribed path, delivering
//! `(path, exists)` to the callback. Existence is re-checked at delivery
//! time, so a rapid delete/recreate pair still reports current state.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::warn;

use personalize_core::{PersonalizeError, Result, WatchCallback, WatchHandle, WatchService};

#[derive(Default)]
struct Inner {
    next_handle: u64,
    /// Held to keep the watchers alive; dropping one stops its thread.
    watchers: HashMap<u64, RecommendedWatcher>,
}

/// Filesystem watch service built on `notify`'s recommended watcher.
#[derive(Default)]
pub struct FsWatchService {
    inner: Mutex<Inner>,
}

impl FsWatchService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WatchService for FsWatchService {
    fn subscribe(&self, path: &Path, callback: WatchCallback) -> Result<WatchHandle> {
        let target = path.to_path_buf();
        let parent = target
            .parent()
            .ok_or_else(|| {
                PersonalizeError::Watch(format!("no parent directory for {}", target.display()))
            })?
            .to_path_buf();

        let filter_target = target.clone();
        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => {
                    for event_path in &event.paths {
                        if event_path == &filter_target {
                            callback(event_path, event_path.exists());
                            break;
                        }
                    }
                }
                Err(e) => warn!(error = %e, "filesystem watcher error"),
            },
        )
        .map_err(|e| PersonalizeError::Watch(e.to_string()))?;

        watcher
            .watch(&parent, RecursiveMode::NonRecursive)
            .map_err(|e| PersonalizeError::Watch(e.to_string()))?;

        let mut inner = self.inner.lock().expect("watch service lock poisoned");
        let id = inner.next_handle;
        inner.next_handle += 1;
        inner.watchers.insert(id, watcher);
        Ok(WatchHandle(id))
    }

    fn unsubscribe(&self, handle: WatchHandle) -> Result<()> {
        let mut inner = self.inner.lock().expect("watch service lock poisoned");
        inner
            .watchers
            .remove(&handle.0)
            .map(|_| ())
            .ok_or_else(|| PersonalizeError::Watch(format!("unknown watch handle {:?}", handle)))
    }
}
