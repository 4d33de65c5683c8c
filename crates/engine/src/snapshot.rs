//! JSON-snapshot [`Registry`] for running the engine outside the host.
//!
//! The worker binary cannot reach into a live host process, so it reads a
//! snapshot of the host's base data instead: list collections, command
//! contexts with their rules, match predicates, and declared tags, keyed by
//! collection name or namespace string. Lookups clone out of the snapshot;
//! the data is read once at startup and never refreshed.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use personalize_core::{NamespacePath, PersonalizeError, Registry, Result};

/// On-disk shape of a registry snapshot. Every section is optional.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// collection name → key→value pairs
    #[serde(default)]
    pub lists: IndexMap<String, IndexMap<String, String>>,
    /// namespace string → rule→implementation pairs
    #[serde(default)]
    pub commands: IndexMap<String, IndexMap<String, String>>,
    /// namespace string → match predicate text
    #[serde(default)]
    pub predicates: IndexMap<String, String>,
    /// namespace string → tags it declares
    #[serde(default)]
    pub tags: IndexMap<String, Vec<String>>,
}

/// Read-only registry backed by a [`Snapshot`] file.
#[derive(Debug, Default)]
pub struct SnapshotRegistry {
    snapshot: Snapshot,
}

impl SnapshotRegistry {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&text).map_err(|e| {
            PersonalizeError::Parse(format!(
                "invalid registry snapshot {}: {}",
                path.display(),
                e
            ))
        })?;
        info!(
            path = %path.display(),
            lists = snapshot.lists.len(),
            commands = snapshot.commands.len(),
            "loaded registry snapshot"
        );
        Ok(Self { snapshot })
    }

    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }
}

impl Registry for SnapshotRegistry {
    fn base_list_collection(&self, name: &str) -> Option<IndexMap<String, String>> {
        self.snapshot.lists.get(name).cloned()
    }

    fn base_command_rules(&self, namespace: &NamespacePath) -> Option<IndexMap<String, String>> {
        self.snapshot.commands.get(namespace.as_str()).cloned()
    }

    fn match_predicate(&self, namespace: &NamespacePath) -> Option<String> {
        self.snapshot.predicates.get(namespace.as_str()).cloned()
    }

    fn context_tags(&self, namespace: &NamespacePath) -> Vec<String> {
        self.snapshot
            .tags
            .get(namespace.as_str())
            .cloned()
            .unwrap_or_default()
    }
}
