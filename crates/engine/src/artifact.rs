//! Generated-artifact lifecycle: purge-then-write regeneration.
//!
//! One file per personalized namespace, mirroring its source location under
//! the generated root. Every artifact opens with a fixed disclaimer and a
//! match predicate conjoined with the enabling tag, so the host only loads
//! the overrides while personalization is switched on. Regeneration is
//! idempotent: unchanged state renders byte-identical output.
//!
//! Purging only ever touches files carrying the disclaimer marker; a
//! hand-made file sitting in the generated root is left alone and logged.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::WalkDir;

use personalize_core::config::Config;
use personalize_core::{NamespacePath, Registry, Result, ENABLE_TAG};

use crate::path::PathTranslator;
use crate::store::{OverrideRecord, OverrideStore};

/// First line of every file this engine owns.
pub const GENERATED_MARKER: &str = "# GENERATED BY PERSONALIZATION - DO NOT EDIT";

/// Name of the enabling-tag artifact at the generated root.
pub const ENABLE_TAG_FILE: &str = "personalization.tag";

/// Serializes override records into generated files.
pub struct ArtifactGenerator {
    translator: PathTranslator,
    generated_root: PathBuf,
}

impl ArtifactGenerator {
    pub fn new(config: &Config) -> Self {
        Self {
            translator: PathTranslator::new(config),
            generated_root: config.generated_root.clone(),
        }
    }

    /// Purge the artifacts of exactly `namespaces`, then rewrite each one
    /// whose record is non-empty. Empty or missing records simply produce no
    /// file (implicit deletion).
    pub fn regenerate(
        &self,
        registry: &dyn Registry,
        store: &OverrideStore,
        namespaces: &[NamespacePath],
    ) -> Result<()> {
        for ns in namespaces {
            self.purge_one(ns);
        }
        for ns in namespaces {
            let record = match store.get(ns) {
                Some(record) if !record.is_empty() => record,
                _ => continue,
            };
            match self.write_record(registry, record) {
                Ok(path) => {
                    info!(namespace = %ns, path = %path.display(), "wrote artifact");
                }
                Err(e) => {
                    warn!(namespace = %ns, error = %e, "failed to write artifact");
                }
            }
        }
        Ok(())
    }

    /// Remove every engine-owned file under the generated root, then drop
    /// now-empty directories. Used on disable and ahead of a full rebuild.
    pub fn purge_all(&self) {
        if !self.generated_root.exists() {
            return;
        }
        for entry in WalkDir::new(&self.generated_root)
            .contents_first(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if entry.file_type().is_file() {
                self.remove_if_generated(path);
            } else if entry.file_type().is_dir() && path != self.generated_root {
                // only empty directories fall to this
                let _ = fs::remove_dir(path);
            }
        }
    }

    fn purge_one(&self, ns: &NamespacePath) {
        match self.translator.generated_path(ns) {
            Ok(path) => self.remove_if_generated(&path),
            Err(e) => warn!(namespace = %ns, error = %e, "cannot resolve artifact path for purge"),
        }
    }

    fn remove_if_generated(&self, path: &Path) {
        if !path.is_file() {
            return;
        }
        match fs::read_to_string(path) {
            Ok(contents) if contents.starts_with(GENERATED_MARKER) => {
                if let Err(e) = fs::remove_file(path) {
                    warn!(path = %path.display(), error = %e, "failed to purge artifact");
                } else {
                    self.prune_empty_parents(path);
                }
            }
            Ok(_) => {
                warn!(path = %path.display(), "refusing to purge file without generated marker");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read file during purge");
            }
        }
    }

    fn prune_empty_parents(&self, path: &Path) {
        let mut dir = path.parent();
        while let Some(d) = dir {
            if d == self.generated_root || fs::remove_dir(d).is_err() {
                break;
            }
            dir = d.parent();
        }
    }

    /// Render and atomically write one record's artifact.
    fn write_record(&self, registry: &dyn Registry, record: &OverrideRecord) -> Result<PathBuf> {
        let path = self.translator.generated_path(record.namespace())?;
        let contents = self.render(registry, record);
        write_atomic(&path, &contents)?;
        Ok(path)
    }

    fn render(&self, registry: &dyn Registry, record: &OverrideRecord) -> String {
        let ns = record.namespace();
        let mut out = String::new();
        out.push_str(GENERATED_MARKER);
        out.push('\n');
        out.push_str(&format!("# source context: {}\n", ns));
        out.push_str("# changes belong in the personalization control files, not here\n");

        // the original predicate conjoined with the enabling tag
        match registry.match_predicate(ns) {
            Some(predicate) => {
                out.push_str(&format!("match: {} and tag: {}\n", predicate.trim(), ENABLE_TAG))
            }
            None => out.push_str(&format!("match: tag: {}\n", ENABLE_TAG)),
        }
        out.push_str("-\n");

        match record {
            OverrideRecord::List(list) => {
                for (idx, (name, pairs)) in list.collections.iter().enumerate() {
                    if idx > 0 {
                        out.push('\n');
                    }
                    out.push_str(&format!("list {}:\n", name));
                    for (key, value) in pairs {
                        out.push_str(&format!("    {}: {}\n", key, value));
                    }
                }
            }
            OverrideRecord::Command(cmd) => {
                for tag in registry.context_tags(ns) {
                    out.push_str(&format!("tag(): {}\n", tag));
                }
                for (rule, implementation) in &cmd.rules {
                    out.push_str(&format!("{}: {}\n", rule, implementation));
                }
            }
        }
        out
    }

    // ── Enabling tag ────────────────────────────────────────────────

    /// Declare the enabling tag so personalized contexts can activate.
    pub fn write_enable_tag(&self) -> Result<()> {
        let path = self.generated_root.join(ENABLE_TAG_FILE);
        let contents = format!("{}\ntag(): {}\n", GENERATED_MARKER, ENABLE_TAG);
        write_atomic(&path, &contents)
    }

    /// Withdraw the enabling tag; the host deactivates every artifact.
    pub fn remove_enable_tag(&self) {
        let path = self.generated_root.join(ENABLE_TAG_FILE);
        if path.exists() {
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "failed to remove enabling tag");
            }
        }
    }
}

/// Write to a `.tmp` sibling first, then rename, to avoid partial writes.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "artifact path has no parent")
    })?;
    fs::create_dir_all(parent)?;
    let file_name = path.file_name().and_then(|n| n.to_str()).ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "artifact path has no file name")
    })?;
    let tmp = parent.join(format!(".{}.tmp", file_name));
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{Category, Directive, DirectiveKind};
    use indexmap::IndexMap;
    use tempfile::TempDir;

    struct StubRegistry;

    impl Registry for StubRegistry {
        fn base_list_collection(&self, name: &str) -> Option<IndexMap<String, String>> {
            (name == "mylist").then(|| {
                [("a", "1")]
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            })
        }

        fn base_command_rules(&self, _: &NamespacePath) -> Option<IndexMap<String, String>> {
            Some(
                [("open file", "key(ctrl-o)")]
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            )
        }

        fn match_predicate(&self, _: &NamespacePath) -> Option<String> {
            Some("app: terminal".to_string())
        }

        fn context_tags(&self, _: &NamespacePath) -> Vec<String> {
            vec!["user.terminal".to_string()]
        }
    }

    fn config(dir: &TempDir) -> Config {
        Config {
            config_root: dir.path().join("settings"),
            source_root: dir.path().join("source"),
            generated_root: dir.path().join("generated"),
            enabled: true,
        }
    }

    fn ns(s: &str) -> NamespacePath {
        s.parse().unwrap()
    }

    fn list_store(dir: &TempDir) -> OverrideStore {
        let aux = dir.path().join("aux.csv");
        fs::write(&aux, "x,1\n").unwrap();
        let mut store = OverrideStore::new();
        store
            .apply_directive(
                &StubRegistry,
                &Directive {
                    kind: DirectiveKind::Add,
                    category: Category::List,
                    target: ns("user.foo"),
                    collection: Some("mylist".to_string()),
                    aux_file: Some(aux),
                    line: 1,
                    raw: String::new(),
                },
            )
            .unwrap();
        store
    }

    #[test]
    fn writes_list_artifact_with_header_and_assignments() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        let gen = ArtifactGenerator::new(&cfg);
        let store = list_store(&dir);

        gen.regenerate(&StubRegistry, &store, &[ns("user.foo")]).unwrap();

        let artifact = cfg.generated_root.join("foo.decl");
        let contents = fs::read_to_string(&artifact).unwrap();
        assert!(contents.starts_with(GENERATED_MARKER));
        assert!(contents.contains("# source context: user.foo"));
        assert!(contents.contains("match: app: terminal and tag: personalization"));
        assert!(contents.contains("list mylist:"));
        assert!(contents.contains("    a: 1"));
        assert!(contents.contains("    x: 1"));
    }

    #[test]
    fn regeneration_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        let gen = ArtifactGenerator::new(&cfg);
        let store = list_store(&dir);
        let targets = [ns("user.foo")];

        gen.regenerate(&StubRegistry, &store, &targets).unwrap();
        let first = fs::read(cfg.generated_root.join("foo.decl")).unwrap();

        gen.regenerate(&StubRegistry, &store, &targets).unwrap();
        let second = fs::read(cfg.generated_root.join("foo.decl")).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn empty_record_leaves_no_file_after_purge() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        let gen = ArtifactGenerator::new(&cfg);
        let store = list_store(&dir);

        gen.regenerate(&StubRegistry, &store, &[ns("user.foo")]).unwrap();
        assert!(cfg.generated_root.join("foo.decl").exists());

        // purge with an empty store: the artifact disappears
        let empty = OverrideStore::new();
        gen.regenerate(&StubRegistry, &empty, &[ns("user.foo")]).unwrap();
        assert!(!cfg.generated_root.join("foo.decl").exists());
    }

    #[test]
    fn purge_refuses_unmarked_files() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        let gen = ArtifactGenerator::new(&cfg);

        let path = cfg.generated_root.join("foo.decl");
        fs::create_dir_all(&cfg.generated_root).unwrap();
        fs::write(&path, "not ours\n").unwrap();

        let empty = OverrideStore::new();
        gen.regenerate(&StubRegistry, &empty, &[ns("user.foo")]).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn command_artifact_lists_tags_then_rules() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        let gen = ArtifactGenerator::new(&cfg);

        let aux = dir.path().join("gone.csv");
        fs::write(&aux, "open file\n").unwrap();
        let mut store = OverrideStore::new();
        store
            .apply_directive(
                &StubRegistry,
                &Directive {
                    kind: DirectiveKind::Delete,
                    category: Category::Command,
                    target: ns("user.apps.terminal.cmd"),
                    collection: None,
                    aux_file: Some(aux),
                    line: 1,
                    raw: String::new(),
                },
            )
            .unwrap();

        gen.regenerate(&StubRegistry, &store, &[ns("user.apps.terminal.cmd")]).unwrap();

        let contents =
            fs::read_to_string(cfg.generated_root.join("apps/terminal.cmd")).unwrap();
        let tag_pos = contents.find("tag(): user.terminal").unwrap();
        let rule_pos = contents.find("open file: skip()").unwrap();
        assert!(tag_pos < rule_pos);
    }

    #[test]
    fn enable_tag_round_trip() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        let gen = ArtifactGenerator::new(&cfg);

        gen.write_enable_tag().unwrap();
        let path = cfg.generated_root.join(ENABLE_TAG_FILE);
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("tag(): personalization"));

        gen.remove_enable_tag();
        assert!(!path.exists());
    }

    #[test]
    fn purge_all_clears_generated_tree() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        let gen = ArtifactGenerator::new(&cfg);
        let store = list_store(&dir);

        gen.regenerate(&StubRegistry, &store, &[ns("user.foo")]).unwrap();
        gen.write_enable_tag().unwrap();

        gen.purge_all();
        assert!(!cfg.generated_root.join("foo.decl").exists());
        assert!(!cfg.generated_root.join(ENABLE_TAG_FILE).exists());
    }
}
