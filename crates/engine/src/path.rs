//! Bidirectional mapping between namespace paths and filesystem paths.
//!
//! Dotted segments map to path components under the source root; the final
//! segment is the filename. Command-mode namespaces keep their native
//! extension as the final dotted component (`user.apps.term.cmd` ↔
//! `apps/term.cmd`), list-mode namespaces map to the generic source
//! extension (`user.apps.term` ↔ `apps/term.decl`).
//!
//! One resolution is deliberately refused rather than guessed: a trailing
//! component may name either a flat file (`apps/term.decl`) or a directory's
//! default source file (`apps/term/term.decl`). When both exist the
//! namespace is ambiguous and translation fails.

use std::path::{Path, PathBuf};

use personalize_core::config::Config;
use personalize_core::namespace::{COMMAND_SOURCE_EXT, LIST_SOURCE_EXT, ROOT_TOKEN};
use personalize_core::{NamespacePath, PathError};

/// Translates between [`NamespacePath`]s and locations under the source and
/// generated roots.
#[derive(Debug, Clone)]
pub struct PathTranslator {
    source_root: PathBuf,
    generated_root: PathBuf,
}

impl PathTranslator {
    pub fn new(config: &Config) -> Self {
        Self {
            source_root: config.source_root.clone(),
            generated_root: config.generated_root.clone(),
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn generated_root(&self) -> &Path {
        &self.generated_root
    }

    /// Resolve a namespace to its source file location.
    ///
    /// Ambiguity (both the flat and the directory-default candidate exist on
    /// disk) is an error. When neither candidate exists the flat form is the
    /// derived location; artifact paths mirror it.
    pub fn to_filesystem_path(&self, ns: &NamespacePath) -> Result<PathBuf, PathError> {
        let segs: Vec<&str> = ns.relative_segments().collect();
        let (dir_segs, stem, ext) = if ns.is_command() {
            if segs.len() < 2 {
                return Err(PathError::OutsideRoot(ns.to_string()));
            }
            (&segs[..segs.len() - 2], segs[segs.len() - 2], COMMAND_SOURCE_EXT)
        } else {
            (&segs[..segs.len() - 1], segs[segs.len() - 1], LIST_SOURCE_EXT)
        };

        let mut dir = self.source_root.clone();
        for seg in dir_segs {
            dir.push(seg);
        }
        let flat = dir.join(format!("{}.{}", stem, ext));
        let nested = dir.join(stem).join(format!("{}.{}", stem, ext));
        self.check_not_generated(ns, &flat)?;
        self.check_not_generated(ns, &nested)?;

        match (flat.is_file(), nested.is_file()) {
            (true, true) => Err(PathError::Ambiguous {
                namespace: ns.to_string(),
                flat,
                nested,
            }),
            (false, true) => Ok(nested),
            // exactly the flat file, or neither: the flat form is canonical
            _ => Ok(flat),
        }
    }

    /// Resolve a source file path back to its namespace.
    ///
    /// A directory's default source file collapses into the directory's own
    /// namespace (`apps/term/term.decl` → `user.apps.term`).
    pub fn to_namespace_path(&self, path: &Path) -> Result<NamespacePath, PathError> {
        if path.starts_with(&self.generated_root) {
            return Err(PathError::InsideGenerated(path.display().to_string()));
        }
        let rel = path
            .strip_prefix(&self.source_root)
            .map_err(|_| PathError::OutsideRoot(path.display().to_string()))?;

        let mut segs: Vec<String> = Vec::new();
        if let Some(parent) = rel.parent() {
            for comp in parent.components() {
                let seg = comp
                    .as_os_str()
                    .to_str()
                    .ok_or_else(|| PathError::OutsideRoot(path.display().to_string()))?;
                segs.push(seg.to_string());
            }
        }
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| PathError::OutsideRoot(path.display().to_string()))?;
        let ext = path.extension().and_then(|e| e.to_str());

        match ext {
            Some(e) if e == COMMAND_SOURCE_EXT => {
                if segs.last().map(|d| d == stem) != Some(true) {
                    segs.push(stem.to_string());
                }
                segs.push(COMMAND_SOURCE_EXT.to_string());
            }
            Some(e) if e == LIST_SOURCE_EXT => {
                if segs.last().map(|d| d == stem) != Some(true) {
                    segs.push(stem.to_string());
                }
                // else: directory default file, the directory already names it
            }
            _ => return Err(PathError::OutsideRoot(path.display().to_string())),
        }

        let dotted = format!("{}.{}", ROOT_TOKEN, segs.join("."));
        dotted.parse()
    }

    /// The artifact location for a namespace: its source-relative path
    /// re-rooted under the generated root.
    pub fn generated_path(&self, ns: &NamespacePath) -> Result<PathBuf, PathError> {
        let source = self.to_filesystem_path(ns)?;
        let rel = source
            .strip_prefix(&self.source_root)
            .map_err(|_| PathError::OutsideRoot(ns.to_string()))?;
        Ok(self.generated_root.join(rel))
    }

    fn check_not_generated(&self, ns: &NamespacePath, candidate: &Path) -> Result<(), PathError> {
        if candidate.starts_with(&self.generated_root) {
            return Err(PathError::InsideGenerated(ns.to_string()));
        }
        Ok(())
    }
}
