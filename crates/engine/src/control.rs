//! Control directive parsing.
//!
//! Each category folder (`list_personalization/`, `command_personalization/`)
//! carries a master `control.csv` whose rows describe one override action
//! each. Row order is semantically significant and preserved verbatim.
//! Validation is per-row: a malformed row is skipped with a logged error and
//! the rest of the file still processes. A missing or unreadable control
//! file yields no directives for that category this cycle, never an abort.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, warn};

use personalize_core::config::{Config, COMMAND_FOLDER, LIST_FOLDER};
use personalize_core::NamespacePath;

use crate::csv;

// ── Category ────────────────────────────────────────────────────────

/// Which kind of host context a directive file personalizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    List,
    Command,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::List, Category::Command];

    /// Sub-folder of the config root holding this category's files.
    pub fn folder(&self) -> &'static str {
        match self {
            Category::List => LIST_FOLDER,
            Category::Command => COMMAND_FOLDER,
        }
    }

    /// Path of this category's `control.csv`.
    pub fn control_file(&self, config: &Config) -> PathBuf {
        config.control_file(self.folder())
    }

    /// Classify a config-root path by its category folder prefix.
    pub fn of_path(config: &Config, path: &Path) -> Option<Category> {
        Category::ALL
            .into_iter()
            .find(|c| path.starts_with(config.category_dir(c.folder())))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.folder())
    }
}

// ── Directive kind ──────────────────────────────────────────────────

/// The four override actions of the directive language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    Add,
    Delete,
    Replace,
    ReplaceKey,
}

impl DirectiveKind {
    /// Whether this kind requires an auxiliary file. Only `REPLACE` may
    /// omit it (meaning "become empty").
    pub fn requires_aux(&self) -> bool {
        !matches!(self, DirectiveKind::Replace)
    }
}

impl FromStr for DirectiveKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ADD" => Ok(DirectiveKind::Add),
            "DELETE" => Ok(DirectiveKind::Delete),
            "REPLACE" => Ok(DirectiveKind::Replace),
            "REPLACE_KEY" => Ok(DirectiveKind::ReplaceKey),
            other => Err(format!("unknown action: '{}'", other)),
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectiveKind::Add => write!(f, "ADD"),
            DirectiveKind::Delete => write!(f, "DELETE"),
            DirectiveKind::Replace => write!(f, "REPLACE"),
            DirectiveKind::ReplaceKey => write!(f, "REPLACE_KEY"),
        }
    }
}

// ── Directive ───────────────────────────────────────────────────────

/// One control-file row describing one override action.
#[derive(Debug, Clone)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub category: Category,
    pub target: NamespacePath,
    /// Collection name, list mode only.
    pub collection: Option<String>,
    /// Auxiliary CSV, resolved against the category folder.
    pub aux_file: Option<PathBuf>,
    /// Control-file line number, for log messages.
    pub line: usize,
    /// The raw row text, used to de-duplicate one-shot notifications.
    pub raw: String,
}

// ── Parser ──────────────────────────────────────────────────────────

/// Parse one category's control file into an ordered directive list.
pub fn parse_control_file(config: &Config, category: Category) -> Vec<Directive> {
    let control = category.control_file(config);
    let rows = match csv::read_rows(&control) {
        Ok(rows) => rows,
        Err(e) => {
            warn!(
                path = %control.display(),
                error = %e,
                "control file unreadable, no directives for this category this cycle"
            );
            return Vec::new();
        }
    };

    let category_dir = config.category_dir(category.folder());
    let mut directives = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        let line = idx + 1;
        match parse_row(category, &category_dir, row, line) {
            Ok(d) => {
                debug!(control = %control.display(), line, directive = %d.raw, "parsed directive");
                directives.push(d);
            }
            Err(reason) => {
                warn!(control = %control.display(), line, reason, "skipping malformed directive row");
            }
        }
    }
    directives
}

fn parse_row(
    category: Category,
    category_dir: &Path,
    row: &[String],
    line: usize,
) -> Result<Directive, String> {
    let expected = match category {
        // action, target, collection, auxFile?
        Category::List => 3..=4,
        // action, target, auxFile?
        Category::Command => 2..=3,
    };
    if !expected.contains(&row.len()) {
        return Err(format!("expected {:?} columns, got {}", expected, row.len()));
    }

    let kind: DirectiveKind = row[0].parse()?;
    let target: NamespacePath = row[1].parse().map_err(|e| format!("bad target: {}", e))?;

    let (collection, aux) = match category {
        Category::List => {
            if target.is_command() {
                return Err(format!("'{}' names a command context, not a list context", target));
            }
            if row[2].is_empty() {
                return Err("empty collection name".to_string());
            }
            (Some(row[2].clone()), row.get(3))
        }
        Category::Command => {
            if !target.is_command() {
                return Err(format!("'{}' does not name a command context", target));
            }
            if kind == DirectiveKind::ReplaceKey {
                return Err("REPLACE_KEY applies to lists only".to_string());
            }
            (None, row.get(2))
        }
    };

    let aux_file = match aux.filter(|f| !f.is_empty()) {
        Some(file) => Some(category_dir.join(file)),
        None if kind.requires_aux() => {
            return Err(format!("missing auxiliary file for {} entry", kind));
        }
        None => None,
    };

    Ok(Directive {
        kind,
        category,
        target,
        collection,
        aux_file,
        line,
        raw: row.join(","),
    })
}
