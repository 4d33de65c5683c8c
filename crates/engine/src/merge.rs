//! Pure directive application.
//!
//! `apply_list` and `apply_command` transform a current key→value state into
//! a new state without touching the store; callers commit the result only on
//! success, so a failed directive leaves state unchanged.
//!
//! Auxiliary row shape is validated up front: `DELETE` rows carry exactly
//! one field, `ADD`/`REPLACE`/`REPLACE_KEY` rows exactly two. Any violation
//! invalidates the entire auxiliary file for that directive (zero partial
//! effect) — deliberately stricter than the per-row skip policy of the
//! control parser.

use indexmap::IndexMap;
use tracing::warn;

use personalize_core::{PersonalizeError, Result};

use crate::control::DirectiveKind;

/// Ordered key→value pairs; insertion order carries through to artifacts.
pub type Pairs = IndexMap<String, String>;

/// Implementation text a masked command rule is rewritten to.
///
/// Masking keeps the entry in place instead of removing it, so downstream
/// consumers relying on implicit rule ordering keep seeing the same shape.
pub const MASK_IMPL: &str = "skip()";

// ── Auxiliary row shapes ────────────────────────────────────────────

/// Every row must carry exactly one field (a key).
fn keys_only(rows: &[Vec<String>]) -> Result<Vec<&str>> {
    rows.iter()
        .map(|row| {
            if row.len() == 1 {
                Ok(row[0].as_str())
            } else {
                Err(PersonalizeError::Parse(format!(
                    "deletion rows must have exactly one value, got {}: '{}'",
                    row.len(),
                    row.join(",")
                )))
            }
        })
        .collect()
}

/// Every row must carry exactly two fields (key and value).
fn key_values(rows: &[Vec<String>]) -> Result<Vec<(&str, &str)>> {
    rows.iter()
        .map(|row| {
            if row.len() == 2 {
                Ok((row[0].as_str(), row[1].as_str()))
            } else {
                Err(PersonalizeError::Parse(format!(
                    "rows must have exactly two values, got {}: '{}'",
                    row.len(),
                    row.join(",")
                )))
            }
        })
        .collect()
}

// ── List mode ───────────────────────────────────────────────────────

/// Apply one directive to a list collection state.
pub fn apply_list(
    current: &Pairs,
    kind: DirectiveKind,
    rows: Option<&[Vec<String>]>,
) -> Result<Pairs> {
    match kind {
        DirectiveKind::Add => {
            let additions = key_values(require_rows(rows)?)?;
            let mut next = current.clone();
            for (k, v) in additions {
                // auxiliary value wins on collision
                next.insert(k.to_string(), v.to_string());
            }
            Ok(next)
        }
        DirectiveKind::Delete => {
            let deletions = keys_only(require_rows(rows)?)?;
            // all-or-nothing: check every key before removing any
            for key in &deletions {
                if !current.contains_key(*key) {
                    return Err(PersonalizeError::Reference(format!(
                        "cannot delete key not present in collection: '{}'",
                        key
                    )));
                }
            }
            let mut next = current.clone();
            for key in deletions {
                next.shift_remove(key);
            }
            Ok(next)
        }
        DirectiveKind::Replace => match rows {
            None => Ok(Pairs::new()),
            Some(rows) => {
                let pairs = key_values(rows)?;
                Ok(pairs
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect())
            }
        },
        DirectiveKind::ReplaceKey => {
            let renames = key_values(require_rows(rows)?)?;
            let mut next = current.clone();
            for (old, new) in renames {
                if old == new {
                    continue;
                }
                match next.shift_remove(old) {
                    // overwrites any pre-existing value at the new key
                    Some(value) => {
                        next.insert(new.to_string(), value);
                    }
                    None => {
                        // error for this row only, remaining rows still apply
                        warn!(old_key = old, new_key = new, "cannot rename missing key");
                    }
                }
            }
            Ok(next)
        }
    }
}

// ── Command mode ────────────────────────────────────────────────────

/// Apply one directive to a command rule map.
///
/// `ADD` never reaches here — it is rejected upstream with a one-shot
/// notification, since new rules must originate from a genuine source
/// declaration.
pub fn apply_command(
    current: &Pairs,
    kind: DirectiveKind,
    rows: Option<&[Vec<String>]>,
) -> Result<Pairs> {
    match kind {
        DirectiveKind::Delete => {
            let rules = keys_only(require_rows(rows)?)?;
            for rule in &rules {
                if !current.contains_key(*rule) {
                    return Err(PersonalizeError::Reference(format!(
                        "cannot delete rule not present in context: '{}'",
                        rule
                    )));
                }
            }
            let mut next = current.clone();
            for rule in rules {
                // mask instead of remove, preserving rule ordering downstream
                next.insert(rule.to_string(), MASK_IMPL.to_string());
            }
            Ok(next)
        }
        DirectiveKind::Replace => match rows {
            None => Ok(Pairs::new()),
            Some(rows) => {
                let renames = key_values(rows)?;
                let mut next = current.clone();
                for (old, new) in renames {
                    match next.get(old).cloned() {
                        Some(implementation) => {
                            // mask the old rule, bind the new rule to the
                            // original implementation
                            next.insert(old.to_string(), MASK_IMPL.to_string());
                            next.insert(new.to_string(), implementation);
                        }
                        None => {
                            warn!(rule = old, "cannot replace rule not present in context");
                        }
                    }
                }
                Ok(next)
            }
        },
        DirectiveKind::Add | DirectiveKind::ReplaceKey => Err(PersonalizeError::Parse(format!(
            "{} is not a command-mode action",
            kind
        ))),
    }
}

fn require_rows(rows: Option<&[Vec<String>]>) -> Result<&[Vec<String>]> {
    rows.ok_or_else(|| {
        PersonalizeError::Parse("directive requires an auxiliary file".to_string())
    })
}
