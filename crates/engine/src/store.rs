//! Per-namespace accumulated override state.
//!
//! Records are created lazily: the first directive referencing a namespace
//! (or a collection within it) seeds state from the host registry, then
//! every directive replays through the merge engine in control-file order.
//! A failed directive commits nothing — the record keeps its prior state,
//! and a namespace whose every directive fails never grows a record at all.
//!
//! The store is the unit of regeneration granularity: artifact passes take
//! namespace sets drawn from here.

use indexmap::IndexMap;
use tracing::{debug, warn};

use personalize_core::{NamespacePath, PersonalizeError, Registry, Result};

use crate::control::{Category, Directive, DirectiveKind};
use crate::csv;
use crate::merge::{self, Pairs};

// ── Records ─────────────────────────────────────────────────────────

/// Accumulated list-mode overrides for one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOverride {
    pub namespace: NamespacePath,
    /// collection name → overridden key→value pairs
    pub collections: IndexMap<String, Pairs>,
}

/// Accumulated command-mode overrides for one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOverride {
    pub namespace: NamespacePath,
    /// rule text → implementation text
    pub rules: Pairs,
}

/// Either kind of per-namespace override state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideRecord {
    List(ListOverride),
    Command(CommandOverride),
}

impl OverrideRecord {
    pub fn namespace(&self) -> &NamespacePath {
        match self {
            OverrideRecord::List(r) => &r.namespace,
            OverrideRecord::Command(r) => &r.namespace,
        }
    }

    pub fn category(&self) -> Category {
        match self {
            OverrideRecord::List(_) => Category::List,
            OverrideRecord::Command(_) => Category::Command,
        }
    }

    /// An empty record produces no artifact (implicit deletion after purge).
    pub fn is_empty(&self) -> bool {
        match self {
            OverrideRecord::List(r) => r.collections.is_empty(),
            OverrideRecord::Command(r) => r.rules.is_empty(),
        }
    }
}

// ── Store ───────────────────────────────────────────────────────────

/// All override records, keyed by namespace in first-reference order.
#[derive(Debug, Default)]
pub struct OverrideStore {
    records: IndexMap<NamespacePath, OverrideRecord>,
}

impl OverrideStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, namespace: &NamespacePath) -> Option<&OverrideRecord> {
        self.records.get(namespace)
    }

    pub fn namespaces(&self) -> Vec<NamespacePath> {
        self.records.keys().cloned().collect()
    }

    pub fn records(&self) -> impl Iterator<Item = &OverrideRecord> {
        self.records.values()
    }

    /// Drop one namespace's record.
    pub fn clear(&mut self, namespace: &NamespacePath) {
        self.records.shift_remove(namespace);
    }

    /// Drop every record of one category; returns the namespaces dropped.
    pub fn clear_category(&mut self, category: Category) -> Vec<NamespacePath> {
        let dropped: Vec<NamespacePath> = self
            .records
            .values()
            .filter(|r| r.category() == category)
            .map(|r| r.namespace().clone())
            .collect();
        self.records.retain(|_, r| r.category() != category);
        dropped
    }

    pub fn clear_all(&mut self) {
        self.records.clear();
    }

    /// Replay one directive against the store.
    ///
    /// Reads the auxiliary file (if any), seeds base state from the registry
    /// on first reference, applies the merge, and commits the result only on
    /// success. A missing or malformed auxiliary file aborts exactly this
    /// directive.
    pub fn apply_directive(&mut self, registry: &dyn Registry, directive: &Directive) -> Result<()> {
        let rows = match &directive.aux_file {
            Some(path) => Some(csv::read_rows(path)?),
            None => None,
        };
        let rows = rows.as_deref();

        match directive.category {
            Category::List => self.apply_list_directive(registry, directive, rows),
            Category::Command => self.apply_command_directive(registry, directive, rows),
        }
    }

    fn apply_list_directive(
        &mut self,
        registry: &dyn Registry,
        directive: &Directive,
        rows: Option<&[Vec<String>]>,
    ) -> Result<()> {
        let collection = directive
            .collection
            .as_deref()
            .ok_or_else(|| PersonalizeError::Parse("list directive without collection".into()))?;

        // current state: overridden value if present, else the registry base
        let existing = self.records.get(&directive.target).and_then(|r| match r {
            OverrideRecord::List(l) => l.collections.get(collection),
            OverrideRecord::Command(_) => None,
        });
        let current = match existing {
            Some(pairs) => pairs.clone(),
            None => registry.base_list_collection(collection).ok_or_else(|| {
                PersonalizeError::Reference(format!(
                    "cannot redefine a collection that does not exist: '{}'",
                    collection
                ))
            })?,
        };

        let next = merge::apply_list(&current, directive.kind, rows)?;
        debug!(
            target = %directive.target,
            collection,
            kind = %directive.kind,
            entries = next.len(),
            "applied list directive"
        );

        let record = self
            .records
            .entry(directive.target.clone())
            .or_insert_with(|| {
                OverrideRecord::List(ListOverride {
                    namespace: directive.target.clone(),
                    collections: IndexMap::new(),
                })
            });
        match record {
            OverrideRecord::List(l) => {
                l.collections.insert(collection.to_string(), next);
                Ok(())
            }
            OverrideRecord::Command(_) => {
                // the parser keys categories by folder, so this is unreachable
                // unless a namespace is claimed by both control files
                warn!(target = %directive.target, "namespace already holds command overrides");
                Err(PersonalizeError::Reference(format!(
                    "'{}' already personalized as a command context",
                    directive.target
                )))
            }
        }
    }

    fn apply_command_directive(
        &mut self,
        registry: &dyn Registry,
        directive: &Directive,
        rows: Option<&[Vec<String>]>,
    ) -> Result<()> {
        if directive.kind == DirectiveKind::Add {
            // rejected upstream with a one-shot notification; refuse here too
            return Err(PersonalizeError::Parse(
                "ADD is not supported for command contexts".into(),
            ));
        }

        let current = match self.records.get(&directive.target) {
            Some(OverrideRecord::Command(c)) => c.rules.clone(),
            Some(OverrideRecord::List(_)) => {
                return Err(PersonalizeError::Reference(format!(
                    "'{}' already personalized as a list context",
                    directive.target
                )))
            }
            None => registry.base_command_rules(&directive.target).ok_or_else(|| {
                PersonalizeError::Reference(format!(
                    "no command context found for '{}'",
                    directive.target
                ))
            })?,
        };

        let next = merge::apply_command(&current, directive.kind, rows)?;
        debug!(
            target = %directive.target,
            kind = %directive.kind,
            rules = next.len(),
            "applied command directive"
        );

        self.records.insert(
            directive.target.clone(),
            OverrideRecord::Command(CommandOverride {
                namespace: directive.target.clone(),
                rules: next,
            }),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct StubRegistry;

    impl Registry for StubRegistry {
        fn base_list_collection(&self, name: &str) -> Option<Pairs> {
            match name {
                "mylist" => Some(
                    [("a", "1"), ("b", "2")]
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                ),
                _ => None,
            }
        }

        fn base_command_rules(&self, namespace: &NamespacePath) -> Option<Pairs> {
            (namespace.as_str() == "user.apps.terminal.cmd").then(|| {
                [("open file", "key(ctrl-o)")]
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            })
        }

        fn match_predicate(&self, _: &NamespacePath) -> Option<String> {
            None
        }

        fn context_tags(&self, _: &NamespacePath) -> Vec<String> {
            Vec::new()
        }
    }

    fn ns(s: &str) -> NamespacePath {
        s.parse().unwrap()
    }

    fn list_directive(dir: &TempDir, kind: DirectiveKind, aux: Option<&str>) -> Directive {
        let aux_file = aux.map(|body| {
            let path = dir.path().join("aux.csv");
            fs::write(&path, body).unwrap();
            path
        });
        Directive {
            kind,
            category: Category::List,
            target: ns("user.foo"),
            collection: Some("mylist".to_string()),
            aux_file,
            line: 1,
            raw: String::new(),
        }
    }

    #[test]
    fn first_reference_seeds_from_registry() {
        let dir = TempDir::new().unwrap();
        let mut store = OverrideStore::new();
        let d = list_directive(&dir, DirectiveKind::Add, Some("c,3\n"));

        store.apply_directive(&StubRegistry, &d).unwrap();

        let record = store.get(&ns("user.foo")).unwrap();
        let OverrideRecord::List(list) = record else {
            panic!("expected list record")
        };
        let pairs = &list.collections["mylist"];
        assert_eq!(
            pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect::<Vec<_>>(),
            vec![("a", "1"), ("b", "2"), ("c", "3")]
        );
    }

    #[test]
    fn unknown_collection_is_reference_error() {
        let dir = TempDir::new().unwrap();
        let mut store = OverrideStore::new();
        let mut d = list_directive(&dir, DirectiveKind::Add, Some("c,3\n"));
        d.collection = Some("nolist".to_string());

        let err = store.apply_directive(&StubRegistry, &d).unwrap_err();
        assert!(matches!(err, PersonalizeError::Reference(_)));
        // nothing committed
        assert!(store.get(&ns("user.foo")).is_none());
    }

    #[test]
    fn missing_aux_file_aborts_only_this_directive() {
        let dir = TempDir::new().unwrap();
        let mut store = OverrideStore::new();
        let mut d = list_directive(&dir, DirectiveKind::Add, None);
        d.aux_file = Some(dir.path().join("absent.csv"));

        let err = store.apply_directive(&StubRegistry, &d).unwrap_err();
        assert!(matches!(err, PersonalizeError::Io(_)));
        assert!(store.get(&ns("user.foo")).is_none());

        // a later directive still lands
        let ok = list_directive(&dir, DirectiveKind::Add, Some("c,3\n"));
        store.apply_directive(&StubRegistry, &ok).unwrap();
        assert!(store.get(&ns("user.foo")).is_some());
    }

    #[test]
    fn failed_merge_leaves_prior_state() {
        let dir = TempDir::new().unwrap();
        let mut store = OverrideStore::new();
        store
            .apply_directive(&StubRegistry, &list_directive(&dir, DirectiveKind::Add, Some("c,3\n")))
            .unwrap();

        // deleting an absent key fails, state unchanged
        let bad = list_directive(&dir, DirectiveKind::Delete, Some("zzz\n"));
        assert!(store.apply_directive(&StubRegistry, &bad).is_err());

        let OverrideRecord::List(list) = store.get(&ns("user.foo")).unwrap() else {
            panic!("expected list record")
        };
        assert!(list.collections["mylist"].contains_key("c"));
    }

    #[test]
    fn directives_replay_in_order() {
        let dir = TempDir::new().unwrap();
        let mut store = OverrideStore::new();

        // DELETE(a) then ADD(a,9): base {a:1,b:2} -> {b:2,a:9}
        store
            .apply_directive(&StubRegistry, &list_directive(&dir, DirectiveKind::Delete, Some("a\n")))
            .unwrap();
        store
            .apply_directive(&StubRegistry, &list_directive(&dir, DirectiveKind::Add, Some("a,9\n")))
            .unwrap();

        let OverrideRecord::List(list) = store.get(&ns("user.foo")).unwrap() else {
            panic!("expected list record")
        };
        assert_eq!(list.collections["mylist"].get("a").map(String::as_str), Some("9"));
    }

    #[test]
    fn command_directives_build_command_records() {
        let dir = TempDir::new().unwrap();
        let mut store = OverrideStore::new();
        let aux = dir.path().join("gone.csv");
        fs::write(&aux, "open file\n").unwrap();

        let d = Directive {
            kind: DirectiveKind::Delete,
            category: Category::Command,
            target: ns("user.apps.terminal.cmd"),
            collection: None,
            aux_file: Some(aux),
            line: 1,
            raw: String::new(),
        };
        store.apply_directive(&StubRegistry, &d).unwrap();

        let OverrideRecord::Command(cmd) = store.get(&ns("user.apps.terminal.cmd")).unwrap()
        else {
            panic!("expected command record")
        };
        assert_eq!(cmd.rules.get("open file").map(String::as_str), Some(merge::MASK_IMPL));
    }

    #[test]
    fn clear_category_drops_only_that_category() {
        let dir = TempDir::new().unwrap();
        let mut store = OverrideStore::new();
        store
            .apply_directive(&StubRegistry, &list_directive(&dir, DirectiveKind::Add, Some("c,3\n")))
            .unwrap();

        let aux = dir.path().join("gone.csv");
        fs::write(&aux, "open file\n").unwrap();
        let cmd = Directive {
            kind: DirectiveKind::Delete,
            category: Category::Command,
            target: ns("user.apps.terminal.cmd"),
            collection: None,
            aux_file: Some(aux),
            line: 1,
            raw: String::new(),
        };
        store.apply_directive(&StubRegistry, &cmd).unwrap();

        let dropped = store.clear_category(Category::List);
        assert_eq!(dropped, vec![ns("user.foo")]);
        assert!(store.get(&ns("user.foo")).is_none());
        assert!(store.get(&ns("user.apps.terminal.cmd")).is_some());
    }
}
