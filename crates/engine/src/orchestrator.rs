//! Top-level reload state machine.
//!
//! Owns the enable/disable lifecycle and the single reload lock. Every pass
//! — full load, per-category reload, per-namespace rebuild, teardown — runs
//! to completion under that lock; a notification arriving mid-pass waits,
//! then is re-evaluated against current file state (the handler stats and
//! re-reads at dispatch time, it never replays captured event content).
//!
//! Known race, accepted as best-effort: the host registry may still hold
//! pre-change base data at the instant a source-file notification fires,
//! because the host's own file-update and registry-refresh ordering is not
//! synchronized with its watch delivery. The next notification reconverges.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::{debug, info, warn};

use personalize_core::config::Config;
use personalize_core::{
    EnableFlag, NamespacePath, NotificationSink, Registry, WatchCallback, WatchService,
};

use crate::artifact::ArtifactGenerator;
use crate::control::{self, Category, Directive, DirectiveKind};
use crate::path::PathTranslator;
use crate::store::OverrideStore;
use crate::watch::WatchCoordinator;

/// Lifecycle states of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Disabled,
    Loading,
    Ready,
}

/// Everything mutable, guarded by the single reload lock.
struct Inner {
    state: EngineState,
    /// All live directives, per-category control-file order preserved.
    directives: Vec<Directive>,
    store: OverrideStore,
    coordinator: WatchCoordinator,
    /// Offending command-ADD rows already reported, so the user is alerted
    /// at most once per distinct directive.
    notified_adds: HashSet<String>,
}

/// Ties parser, merge engine, store, generator, and watch coordinator
/// together; the only component holding mutable state across passes.
pub struct ReloadOrchestrator {
    config: Config,
    translator: PathTranslator,
    generator: ArtifactGenerator,
    registry: Arc<dyn Registry>,
    flag: Arc<dyn EnableFlag>,
    sink: Arc<dyn NotificationSink>,
    /// The one callback behind every watch subscription; holds a `Weak`
    /// back-reference so subscriptions cannot keep the engine alive.
    callback: WatchCallback,
    inner: Mutex<Inner>,
}

impl ReloadOrchestrator {
    pub fn new(
        config: Config,
        registry: Arc<dyn Registry>,
        watch_service: Arc<dyn WatchService>,
        flag: Arc<dyn EnableFlag>,
        sink: Arc<dyn NotificationSink>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let callback: WatchCallback = Arc::new(move |path: &Path, exists: bool| {
                if let Some(orchestrator) = weak.upgrade() {
                    orchestrator.handle_fs_event(path, exists);
                }
            });
            Self {
                translator: PathTranslator::new(&config),
                generator: ArtifactGenerator::new(&config),
                registry,
                flag,
                sink,
                callback,
                inner: Mutex::new(Inner {
                    state: EngineState::Disabled,
                    directives: Vec::new(),
                    store: OverrideStore::new(),
                    coordinator: WatchCoordinator::new(watch_service),
                    notified_adds: HashSet::new(),
                }),
                config,
            }
        })
    }

    /// Apply the enable flag's current value, including at startup.
    pub fn startup(&self) {
        self.handle_flag_change();
    }

    /// The host reports the enable flag may have changed.
    pub fn handle_flag_change(&self) {
        let mut inner = self.lock();
        let enabled = self.flag.enabled();
        match (enabled, inner.state) {
            (true, EngineState::Disabled) => self.load_full(&mut inner),
            (false, state) if state != EngineState::Disabled => self.teardown(&mut inner),
            _ => {}
        }
    }

    pub fn state(&self) -> EngineState {
        self.lock().state
    }

    /// Watch-callback entry point for every subscribed path.
    pub fn handle_fs_event(&self, path: &Path, exists: bool) {
        let mut inner = self.lock();
        if inner.state == EngineState::Disabled {
            return;
        }
        if !inner.coordinator.should_process(path, exists) {
            return;
        }
        debug!(path = %path.display(), exists, "change notification");

        // config root lifecycle first: its disappearance invalidates every
        // subscription beneath it
        if path == self.config.config_root {
            if exists {
                inner.coordinator.clear_fallback();
                self.load_full(&mut inner);
            } else if let Err(e) = inner
                .coordinator
                .root_vanished(&self.config.config_root, &self.callback)
            {
                warn!(error = %e, "failed to retain config-root watch");
            }
            return;
        }

        if let Some(category) = Category::of_path(&self.config, path) {
            info!(path = %path.display(), %category, "directive file changed");
            self.reload_category(&mut inner, category);
            return;
        }

        match self.translator.to_namespace_path(path) {
            Ok(ns) => self.reload_namespace(&mut inner, &ns),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unclassifiable change notification")
            }
        }
    }

    // ── Passes (all run under the lock) ─────────────────────────────

    fn load_full(&self, inner: &mut Inner) {
        inner.state = EngineState::Loading;
        info!(config_root = %self.config.config_root.display(), "loading personalizations");

        inner.store.clear_all();
        inner.coordinator.unwatch_all();
        // leftovers from a previous run are stale by definition
        self.generator.purge_all();

        let mut directives = Vec::new();
        for category in Category::ALL {
            directives.extend(control::parse_control_file(&self.config, category));
        }
        let touched = self.replay(inner, &directives, None);
        inner.directives = directives;

        if let Err(e) = self.generator.write_enable_tag() {
            warn!(error = %e, "failed to write enabling tag");
        }
        self.regenerate(inner, &touched);
        self.resync_watches(inner);

        inner.state = EngineState::Ready;
        info!(namespaces = touched.len(), "personalizations loaded");
    }

    fn reload_category(&self, inner: &mut Inner, category: Category) {
        inner.state = EngineState::Loading;

        let dropped = inner.store.clear_category(category);
        inner.directives.retain(|d| d.category != category);
        let fresh = control::parse_control_file(&self.config, category);
        let touched = self.replay(inner, &fresh, None);
        inner.directives.extend(fresh);

        // regenerate everything this category used to cover or covers now
        let mut affected = dropped;
        for ns in touched {
            if !affected.contains(&ns) {
                affected.push(ns);
            }
        }
        self.regenerate(inner, &affected);
        self.resync_watches(inner);

        inner.state = EngineState::Ready;
        info!(%category, namespaces = affected.len(), "category reloaded");
    }

    fn reload_namespace(&self, inner: &mut Inner, ns: &NamespacePath) {
        inner.state = EngineState::Loading;
        info!(namespace = %ns, "source changed, rebuilding namespace");

        inner.store.clear(ns);
        let directives = std::mem::take(&mut inner.directives);
        let _ = self.replay(inner, &directives, Some(ns));
        inner.directives = directives;

        self.regenerate(inner, std::slice::from_ref(ns));
        self.resync_watches(inner);
        inner.state = EngineState::Ready;
    }

    fn teardown(&self, inner: &mut Inner) {
        info!("disabling personalization");
        inner.store.clear_all();
        inner.directives.clear();
        inner.notified_adds.clear();
        inner.coordinator.unwatch_all();
        // drops every artifact along with the enabling tag
        self.generator.purge_all();
        inner.state = EngineState::Disabled;
    }

    // ── Pass plumbing ───────────────────────────────────────────────

    /// Replay directives through the store, in order, optionally restricted
    /// to one namespace. Returns the namespaces that accepted a directive.
    fn replay(
        &self,
        inner: &mut Inner,
        directives: &[Directive],
        only: Option<&NamespacePath>,
    ) -> Vec<NamespacePath> {
        let mut touched: Vec<NamespacePath> = Vec::new();
        for directive in directives {
            if let Some(ns) = only {
                if &directive.target != ns {
                    continue;
                }
            }

            if directive.category == Category::Command && directive.kind == DirectiveKind::Add {
                let key = format!("{}|{}", directive.category, directive.raw);
                if inner.notified_adds.insert(key) {
                    self.sink.notify(&format!(
                        "personalization: ADD is not supported for command contexts \
                         (control line {}: {})",
                        directive.line, directive.raw
                    ));
                }
                continue;
            }

            match inner.store.apply_directive(self.registry.as_ref(), directive) {
                Ok(()) => {
                    if !touched.contains(&directive.target) {
                        touched.push(directive.target.clone());
                    }
                }
                Err(e) => {
                    warn!(
                        line = directive.line,
                        target = %directive.target,
                        error = %e,
                        "directive failed, continuing with the next one"
                    );
                }
            }
        }
        touched
    }

    fn regenerate(&self, inner: &Inner, namespaces: &[NamespacePath]) {
        if let Err(e) = self
            .generator
            .regenerate(self.registry.as_ref(), &inner.store, namespaces)
        {
            warn!(error = %e, "artifact regeneration failed");
        }
    }

    /// Recompute the full set of paths worth watching and reconcile the
    /// coordinator's table with it.
    fn resync_watches(&self, inner: &mut Inner) {
        let mut desired: Vec<PathBuf> = vec![self.config.config_root.clone()];
        for category in Category::ALL {
            desired.push(category.control_file(&self.config));
        }
        for directive in &inner.directives {
            if let Some(aux) = &directive.aux_file {
                if !desired.contains(aux) {
                    desired.push(aux.clone());
                }
            }
        }
        for record in inner.store.records() {
            if record.is_empty() {
                continue;
            }
            match self.translator.to_filesystem_path(record.namespace()) {
                Ok(source) => {
                    if !desired.contains(&source) {
                        desired.push(source);
                    }
                }
                Err(e) => {
                    warn!(namespace = %record.namespace(), error = %e, "cannot watch source file")
                }
            }
        }
        inner.coordinator.sync(&desired, &self.callback);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("personalization lock poisoned")
    }
}
