//! Process-wide decorator actions and caches, held by an explicit context
//! object rather than ambient globals.
//!
//! Every mapping here is written at most once per key. Independent workers
//! may race on the module decorator cache; both compute the same content, so
//! last-write-wins is harmless.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use sable_syntax::{Define, Expr, Reference};

use crate::environment::Environment;

/// What preprocessing should do with a decorator, keyed by its
/// fully-qualified name. Immutable once configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Leave every application of this decorator un-inlined.
    DoNotInline,
    /// Drop the decorator from definitions before analysis.
    Discard,
}

/// Per-run preprocessing configuration. Set once before any unit is
/// processed, read-only afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Configuration {
    pub actions: FxHashMap<Reference, FxHashSet<Action>>,
    pub enable_inlining: bool,
    pub enable_discarding: bool,
}

impl Configuration {
    pub fn new(enable_inlining: bool, enable_discarding: bool) -> Self {
        Configuration {
            actions: FxHashMap::default(),
            enable_inlining,
            enable_discarding,
        }
    }

    pub fn with_action(mut self, decorator: &str, action: Action) -> Self {
        self.actions
            .entry(Reference::parse(decorator))
            .or_default()
            .insert(action);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("preprocessing configuration was already set for this run")]
    AlreadySet,
}

/// Shared state for one analysis run.
#[derive(Default)]
pub struct InlineContext {
    configuration: RwLock<Option<Arc<Configuration>>>,
    original_decorators: RwLock<FxHashMap<Reference, Vec<Expr>>>,
    inlined_to_original: RwLock<FxHashMap<Reference, Reference>>,
    module_decorators: RwLock<FxHashMap<Reference, Arc<Vec<Define>>>>,
}

impl InlineContext {
    pub fn new() -> Self {
        InlineContext::default()
    }

    /// Write-once: a second call is a configuration error.
    pub fn set_configuration(&self, configuration: Configuration) -> Result<(), ConfigError> {
        let mut slot = self.configuration.write();
        if slot.is_some() {
            return Err(ConfigError::AlreadySet);
        }
        *slot = Some(Arc::new(configuration));
        Ok(())
    }

    pub fn configuration(&self) -> Option<Arc<Configuration>> {
        self.configuration.read().clone()
    }

    /// Actions registered for one fully-qualified decorator name.
    pub fn lookup_actions(&self, decorator: &Reference) -> FxHashSet<Action> {
        self.configuration()
            .and_then(|configuration| configuration.actions.get(decorator).cloned())
            .unwrap_or_default()
    }

    /// Whether any possible fully-qualified spelling of `decorator` carries
    /// one of `actions`. A decorator expression that cannot be resolved to a
    /// reference at all answers `true`: we cannot prove it safe to touch.
    pub fn has_any_action(&self, decorator: &Expr, actions: &[Action]) -> bool {
        let Some(reference) = decorator_reference(decorator) else {
            return true;
        };
        for candidate in possible_spellings(&reference) {
            let registered = self.lookup_actions(&candidate);
            if actions.iter().any(|action| registered.contains(action)) {
                return true;
            }
        }
        false
    }

    /// Filters `Discard`-actioned decorators out of a definition's decorator
    /// list. Pure filter: applying it twice equals applying it once.
    pub fn discard(&self, define: Define) -> Define {
        let mut define = define;
        define.decorators.retain(|decorator| {
            match decorator_reference(decorator) {
                // Unresolvable decorators are kept: conservative default.
                None => true,
                Some(reference) => !possible_spellings(&reference)
                    .iter()
                    .any(|candidate| self.lookup_actions(candidate).contains(&Action::Discard)),
            }
        });
        define
    }

    /// Records the decorator list a function had before transformation.
    /// First write wins.
    pub fn record_original_decorators(&self, function: &Reference, decorators: Vec<Expr>) {
        let mut map = self.original_decorators.write();
        map.entry(function.clone()).or_insert(decorators);
    }

    pub fn original_decorators(&self, function: &Reference) -> Option<Vec<Expr>> {
        self.original_decorators.read().get(function).cloned()
    }

    /// Maps a synthesized wrapper's fully-qualified name back to the outer
    /// decorator reference it was inlined from.
    pub fn record_inlined_original(&self, inlined: &Reference, decorator: &Reference) {
        let mut map = self.inlined_to_original.write();
        map.entry(inlined.clone()).or_insert_with(|| decorator.clone());
    }

    pub fn original_for_inlined(&self, inlined: &Reference) -> Option<Reference> {
        self.inlined_to_original.read().get(inlined).cloned()
    }

    /// Function definitions in `module` that contain nested definitions,
    /// i.e. candidate decorators and decorator factories. Fetched lazily and
    /// memoized for the rest of the run.
    pub fn cache_module_decorators(
        &self,
        module: &Reference,
        environment: &dyn Environment,
    ) -> Option<Arc<Vec<Define>>> {
        {
            let cache = self.module_decorators.read();
            if let Some(defines) = cache.get(module) {
                return Some(defines.clone());
            }
        }
        let unit = environment.get_source(module)?;
        let defines: Vec<Define> = unit
            .top_level_defines()
            .into_iter()
            .filter(|define| define.contains_nested_defines())
            .cloned()
            .collect();
        let defines = Arc::new(defines);
        let mut cache = self.module_decorators.write();
        // A concurrent worker may have filled the slot with identical
        // content; keep whichever write lands last.
        cache.insert(module.clone(), defines.clone());
        Some(defines)
    }
}

/// Resolves a decorator expression to the reference naming the decorator:
/// a factory application resolves to its callee.
pub fn decorator_reference(decorator: &Expr) -> Option<Reference> {
    match decorator {
        Expr::Call { callee, .. } => callee.as_reference(),
        _ => decorator.as_reference(),
    }
}

/// The spellings under which a decorator may have been registered: its full
/// dotted form, plus the bare final name for same-module decorators.
fn possible_spellings(reference: &Reference) -> Vec<Reference> {
    let mut spellings = vec![reference.clone()];
    if reference.len() > 1 {
        if let Some(last) = reference.last() {
            spellings.push(Reference::single(last));
        }
    }
    spellings
}
