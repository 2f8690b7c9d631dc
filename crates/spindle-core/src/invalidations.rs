//! Invalidation ledger.
//!
//! Records, for every resolving file and every config request, which
//! filesystem, environment and option changes must throw away a cached result.
//! Entries only ever grow: an edge that no longer matters costs a spurious
//! rebuild, a missing edge costs a stale build.

use crate::config_request::ConfigRequest;
use serde::{Deserialize, Serialize};
use spindle_util::fs::normalize_path;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A dependency on a file that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CreateInvalidation {
    /// A path matching the glob `pattern` is created inside `dir`.
    Pattern { dir: PathBuf, pattern: String },
    /// A file named `file_name` is created in `above` or any of its ancestors.
    FileNameAbove { file_name: String, above: PathBuf },
}

impl CreateInvalidation {
    /// Invalidate when the literal name `name` appears in `dir`.
    #[must_use]
    pub fn file(dir: impl Into<PathBuf>, name: &str) -> Self {
        Self::Pattern {
            dir: dir.into(),
            pattern: glob::Pattern::escape(name),
        }
    }

    /// Invalidate when a path matching `pattern` appears in `dir`.
    #[must_use]
    pub fn pattern(dir: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self::Pattern {
            dir: dir.into(),
            pattern: pattern.into(),
        }
    }

    /// Invalidate when `file_name` appears in `above` or one of its ancestors.
    #[must_use]
    pub fn file_name_above(file_name: impl Into<String>, above: impl Into<PathBuf>) -> Self {
        Self::FileNameAbove {
            file_name: file_name.into(),
            above: above.into(),
        }
    }

    /// Whether creating `created` triggers this invalidation.
    #[must_use]
    pub fn matches(&self, created: &Path) -> bool {
        let created = normalize_path(created);
        match self {
            Self::Pattern { dir, pattern } => {
                let Ok(rel) = created.strip_prefix(dir) else {
                    return false;
                };
                // Creating a nested path also creates each of its parents
                let compiled = glob::Pattern::new(pattern).ok();
                let mut prefix = String::new();
                for component in rel.components() {
                    if !prefix.is_empty() {
                        prefix.push('/');
                    }
                    prefix.push_str(&component.as_os_str().to_string_lossy());
                    let hit = match &compiled {
                        Some(p) => p.matches(&prefix),
                        None => prefix == *pattern,
                    };
                    if hit {
                        return true;
                    }
                }
                false
            }
            Self::FileNameAbove { file_name, above } => above
                .ancestors()
                .any(|dir| created == dir.join(file_name)),
        }
    }
}

/// What must invalidate one cached result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invalidations {
    pub invalidate_on_file_change: BTreeSet<PathBuf>,
    pub invalidate_on_file_create: BTreeSet<CreateInvalidation>,
    pub invalidate_on_startup: bool,
}

impl Invalidations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.invalidate_on_file_change.is_empty()
            && self.invalidate_on_file_create.is_empty()
            && !self.invalidate_on_startup
    }

    pub fn invalidate_on_file_change(&mut self, path: impl Into<PathBuf>) {
        self.invalidate_on_file_change.insert(path.into());
    }

    pub fn invalidate_on_file_create(&mut self, invalidation: CreateInvalidation) {
        self.invalidate_on_file_create.insert(invalidation);
    }

    /// Add everything `other` depends on.
    pub fn extend(&mut self, other: &Self) {
        self.invalidate_on_file_change
            .extend(other.invalidate_on_file_change.iter().cloned());
        self.invalidate_on_file_create
            .extend(other.invalidate_on_file_create.iter().cloned());
        self.invalidate_on_startup |= other.invalidate_on_startup;
    }

    /// Whether a change to `path` invalidates the entry.
    #[must_use]
    pub fn is_invalidated_by_change(&self, path: &Path) -> bool {
        self.invalidate_on_file_change
            .contains(&normalize_path(path))
    }

    /// Whether creating `path` invalidates the entry.
    #[must_use]
    pub fn is_invalidated_by_create(&self, path: &Path) -> bool {
        self.invalidate_on_file_create
            .iter()
            .any(|c| c.matches(path))
    }
}

/// Something that happened between two builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationEvent {
    FileChanged(PathBuf),
    FileCreated(PathBuf),
    /// A file was deleted; treated like a change of that file.
    FileDeleted(PathBuf),
    EnvChanged(String),
    OptionChanged(String),
    Startup,
    Build,
}

/// Ledger entries hit by an [`InvalidationEvent`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Affected {
    /// Ledger keys of resolving files.
    pub paths: Vec<PathBuf>,
    /// Config request ids.
    pub configs: Vec<String>,
}

impl Affected {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.configs.is_empty()
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    paths: HashMap<PathBuf, Invalidations>,
    configs: HashMap<String, ConfigRequest>,
}

/// Shared, append-only store of invalidations for one build session.
///
/// Path entries are keyed by the project-relative path of the resolving file
/// (files outside the project keep their absolute path). Appends are
/// serialized by a mutex and merged, never overwritten.
#[derive(Debug)]
pub struct InvalidationLedger {
    project_root: PathBuf,
    state: Mutex<LedgerState>,
}

impl InvalidationLedger {
    #[must_use]
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: normalize_path(&project_root.into()),
            state: Mutex::new(LedgerState::default()),
        }
    }

    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Ledger key for `path`.
    #[must_use]
    pub fn key_for(&self, path: &Path) -> PathBuf {
        let path = normalize_path(path);
        if !path.is_absolute() {
            return path;
        }
        match path.strip_prefix(&self.project_root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => path,
        }
    }

    /// Merge `invalidations` into the entry for `path`.
    pub fn record(&self, path: &Path, invalidations: &Invalidations) {
        let key = self.key_for(path);
        let mut state = self.state.lock().unwrap();
        state.paths.entry(key).or_default().extend(invalidations);
    }

    /// The entry for `path`, empty if nothing was recorded.
    #[must_use]
    pub fn get(&self, path: &Path) -> Invalidations {
        let key = self.key_for(path);
        let state = self.state.lock().unwrap();
        state.paths.get(&key).cloned().unwrap_or_default()
    }

    /// Merge a config request's invalidation fields into the entry for its id.
    pub fn record_config(&self, request: &ConfigRequest) {
        let mut state = self.state.lock().unwrap();
        state
            .configs
            .entry(request.id.clone())
            .and_modify(|existing| existing.merge(request))
            .or_insert_with(|| request.clone());
    }

    /// The accumulated config request for `id`.
    #[must_use]
    pub fn config(&self, id: &str) -> Option<ConfigRequest> {
        self.state.lock().unwrap().configs.get(id).cloned()
    }

    /// Every entry affected by `event`, sorted for determinism.
    #[must_use]
    pub fn affected_by(&self, event: &InvalidationEvent) -> Affected {
        let state = self.state.lock().unwrap();

        let mut paths: Vec<PathBuf> = state
            .paths
            .iter()
            .filter(|(_, inv)| match event {
                InvalidationEvent::FileChanged(p) | InvalidationEvent::FileDeleted(p) => {
                    inv.is_invalidated_by_change(p)
                }
                InvalidationEvent::FileCreated(p) => inv.is_invalidated_by_create(p),
                InvalidationEvent::Startup => inv.invalidate_on_startup,
                _ => false,
            })
            .map(|(key, _)| key.clone())
            .collect();
        paths.sort();

        let mut configs: Vec<String> = state
            .configs
            .values()
            .filter(|req| req.is_invalidated_by(event))
            .map(|req| req.id.clone())
            .collect();
        configs.sort();

        Affected { paths, configs }
    }

    /// Resolving files invalidated by a change to `path`.
    #[must_use]
    pub fn invalidated_by_change(&self, path: &Path) -> Vec<PathBuf> {
        self.affected_by(&InvalidationEvent::FileChanged(path.to_path_buf()))
            .paths
    }

    /// Resolving files invalidated by the creation of `path`.
    #[must_use]
    pub fn invalidated_by_create(&self, path: &Path) -> Vec<PathBuf> {
        self.affected_by(&InvalidationEvent::FileCreated(path.to_path_buf()))
            .paths
    }

    /// Path entries and config ids that must be recomputed on every start.
    #[must_use]
    pub fn startup_entries(&self) -> Affected {
        self.affected_by(&InvalidationEvent::Startup)
    }

    /// Config requests that read the environment variable `key`.
    #[must_use]
    pub fn config_ids_for_env(&self, key: &str) -> Vec<String> {
        self.affected_by(&InvalidationEvent::EnvChanged(key.to_string()))
            .configs
    }

    /// Config requests that read the option `key`.
    #[must_use]
    pub fn config_ids_for_option(&self, key: &str) -> Vec<String> {
        self.affected_by(&InvalidationEvent::OptionChanged(key.to_string()))
            .configs
    }

    /// Number of path entries plus config entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.paths.len() + state.configs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop everything. Only for a full re-initialization.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        state.paths.clear();
        state.configs.clear();
    }
}
