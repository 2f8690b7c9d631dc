//! Config requests.
//!
//! A config request is a named, declarative config load. Running one locates
//! the config file, reads the keys, environment variables and options it
//! asks for, and records each of those reads as an invalidation of the
//! request so the loaded config can be cached across builds.

use crate::invalidations::{CreateInvalidation, InvalidationEvent, InvalidationLedger};
use crate::lookup::find_ancestor_file;
use crate::probe::Probe;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use spindle_util::fs::{normalize_path, FileSystem};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Error codes for config requests.
pub mod codes {
    pub const CONFIG_IO: &str = "CONFIG_IO";
    pub const CONFIG_PARSE: &str = "CONFIG_PARSE";
    pub const CONFIG_INVALID_ID: &str = "CONFIG_INVALID_ID";
}

#[derive(Error, Debug)]
pub enum ConfigRequestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("config request id must not be empty")]
    InvalidId,
}

impl ConfigRequestError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => codes::CONFIG_IO,
            Self::Parse { .. } => codes::CONFIG_PARSE,
            Self::InvalidId => codes::CONFIG_INVALID_ID,
        }
    }
}

/// A dependency on one top-level key of a config file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConfigKeyChange {
    pub file_path: PathBuf,
    pub config_key: String,
}

/// A config load and everything it depends on.
///
/// Identity is `id`: two requests with the same id are the same logical load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRequest {
    pub id: String,
    pub invalidate_on_file_change: BTreeSet<PathBuf>,
    pub invalidate_on_config_key_change: BTreeSet<ConfigKeyChange>,
    pub invalidate_on_file_create: BTreeSet<CreateInvalidation>,
    pub invalidate_on_env_change: BTreeSet<String>,
    pub invalidate_on_option_change: BTreeSet<String>,
    pub invalidate_on_startup: bool,
    pub invalidate_on_build: bool,
}

impl ConfigRequest {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Add every dependency of `other`.
    pub fn merge(&mut self, other: &Self) {
        self.invalidate_on_file_change
            .extend(other.invalidate_on_file_change.iter().cloned());
        self.invalidate_on_config_key_change
            .extend(other.invalidate_on_config_key_change.iter().cloned());
        self.invalidate_on_file_create
            .extend(other.invalidate_on_file_create.iter().cloned());
        self.invalidate_on_env_change
            .extend(other.invalidate_on_env_change.iter().cloned());
        self.invalidate_on_option_change
            .extend(other.invalidate_on_option_change.iter().cloned());
        self.invalidate_on_startup |= other.invalidate_on_startup;
        self.invalidate_on_build |= other.invalidate_on_build;
    }

    /// Whether `event` invalidates this request.
    ///
    /// A change to a file read key by key invalidates conservatively: the
    /// event does not say which keys changed.
    #[must_use]
    pub fn is_invalidated_by(&self, event: &InvalidationEvent) -> bool {
        match event {
            InvalidationEvent::FileChanged(path) | InvalidationEvent::FileDeleted(path) => {
                let path = normalize_path(path);
                self.invalidate_on_file_change.contains(&path)
                    || self
                        .invalidate_on_config_key_change
                        .iter()
                        .any(|c| c.file_path == path)
            }
            InvalidationEvent::FileCreated(path) => self
                .invalidate_on_file_create
                .iter()
                .any(|c| c.matches(path)),
            InvalidationEvent::EnvChanged(key) => self.invalidate_on_env_change.contains(key),
            InvalidationEvent::OptionChanged(key) => {
                self.invalidate_on_option_change.contains(key)
            }
            InvalidationEvent::Startup => self.invalidate_on_startup,
            InvalidationEvent::Build => self.invalidate_on_build,
        }
    }

    #[must_use]
    pub fn cache_policy(&self) -> CachePolicy {
        if self.invalidate_on_build {
            CachePolicy::Build
        } else if self.invalidate_on_startup {
            CachePolicy::Startup
        } else {
            CachePolicy::Cached
        }
    }
}

/// How long the result of a config request may be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Until one of the recorded invalidations fires.
    Cached,
    /// Re-evaluate on every process start.
    Startup,
    /// Re-evaluate on every build.
    Build,
}

/// What a config request reads.
#[derive(Debug, Clone, Default)]
pub struct ConfigLookup {
    /// Candidate config file names, in priority order.
    pub file_names: Vec<String>,
    /// Directory the ancestor search starts from.
    pub search_from: PathBuf,
    /// Top-level keys to read. Empty means the whole file is used.
    pub config_keys: Vec<String>,
    pub env_keys: Vec<String>,
    pub option_keys: Vec<String>,
    /// The loaded config cannot be cached within a process (e.g. it is code).
    pub invalidate_on_build: bool,
}

/// Outcome of [`ConfigRequestRunner::run`].
#[derive(Debug, Clone)]
pub struct ConfigResult {
    /// The request with every recorded dependency.
    pub request: ConfigRequest,
    /// The config file found, if any.
    pub config_path: Option<PathBuf>,
    /// The whole parsed file, when no keys were requested.
    pub contents: Option<Value>,
    /// Requested keys present in the file.
    pub values: BTreeMap<String, Value>,
    /// Requested environment variables that are set.
    pub env: BTreeMap<String, String>,
    /// Requested options that are set.
    pub options: BTreeMap<String, Value>,
    pub cache_policy: CachePolicy,
}

/// Runs [`ConfigRequest`]s against a filesystem, environment and option set,
/// recording the resulting dependencies in a ledger.
#[derive(Debug)]
pub struct ConfigRequestRunner {
    fs: Arc<dyn FileSystem>,
    project_root: PathBuf,
    env: BTreeMap<String, String>,
    options: BTreeMap<String, Value>,
    ledger: Arc<InvalidationLedger>,
}

impl ConfigRequestRunner {
    #[must_use]
    pub fn new(
        fs: Arc<dyn FileSystem>,
        project_root: impl Into<PathBuf>,
        ledger: Arc<InvalidationLedger>,
    ) -> Self {
        Self {
            fs,
            project_root: normalize_path(&project_root.into()),
            env: BTreeMap::new(),
            options: BTreeMap::new(),
            ledger,
        }
    }

    /// Environment visible to requests.
    #[must_use]
    pub fn with_env(mut self, env: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env = env.into_iter().collect();
        self
    }

    /// Options visible to requests.
    #[must_use]
    pub fn with_options(mut self, options: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.options = options.into_iter().collect();
        self
    }

    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Run one request.
    ///
    /// The request's dependencies are recorded in the ledger even when the
    /// config file turns out to be unreadable or malformed, so fixing it
    /// invalidates the request.
    pub fn run(
        &self,
        request: ConfigRequest,
        lookup: &ConfigLookup,
    ) -> Result<ConfigResult, ConfigRequestError> {
        if request.id.trim().is_empty() {
            return Err(ConfigRequestError::InvalidId);
        }

        let mut request = request;
        request.invalidate_on_build |= lookup.invalidate_on_build;

        let loaded = self.load_file(&mut request, lookup);

        let mut env = BTreeMap::new();
        for key in &lookup.env_keys {
            request.invalidate_on_env_change.insert(key.clone());
            if let Some(value) = self.env.get(key) {
                env.insert(key.clone(), value.clone());
            }
        }

        let mut options = BTreeMap::new();
        for key in &lookup.option_keys {
            request.invalidate_on_option_change.insert(key.clone());
            if let Some(value) = self.options.get(key) {
                options.insert(key.clone(), value.clone());
            }
        }

        self.ledger.record_config(&request);

        let (config_path, contents, values) = loaded?;
        let cache_policy = request.cache_policy();

        Ok(ConfigResult {
            request,
            config_path,
            contents,
            values,
            env,
            options,
            cache_policy,
        })
    }

    #[allow(clippy::type_complexity)]
    fn load_file(
        &self,
        request: &mut ConfigRequest,
        lookup: &ConfigLookup,
    ) -> Result<(Option<PathBuf>, Option<Value>, BTreeMap<String, Value>), ConfigRequestError>
    {
        if lookup.file_names.is_empty() {
            return Ok((None, None, BTreeMap::new()));
        }

        let search_from = if lookup.search_from.as_os_str().is_empty() {
            self.project_root.clone()
        } else {
            normalize_path(&lookup.search_from)
        };

        let probe = Probe::new(self.fs.as_ref());
        let names: Vec<&str> = lookup.file_names.iter().map(String::as_str).collect();
        let found = find_ancestor_file(&probe, &names, &search_from, &self.project_root);
        request
            .invalidate_on_file_create
            .extend(probe.into_invalidations().invalidate_on_file_create);

        let Some(path) = found else {
            return Ok((None, None, BTreeMap::new()));
        };

        let is_json = path.extension().is_some_and(|ext| ext == "json");
        if !is_json {
            // Only JSON is evaluated here; anything else must be re-read
            // by its consumer on every start.
            request.invalidate_on_file_change.insert(path.clone());
            request.invalidate_on_startup = true;
            return Ok((Some(path), None, BTreeMap::new()));
        }

        let read = self.fs.read_to_string(&path);
        let text = match read {
            Ok(text) => text,
            Err(source) => {
                request.invalidate_on_file_change.insert(path.clone());
                return Err(ConfigRequestError::Io { path, source });
            }
        };

        let parsed: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(source) => {
                request.invalidate_on_file_change.insert(path.clone());
                return Err(ConfigRequestError::Parse { path, source });
            }
        };

        if lookup.config_keys.is_empty() {
            request.invalidate_on_file_change.insert(path.clone());
            return Ok((Some(path), Some(parsed), BTreeMap::new()));
        }

        let mut values = BTreeMap::new();
        for key in &lookup.config_keys {
            request.invalidate_on_config_key_change.insert(ConfigKeyChange {
                file_path: path.clone(),
                config_key: key.clone(),
            });
            if let Some(value) = parsed.get(key) {
                values.insert(key.clone(), value.clone());
            }
        }

        Ok((Some(path), None, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use spindle_util::InMemoryFileSystem;

    fn runner(fs: InMemoryFileSystem) -> (ConfigRequestRunner, Arc<InvalidationLedger>) {
        let ledger = Arc::new(InvalidationLedger::new("/p"));
        let runner = ConfigRequestRunner::new(Arc::new(fs), "/p", Arc::clone(&ledger));
        (runner, ledger)
    }

    fn lookup(names: &[&str], from: &str) -> ConfigLookup {
        ConfigLookup {
            file_names: names.iter().map(ToString::to_string).collect(),
            search_from: PathBuf::from(from),
            ..Default::default()
        }
    }

    #[test]
    fn test_whole_file_load_records_change() {
        let fs = InMemoryFileSystem::new();
        fs.write_file("/p/.babelrc.json", r#"{"presets": ["env"]}"#);
        fs.create_dir("/p/src");
        let (runner, ledger) = runner(fs);

        let result = runner
            .run(ConfigRequest::new("babel"), &lookup(&[".babelrc.json"], "/p/src"))
            .unwrap();

        assert_eq!(result.config_path, Some(PathBuf::from("/p/.babelrc.json")));
        assert_eq!(result.contents, Some(json!({"presets": ["env"]})));
        assert_eq!(result.cache_policy, CachePolicy::Cached);
        assert!(result
            .request
            .invalidate_on_file_change
            .contains(Path::new("/p/.babelrc.json")));
        // A closer config created later must win
        assert!(result
            .request
            .is_invalidated_by(&InvalidationEvent::FileCreated("/p/src/.babelrc.json".into())));
        assert_eq!(ledger.config("babel"), Some(result.request));
    }

    #[test]
    fn test_key_level_invalidation() {
        let fs = InMemoryFileSystem::new();
        fs.write_file("/p/package.json", r#"{"name": "app", "browserslist": ["defaults"]}"#);
        let (runner, _) = runner(fs);

        let mut lk = lookup(&["package.json"], "/p");
        lk.config_keys = vec!["browserslist".into(), "missing".into()];
        let result = runner.run(ConfigRequest::new("targets"), &lk).unwrap();

        assert_eq!(result.values.len(), 1);
        assert_eq!(result.values["browserslist"], json!(["defaults"]));
        assert!(result.request.invalidate_on_file_change.is_empty());
        assert_eq!(result.request.invalidate_on_config_key_change.len(), 2);
    }

    #[test]
    fn test_env_and_option_reads_are_recorded() {
        let (runner, ledger) = runner(InMemoryFileSystem::new());
        let runner = runner
            .with_env([("NODE_ENV".to_string(), "production".to_string())])
            .with_options([("mode".to_string(), json!("development"))]);

        let lk = ConfigLookup {
            env_keys: vec!["NODE_ENV".into(), "UNSET".into()],
            option_keys: vec!["mode".into()],
            ..Default::default()
        };
        let result = runner.run(ConfigRequest::new("env"), &lk).unwrap();

        assert_eq!(result.env.get("NODE_ENV").map(String::as_str), Some("production"));
        assert!(!result.env.contains_key("UNSET"));
        assert_eq!(result.options["mode"], json!("development"));
        assert_eq!(ledger.config_ids_for_env("UNSET"), vec!["env".to_string()]);
        assert_eq!(ledger.config_ids_for_option("mode"), vec!["env".to_string()]);
    }

    #[test]
    fn test_non_json_config_is_startup_only() {
        let fs = InMemoryFileSystem::new();
        fs.write_file("/p/postcss.config.js", "module.exports = {}");
        let (runner, _) = runner(fs);

        let result = runner
            .run(
                ConfigRequest::new("postcss"),
                &lookup(&["postcss.config.json", "postcss.config.js"], "/p"),
            )
            .unwrap();

        assert_eq!(result.config_path, Some(PathBuf::from("/p/postcss.config.js")));
        assert_eq!(result.cache_policy, CachePolicy::Startup);
    }

    #[test]
    fn test_build_wins_over_startup() {
        let mut request = ConfigRequest::new("x");
        request.invalidate_on_startup = true;
        request.invalidate_on_build = true;
        assert_eq!(request.cache_policy(), CachePolicy::Build);
    }

    #[test]
    fn test_parse_error_still_records_dependency() {
        let fs = InMemoryFileSystem::new();
        fs.write_file("/p/spindle.config.json", "{ not json");
        let (runner, ledger) = runner(fs);

        let err = runner
            .run(ConfigRequest::new("spindle"), &lookup(&["spindle.config.json"], "/p"))
            .unwrap_err();
        assert_eq!(err.code(), codes::CONFIG_PARSE);

        let recorded = ledger.config("spindle").unwrap();
        assert!(recorded
            .invalidate_on_file_change
            .contains(Path::new("/p/spindle.config.json")));
    }

    #[test]
    fn test_empty_id_is_rejected() {
        let (runner, ledger) = runner(InMemoryFileSystem::new());
        let err = runner
            .run(ConfigRequest::new("  "), &ConfigLookup::default())
            .unwrap_err();
        assert!(matches!(err, ConfigRequestError::InvalidId));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_repeated_runs_merge_in_ledger() {
        let (runner, ledger) = runner(InMemoryFileSystem::new());

        let first = ConfigLookup {
            env_keys: vec!["A".into()],
            ..Default::default()
        };
        let second = ConfigLookup {
            env_keys: vec!["B".into()],
            ..Default::default()
        };
        runner.run(ConfigRequest::new("same"), &first).unwrap();
        runner.run(ConfigRequest::new("same"), &second).unwrap();

        let recorded = ledger.config("same").unwrap();
        assert_eq!(recorded.invalidate_on_env_change.len(), 2);
    }
}
