use crate::config_request::{ConfigLookup, ConfigRequest, ConfigRequestRunner};
use crate::error::Error;
use crate::lookup::find_project_root;
use crate::resolver::{
    EntryField, ExportsConditions, IncludeNodeModules, ResolverConfig, ResolverMode,
};
use serde::{Deserialize, Serialize};
use spindle_util::fs::FileSystem;
use std::path::{Path, PathBuf};

/// Name of the project config file.
pub const CONFIG_FILE_NAME: &str = "spindle.config.json";

/// Id of the config request that loads [`ProjectConfig`].
pub const CONFIG_REQUEST_ID: &str = "spindle:project-config";

/// Runtime configuration for the spindle CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory.
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }

    /// The project root above `cwd`.
    pub fn project_root(&self, fs: &dyn FileSystem) -> Result<PathBuf, Error> {
        find_project_root(fs, &self.cwd).ok_or_else(|| Error::ProjectNotFound {
            start: self.cwd.clone(),
        })
    }
}

/// Build settings from `spindle.config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectConfig {
    pub extensions: Option<Vec<String>>,
    pub entries: Option<Vec<EntryField>>,
    /// Export condition names, e.g. `["browser", "production"]`.
    pub conditions: Vec<String>,
    pub include_node_modules: Option<IncludeNodeModules>,
    pub mode: ResolverMode,
    pub search_outside_project_root: bool,
    pub builtins: Vec<String>,
    pub externals: Vec<String>,
    /// Worker threads for builds.
    pub threads: Option<usize>,
}

/// A [`ProjectConfig`] together with where it came from.
#[derive(Debug, Clone)]
pub struct LoadedProjectConfig {
    pub config: ProjectConfig,
    /// `None` when the project has no config file.
    pub path: Option<PathBuf>,
    /// The config request with its recorded dependencies.
    pub request: ConfigRequest,
}

impl ProjectConfig {
    /// Load the project config through `runner`, searching upward from
    /// `search_from` to the runner's project root.
    ///
    /// A missing file yields the defaults; the request still records the
    /// create invalidation so adding the file later is noticed.
    pub fn load(runner: &ConfigRequestRunner, search_from: &Path) -> Result<LoadedProjectConfig, Error> {
        let lookup = ConfigLookup {
            file_names: vec![CONFIG_FILE_NAME.to_string()],
            search_from: search_from.to_path_buf(),
            ..ConfigLookup::default()
        };
        let result = runner.run(ConfigRequest::new(CONFIG_REQUEST_ID), &lookup)?;

        let config = match (&result.config_path, result.contents) {
            (Some(path), Some(contents)) => {
                serde_json::from_value(contents).map_err(|e| Error::ConfigInvalid {
                    path: path.clone(),
                    message: e.to_string(),
                })?
            }
            _ => Self::default(),
        };

        Ok(LoadedProjectConfig {
            config,
            path: result.config_path,
            request: result.request,
        })
    }

    /// Resolver configuration for `project_root` with these settings applied.
    pub fn resolver_config(&self, project_root: &Path) -> Result<ResolverConfig, Error> {
        let conditions =
            ExportsConditions::parse_list(&self.conditions).map_err(|name| Error::ConfigInvalid {
                path: project_root.join(CONFIG_FILE_NAME),
                message: format!("unknown export condition '{name}'"),
            })?;

        let mut config = ResolverConfig::new(project_root)
            .with_mode(self.mode)
            .with_conditions(conditions)
            .with_search_outside_project_root(self.search_outside_project_root)
            .with_builtins(self.builtins.iter().cloned())
            .with_externals(self.externals.iter().cloned());

        if let Some(extensions) = &self.extensions {
            config = config.with_extensions(extensions.iter().cloned());
        }
        if let Some(entries) = &self.entries {
            config = config.with_entries(entries.clone());
        }
        if let Some(include) = &self.include_node_modules {
            config = config.with_include_node_modules(include.clone());
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invalidations::InvalidationLedger;
    use spindle_util::InMemoryFileSystem;
    use std::sync::Arc;

    fn runner(fs: &Arc<InMemoryFileSystem>, ledger: &Arc<InvalidationLedger>) -> ConfigRequestRunner {
        ConfigRequestRunner::new(fs.clone(), "/p", Arc::clone(ledger))
    }

    #[test]
    fn test_config_builder() {
        let config = Config::new(PathBuf::from("/p"))
            .with_verbosity(2)
            .with_json_logs(true);
        assert_eq!(config.cwd, PathBuf::from("/p"));
        assert_eq!(config.verbosity, 2);
        assert!(config.json_logs);
    }

    #[test]
    fn test_project_root_lookup() {
        let fs = InMemoryFileSystem::new();
        fs.write_file("/p/package.json", "{}");
        fs.create_dir("/p/src/deep");

        let config = Config::new(PathBuf::from("/p/src/deep"));
        assert_eq!(config.project_root(&fs).unwrap(), PathBuf::from("/p"));

        let config = Config::new(PathBuf::from("/elsewhere"));
        assert!(matches!(
            config.project_root(&fs),
            Err(Error::ProjectNotFound { .. })
        ));
    }

    #[test]
    fn test_load_missing_config_uses_defaults() {
        let fs = Arc::new(InMemoryFileSystem::new());
        fs.create_dir("/p/src");
        let ledger = Arc::new(InvalidationLedger::new("/p"));

        let loaded = ProjectConfig::load(&runner(&fs, &ledger), Path::new("/p/src")).unwrap();
        assert_eq!(loaded.config, ProjectConfig::default());
        assert!(loaded.path.is_none());
        assert!(loaded
            .request
            .invalidate_on_file_create
            .iter()
            .any(|c| c.matches(Path::new("/p/spindle.config.json"))));
        assert!(ledger.config(CONFIG_REQUEST_ID).is_some());
    }

    #[test]
    fn test_load_and_apply() {
        let fs = Arc::new(InMemoryFileSystem::new());
        fs.write_file(
            "/p/spindle.config.json",
            r#"{
                "extensions": [".js", ".ts"],
                "entries": ["main"],
                "conditions": ["browser", "production"],
                "includeNodeModules": {"lodash": true},
                "mode": "bundler",
                "externals": ["react"],
                "threads": 4
            }"#,
        );
        let ledger = Arc::new(InvalidationLedger::new("/p"));

        let loaded = ProjectConfig::load(&runner(&fs, &ledger), Path::new("/p")).unwrap();
        assert_eq!(loaded.path, Some(PathBuf::from("/p/spindle.config.json")));
        assert_eq!(loaded.config.threads, Some(4));
        assert!(loaded
            .request
            .invalidate_on_file_change
            .contains(Path::new("/p/spindle.config.json")));

        let resolver = loaded.config.resolver_config(Path::new("/p")).unwrap();
        assert_eq!(resolver.extensions, vec![".js".to_string(), ".ts".to_string()]);
        assert_eq!(resolver.entries, vec![EntryField::Main]);
        assert_eq!(resolver.mode, ResolverMode::Bundler);
        assert!(resolver.conditions.contains(ExportsConditions::BROWSER));
        assert!(resolver.conditions.contains(ExportsConditions::PRODUCTION));
        assert!(!resolver.include_node_modules.includes("react"));
        assert!(resolver.externals.contains("react"));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let fs = Arc::new(InMemoryFileSystem::new());
        fs.write_file("/p/spindle.config.json", r#"{"extentions": [".ts"]}"#);
        let ledger = Arc::new(InvalidationLedger::new("/p"));

        let err = ProjectConfig::load(&runner(&fs, &ledger), Path::new("/p")).unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid { .. }));
    }

    #[test]
    fn test_unknown_condition_is_rejected() {
        let config = ProjectConfig {
            conditions: vec!["nonsense".to_string()],
            ..ProjectConfig::default()
        };
        assert!(matches!(
            config.resolver_config(Path::new("/p")),
            Err(Error::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn test_malformed_json_is_a_config_request_error() {
        let fs = Arc::new(InMemoryFileSystem::new());
        fs.write_file("/p/spindle.config.json", "{ nope");
        let ledger = Arc::new(InvalidationLedger::new("/p"));

        let err = ProjectConfig::load(&runner(&fs, &ledger), Path::new("/p")).unwrap_err();
        assert!(matches!(err, Error::ConfigRequest(_)));
    }
}
