pub mod build;
pub mod graph;
pub mod hash;
pub mod invalidations;
pub mod resolve;
pub mod threads;
pub mod version;

use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use spindle_core::{
    Config, ConfigRequestRunner, InvalidationLedger, LoadedProjectConfig, ProjectConfig, Resolver,
    SCHEMA_VERSION,
};
use spindle_util::fs::normalize_path;
use spindle_util::{FileSystem, OsFileSystem};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// A project opened from the working directory: its root, config and a
/// resolver sharing one invalidation ledger with the config loader.
pub struct Project {
    pub cwd: PathBuf,
    pub root: PathBuf,
    pub config: LoadedProjectConfig,
    pub resolver: Arc<Resolver>,
}

/// Stable CLI error codes.
pub mod codes {
    pub const CLI_INVALID_ARGUMENT: &str = "CLI_INVALID_ARGUMENT";
    pub const CLI_FILE_NOT_FOUND: &str = "CLI_FILE_NOT_FOUND";
    pub const CLI_IO_ERROR: &str = "CLI_IO_ERROR";
    pub const PROJECT_NOT_FOUND: &str = "PROJECT_NOT_FOUND";
    pub const PROJECT_CONFIG_INVALID: &str = "PROJECT_CONFIG_INVALID";
}

/// A failure reported with a stable code.
#[derive(Debug)]
pub struct CliError {
    pub code: &'static str,
    pub message: String,
}

impl CliError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Print and exit.
    pub fn exit(self, json: bool) -> ! {
        fail(json, self.code, self.message)
    }
}

impl From<spindle_core::Error> for CliError {
    fn from(err: spindle_core::Error) -> Self {
        let code = match err {
            spindle_core::Error::ProjectNotFound { .. } => codes::PROJECT_NOT_FOUND,
            _ => codes::PROJECT_CONFIG_INVALID,
        };
        Self::new(code, err.to_string())
    }
}

impl Project {
    pub fn open(config: &Config) -> Result<Self, CliError> {
        let fs: Arc<dyn FileSystem> = Arc::new(OsFileSystem);
        let cwd = dunce::canonicalize(&config.cwd).map_err(|e| {
            CliError::new(codes::CLI_FILE_NOT_FOUND, format!("cannot open {}: {e}", config.cwd.display()))
        })?;

        let root = Config::new(cwd.clone()).project_root(fs.as_ref())?;
        let ledger = Arc::new(InvalidationLedger::new(root.clone()));

        let runner = ConfigRequestRunner::new(Arc::clone(&fs), root.clone(), Arc::clone(&ledger));
        let loaded = ProjectConfig::load(&runner, &cwd)?;
        let resolver_config = loaded.config.resolver_config(&root)?;
        debug!(
            root = %root.display(),
            config = ?loaded.path,
            "opened project"
        );

        Ok(Self {
            cwd,
            root,
            resolver: Arc::new(Resolver::with_ledger(fs, resolver_config, ledger)),
            config: loaded,
        })
    }

    /// [`Project::open`], exiting on failure.
    pub fn open_or_exit(config: &Config, json: bool) -> Self {
        Self::open(config).unwrap_or_else(|e| e.exit(json))
    }

    /// `path` made absolute against the working directory.
    pub fn absolute(&self, path: &Path) -> PathBuf {
        normalize_path(&self.cwd.join(path))
    }

    /// `path` made absolute and canonical; it must exist.
    pub fn existing(&self, path: &Path) -> Result<PathBuf, CliError> {
        let absolute = self.absolute(path);
        self.resolver
            .file_system()
            .canonicalize(&absolute)
            .map_err(|e| CliError::new(codes::CLI_FILE_NOT_FOUND, format!("{}: {e}", absolute.display())))
    }

    /// Worker count: `--threads`, then the config file, then the environment.
    pub fn thread_count(&self, threads: Option<usize>) -> usize {
        spindle_workers::thread_count_from_env(threads.or(self.config.config.threads))
    }
}

/// Error body shared by all JSON outputs.
#[derive(Serialize)]
pub struct ErrorJson {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorResult<'a> {
    schema_version: u32,
    ok: bool,
    error: &'a ErrorJson,
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{json}");
    Ok(())
}

/// Report a failure and exit with status 1.
pub fn fail(json: bool, code: &str, message: impl Into<String>) -> ! {
    let error = ErrorJson {
        code: code.to_string(),
        message: message.into(),
    };
    if json {
        let result = ErrorResult {
            schema_version: SCHEMA_VERSION,
            ok: false,
            error: &error,
        };
        if let Ok(out) = serde_json::to_string_pretty(&result) {
            println!("{out}");
        }
    } else {
        eprintln!("error[{}]: {}", error.code, error.message);
    }
    std::process::exit(1);
}

/// Multi-threaded runtime the build workers run on.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("spindle-worker")
        .build()
        .into_diagnostic()
}
