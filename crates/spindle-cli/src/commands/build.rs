//! `spindle build` command implementation.

use super::{codes, fail, print_json, runtime, ErrorJson, Project};
use miette::Result;
use serde::Serialize;
use spindle_core::{monitoring, Config, SCHEMA_VERSION, VERSION};
use spindle_util::fs::atomic_write;
use spindle_workers::{
    spawn_tokio_worker, BuildError, BuildOptions, BuildOrchestrator, UnresolvedDependency,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Build command action.
#[derive(Debug, Clone)]
pub struct BuildAction {
    pub entries: Vec<String>,
    pub threads: Option<usize>,
    /// Where to write the build manifest.
    pub manifest: Option<PathBuf>,
}

#[derive(Serialize)]
struct BuildJson<'a> {
    schema_version: u32,
    ok: bool,
    root: &'a Path,
    build_hash: &'a str,
    assets: usize,
    threads: usize,
    duration_ms: u64,
    outputs: Vec<OutputJson<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    manifest: Option<&'a Path>,
}

#[derive(Serialize)]
struct OutputJson<'a> {
    source: &'a Path,
    name: &'a str,
    fingerprint: &'a str,
}

/// Written to `--manifest`.
#[derive(Serialize)]
struct Manifest<'a> {
    schema_version: u32,
    version: &'static str,
    build_hash: &'a str,
    outputs: &'a [OutputJson<'a>],
}

#[derive(Serialize)]
struct BuildErrorResult<'a> {
    schema_version: u32,
    ok: bool,
    error: ErrorJson,
    #[serde(skip_serializing_if = "Option::is_none")]
    unresolved: Option<&'a [UnresolvedDependency]>,
}

/// Entries as given on the command line, made absolute.
pub fn build_options(project: &Project, entries: &[String], threads: Option<usize>) -> BuildOptions {
    let mut options = BuildOptions::new(
        entries
            .iter()
            .map(|entry| project.absolute(Path::new(entry)).to_string_lossy().into_owned()),
    );
    options.threads = Some(project.thread_count(threads));
    options
}

/// Report a failed build and exit with status 1.
pub fn exit_with_build_error(err: &BuildError, json: bool) -> ! {
    let unresolved: &[UnresolvedDependency] = match err {
        BuildError::Unresolved { failures } => failures.as_slice(),
        _ => &[],
    };

    if json {
        let result = BuildErrorResult {
            schema_version: SCHEMA_VERSION,
            ok: false,
            error: ErrorJson {
                code: err.code().to_string(),
                message: err.to_string(),
            },
            unresolved: (!unresolved.is_empty()).then_some(unresolved),
        };
        if print_json(&result).is_err() {
            fail(false, err.code(), err.to_string());
        }
        std::process::exit(1);
    }

    for failure in unresolved {
        eprintln!(
            "  {} in {}: {}",
            failure.specifier,
            failure.from.display(),
            failure.message
        );
    }
    fail(false, err.code(), err.to_string());
}

pub fn run(config: &Config, action: BuildAction, json: bool) -> Result<()> {
    let project = Project::open_or_exit(config, json);
    let options = build_options(&project, &action.entries, action.threads);
    let threads = options.thread_count();

    let started = Instant::now();
    let orchestrator = BuildOrchestrator::new(Arc::clone(&project.resolver));
    let result = match runtime()?.block_on(orchestrator.build(&options, spawn_tokio_worker)) {
        Ok(result) => result,
        Err(e) => exit_with_build_error(&e, json),
    };
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let outputs: Vec<OutputJson<'_>> = result
        .outputs
        .iter()
        .map(|output| OutputJson {
            source: relative(&project.root, &output.source),
            name: &output.name,
            fingerprint: &output.fingerprint,
        })
        .collect();

    let manifest = action.manifest.as_ref().map(|path| project.absolute(path));
    if let Some(path) = &manifest {
        let body = Manifest {
            schema_version: SCHEMA_VERSION,
            version: VERSION,
            build_hash: &result.build_hash,
            outputs: &outputs,
        };
        let bytes = match serde_json::to_vec_pretty(&body) {
            Ok(bytes) => bytes,
            Err(e) => fail(json, codes::CLI_IO_ERROR, e.to_string()),
        };
        if let Err(e) = atomic_write(path, &bytes) {
            fail(json, codes::CLI_IO_ERROR, format!("{}: {e}", path.display()));
        }
        info!(path = %path.display(), "wrote manifest");
    }
    monitoring::record_event("build");

    if json {
        print_json(&BuildJson {
            schema_version: SCHEMA_VERSION,
            ok: true,
            root: &project.root,
            build_hash: &result.build_hash,
            assets: result.graph.len(),
            threads,
            duration_ms,
            outputs,
            manifest: manifest.as_deref(),
        })?;
    } else {
        for output in &outputs {
            println!("{:<32} {}", output.name, output.source.display());
        }
        println!();
        println!(
            "built {} assets in {duration_ms}ms with {threads} workers (hash {})",
            result.graph.len(),
            spindle_util::hash::short_id(&result.build_hash)
        );
    }
    Ok(())
}

/// `path` relative to `root` when inside it.
pub fn relative<'a>(root: &Path, path: &'a Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}
