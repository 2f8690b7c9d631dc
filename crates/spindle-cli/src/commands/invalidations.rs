//! `spindle invalidations` command implementation.
//!
//! Walks the graph from `--from` to fill the invalidation ledger, then asks
//! which cached results a change to (or creation of) `path` would bust.

use super::build::{build_options, exit_with_build_error};
use super::{print_json, runtime, Project};
use miette::Result;
use serde::Serialize;
use spindle_core::{Config, InvalidationEvent, SCHEMA_VERSION};
use spindle_workers::{spawn_tokio_worker, BuildError, BuildOrchestrator};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct InvalidationsAction {
    pub path: PathBuf,
    pub from: Vec<String>,
    pub threads: Option<usize>,
    /// Treat `path` as newly created instead of changed.
    pub created: bool,
}

#[derive(Serialize)]
struct InvalidationsJson<'a> {
    schema_version: u32,
    ok: bool,
    event: &'static str,
    path: &'a Path,
    /// Project-relative paths of the files whose resolutions are stale.
    affected: &'a [PathBuf],
    configs: &'a [String],
    /// Entries recorded in the ledger.
    ledger_entries: usize,
}

pub fn run(config: &Config, action: InvalidationsAction, json: bool) -> Result<()> {
    let project = Project::open_or_exit(config, json);
    let options = build_options(&project, &action.from, action.threads);

    let orchestrator = BuildOrchestrator::new(Arc::clone(&project.resolver));
    match runtime()?.block_on(orchestrator.build_asset_graph(&options, spawn_tokio_worker)) {
        Ok(graph) => debug!(assets = graph.len(), "graph walked"),
        // Failed resolutions still recorded their invalidations.
        Err(BuildError::Unresolved { failures }) => {
            warn!(unresolved = failures.len(), "graph has unresolved dependencies");
        }
        Err(e) => exit_with_build_error(&e, json),
    }

    // A created file may not exist yet.
    let path = project
        .existing(&action.path)
        .unwrap_or_else(|_| project.absolute(&action.path));
    let (event, name) = if action.created {
        (InvalidationEvent::FileCreated(path.clone()), "create")
    } else {
        (InvalidationEvent::FileChanged(path.clone()), "change")
    };
    let ledger = project.resolver.ledger();
    let affected = ledger.affected_by(&event);

    if json {
        print_json(&InvalidationsJson {
            schema_version: SCHEMA_VERSION,
            ok: true,
            event: name,
            path: &path,
            affected: &affected.paths,
            configs: &affected.configs,
            ledger_entries: ledger.len(),
        })?;
    } else if affected.is_empty() {
        println!("nothing depends on {} ({name})", path.display());
    } else {
        for key in &affected.paths {
            println!("{}", key.display());
        }
        for id in &affected.configs {
            println!("config {id}");
        }
    }
    Ok(())
}
