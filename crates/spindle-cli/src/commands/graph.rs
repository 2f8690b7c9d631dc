//! `spindle graph` command implementation.

use super::build::{build_options, exit_with_build_error, relative};
use super::{print_json, runtime, Project};
use miette::Result;
use serde::Serialize;
use spindle_core::{Config, Invalidations, SCHEMA_VERSION};
use spindle_workers::{spawn_tokio_worker, Asset, BuildOrchestrator};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Serialize)]
struct GraphJson<'a> {
    schema_version: u32,
    ok: bool,
    root: &'a Path,
    entries: Vec<&'a Path>,
    /// Breadth-first from the entries.
    assets: Vec<&'a Asset>,
    invalidations: &'a Invalidations,
}

pub fn run(config: &Config, entries: &[String], threads: Option<usize>, json: bool) -> Result<()> {
    let project = Project::open_or_exit(config, json);
    let options = build_options(&project, entries, threads);

    let orchestrator = BuildOrchestrator::new(Arc::clone(&project.resolver));
    let graph = match runtime()?.block_on(orchestrator.build_asset_graph(&options, spawn_tokio_worker)) {
        Ok(graph) => graph,
        Err(e) => exit_with_build_error(&e, json),
    };

    if json {
        print_json(&GraphJson {
            schema_version: SCHEMA_VERSION,
            ok: true,
            root: &project.root,
            entries: graph.entries.iter().map(PathBuf::as_path).collect(),
            assets: graph.traverse(),
            invalidations: &graph.invalidations,
        })?;
        return Ok(());
    }

    for asset in graph.traverse() {
        println!(
            "{}  {}  ({} bytes)",
            asset.id,
            relative(&project.root, &asset.path).display(),
            asset.size
        );
        for dep in &asset.dependencies {
            let target = match dep.resolution.path() {
                Some(path) => relative(&project.root, path).display().to_string(),
                None => dep.resolution.kind().to_string(),
            };
            println!("    {} {} -> {target}", dep.kind.as_str(), dep.specifier);
        }
    }
    Ok(())
}
