//! Build orchestration.
//!
//! A build starts its workers through the caller's `register_worker`
//! callback, fans asset processing out across the pool breadth-first from the
//! entries, and ends in exactly one terminal result. An orchestrator runs one
//! build; construct a new one to build again.

use crate::codes;
use crate::graph::{Asset, AssetGraph, Dependency};
use crate::pool::{worker_channel, PoolError, WorkerHandle, WorkerId, WorkerPool};
use crate::protocol::{WorkerRequest, WorkerResponse};
use crate::threads::thread_count_with_override;
use crate::worker::Worker;
use futures::stream::{self, StreamExt};
use rayon::prelude::*;
use serde::Serialize;
use spindle_core::{monitoring, Invalidations, ModuleType, ResolveRequest, Resolver};
use spindle_util::hash::short_id;
use spindle_util::ContentHasher;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Lifecycle of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    Idle,
    WorkersStarting,
    Running,
    Completed,
    Failed,
}

impl BuildState {
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::WorkersStarting)
                | (Self::WorkersStarting, Self::Running)
                | (Self::Idle | Self::WorkersStarting | Self::Running, Self::Failed)
                | (Self::Running, Self::Completed)
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Entry specifiers, relative to the project root.
    pub entries: Vec<String>,
    /// Explicit worker count.
    pub threads: Option<usize>,
    /// Worker count requested by a node-style host.
    pub node_workers: Option<usize>,
}

impl BuildOptions {
    #[must_use]
    pub fn new<S: Into<String>>(entries: impl IntoIterator<Item = S>) -> Self {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    #[must_use]
    pub fn thread_count(&self) -> usize {
        thread_count_with_override(self.threads, self.node_workers)
    }
}

/// A specifier that did not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedDependency {
    /// The file containing the specifier.
    pub from: PathBuf,
    pub specifier: String,
    pub code: String,
    pub message: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("cannot move build from {from:?} to {to:?}")]
    InvalidState { from: BuildState, to: BuildState },

    #[error("no entries given")]
    NoEntries,

    #[error("worker failed: {message}")]
    WorkerFailed {
        worker: Option<WorkerId>,
        message: String,
    },

    #[error("{} unresolved dependencies", failures.len())]
    Unresolved { failures: Vec<UnresolvedDependency> },

    #[error("failed to read {}: {message}", path.display())]
    AssetIo { path: PathBuf, message: String },
}

impl BuildError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidState { .. } => codes::BUILD_INVALID_STATE,
            Self::NoEntries => codes::BUILD_NO_ENTRIES,
            Self::WorkerFailed { .. } => codes::BUILD_WORKER_FAILED,
            Self::Unresolved { .. } => codes::BUILD_UNRESOLVED,
            Self::AssetIo { .. } => codes::BUILD_ASSET_IO_ERROR,
        }
    }
}

impl From<PoolError> for BuildError {
    fn from(err: PoolError) -> Self {
        let worker = match err {
            PoolError::DuplicateWorker(id)
            | PoolError::NotReady(id)
            | PoolError::WorkerGone(id)
            | PoolError::ReplyDropped(id) => Some(id),
            PoolError::Closed | PoolError::NoWorkers => None,
        };
        Self::WorkerFailed {
            worker,
            message: err.to_string(),
        }
    }
}

/// One packaged asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildOutput {
    pub source: PathBuf,
    /// `<stem>.<short-hash>.<ext>`.
    pub name: String,
    /// Hash over the asset's content and its resolved dependencies.
    pub fingerprint: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    pub graph: AssetGraph,
    /// In asset path order.
    pub outputs: Vec<BuildOutput>,
    pub build_hash: String,
    pub invalidations: Invalidations,
}

/// Runs one build over a worker pool.
#[derive(Debug)]
pub struct BuildOrchestrator {
    resolver: Arc<Resolver>,
    state: Mutex<BuildState>,
}

impl BuildOrchestrator {
    #[must_use]
    pub fn new(resolver: Arc<Resolver>) -> Self {
        Self {
            resolver,
            state: Mutex::new(BuildState::Idle),
        }
    }

    #[must_use]
    pub fn state(&self) -> BuildState {
        *self.state.lock().unwrap()
    }

    #[must_use]
    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    fn transition(&self, next: BuildState) -> Result<(), BuildError> {
        let mut state = self.state.lock().unwrap();
        if !state.can_transition_to(next) {
            return Err(BuildError::InvalidState {
                from: *state,
                to: next,
            });
        }
        debug!(from = ?*state, to = ?next, "build state");
        *state = next;
        Ok(())
    }

    /// Build the asset graph reachable from `options.entries`.
    ///
    /// `register_worker` is called once per worker; it decides how the
    /// worker runs and returns the handle the pool joins on shutdown.
    pub async fn build_asset_graph<F>(
        &self,
        options: &BuildOptions,
        register_worker: F,
    ) -> Result<AssetGraph, BuildError>
    where
        F: FnMut(Worker) -> WorkerHandle,
    {
        let graph = self.run_graph_phase(options, register_worker).await;
        self.finish(graph)
    }

    /// Build the asset graph, then package it into named outputs.
    pub async fn build<F>(&self, options: &BuildOptions, register_worker: F) -> Result<BuildResult, BuildError>
    where
        F: FnMut(Worker) -> WorkerHandle,
    {
        let result = self.run_graph_phase(options, register_worker).await.map(package);
        if let Ok(result) = &result {
            info!(
                assets = result.outputs.len(),
                build_hash = %short_id(&result.build_hash),
                "build complete"
            );
        }
        self.finish(result)
    }

    fn finish<T>(&self, result: Result<T, BuildError>) -> Result<T, BuildError> {
        match result {
            Ok(value) => {
                self.transition(BuildState::Completed)?;
                Ok(value)
            }
            Err(e) => {
                // A rejected start leaves the build untouched.
                if !matches!(e, BuildError::InvalidState { .. }) {
                    warn!(code = e.code(), error = %e, "build failed");
                    self.transition(BuildState::Failed)?;
                }
                Err(e)
            }
        }
    }

    async fn run_graph_phase<F>(&self, options: &BuildOptions, mut register_worker: F) -> Result<AssetGraph, BuildError>
    where
        F: FnMut(Worker) -> WorkerHandle,
    {
        self.transition(BuildState::WorkersStarting)?;
        if options.entries.is_empty() {
            return Err(BuildError::NoEntries);
        }

        let threads = options.thread_count();
        let pool = WorkerPool::new();
        for id in 0..threads {
            let (channel, endpoint) = worker_channel(id);
            let handle = register_worker(Worker::new(endpoint, Arc::clone(&self.resolver)));
            if let Err(e) = pool.register_worker(channel, handle).await {
                pool.shutdown().await;
                return Err(e.into());
            }
        }

        let result = match pool.wait_ready().await {
            Ok(()) => match self.transition(BuildState::Running) {
                Ok(()) => self.walk(&pool, &options.entries, threads).await,
                Err(e) => Err(e),
            },
            Err(e) => Err(e.into()),
        };

        pool.shutdown().await;
        result
    }

    /// Breadth-first walk from the entries, one pool dispatch per asset.
    async fn walk(&self, pool: &WorkerPool, entries: &[String], threads: usize) -> Result<AssetGraph, BuildError> {
        let started = Instant::now();
        let mut graph = AssetGraph::new();
        let mut unresolved = Vec::new();
        let mut seen = BTreeSet::new();
        // How each file was first reached: its module type and side effects.
        let mut reached: HashMap<PathBuf, (ModuleType, bool)> = HashMap::new();
        let mut frontier = Vec::new();

        let root_manifest = self.resolver.config().project_root.join("package.json");
        for entry in entries {
            let specifier = entry_specifier(entry);
            let result = Arc::clone(&self.resolver)
                .resolve_async(ResolveRequest::new(specifier.clone(), &root_manifest))
                .await;
            graph.invalidations.extend(&result.invalidations());
            match (&result.error, result.path()) {
                (None, Some(path)) => {
                    let path = path.to_path_buf();
                    graph.entries.push(path.clone());
                    if seen.insert(path.clone()) {
                        reached.insert(path.clone(), (result.module_type, result.side_effects));
                        frontier.push(path);
                    }
                }
                (error, _) => unresolved.push(UnresolvedDependency {
                    from: root_manifest.clone(),
                    specifier,
                    code: error.as_ref().map_or("NOT_A_FILE", |e| e.code()).to_string(),
                    message: error
                        .as_ref()
                        .map_or_else(|| format!("{entry} is not a file"), ToString::to_string),
                }),
            }
        }

        while !frontier.is_empty() {
            debug!(assets = frontier.len(), "dispatching frontier");
            let responses: Vec<Result<WorkerResponse, PoolError>> = stream::iter(std::mem::take(&mut frontier))
                .map(|path| pool.dispatch(WorkerRequest::ProcessAsset { path }))
                .buffered(threads.max(1) * 2)
                .collect()
                .await;

            for response in responses {
                let processed = match response? {
                    WorkerResponse::Asset(processed) => processed,
                    WorkerResponse::AssetFailed { path, message } => {
                        return Err(BuildError::AssetIo { path, message });
                    }
                };

                let mut asset = Asset::new(
                    &self.resolver.config().project_root,
                    processed.path,
                    processed.content_hash,
                    processed.size,
                );
                if let Some(&(module_type, side_effects)) = reached.get(&asset.path) {
                    asset.module_type = module_type;
                    asset.side_effects = side_effects;
                }

                for dep in processed.dependencies {
                    graph.invalidations.extend(&dep.invalidations());
                    if let Some(error) = &dep.result.error {
                        unresolved.push(UnresolvedDependency {
                            from: asset.path.clone(),
                            specifier: dep.specifier,
                            code: error.code().to_string(),
                            message: error.to_string(),
                        });
                        continue;
                    }
                    if let Some(path) = dep.result.path() {
                        if seen.insert(path.to_path_buf()) {
                            reached.insert(
                                path.to_path_buf(),
                                (dep.result.module_type, dep.result.side_effects),
                            );
                            frontier.push(path.to_path_buf());
                        }
                    }
                    asset.dependencies.push(Dependency {
                        source_asset_id: asset.id.clone(),
                        specifier: dep.specifier,
                        kind: dep.kind,
                        line: dep.line,
                        resolution: dep.result.resolution,
                    });
                }
                graph.insert(asset);
            }
        }

        monitoring::record_events("assets", graph.len() as u64);
        debug!(
            assets = graph.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "asset graph built"
        );

        if unresolved.is_empty() {
            Ok(graph)
        } else {
            Err(BuildError::Unresolved { failures: unresolved })
        }
    }
}

/// Entries are project-relative unless written as paths.
fn entry_specifier(entry: &str) -> String {
    if entry.starts_with("./") || entry.starts_with("../") || Path::new(entry).is_absolute() {
        entry.to_string()
    } else {
        format!("./{entry}")
    }
}

/// Fingerprint every asset in parallel, name the outputs and hash the build.
fn package(graph: AssetGraph) -> BuildResult {
    let assets: Vec<&Asset> = graph.assets.values().collect();
    let outputs: Vec<BuildOutput> = assets
        .par_iter()
        .map(|asset| {
            let fingerprint = fingerprint(asset);
            BuildOutput {
                source: asset.path.clone(),
                name: output_name(&asset.path, &fingerprint),
                fingerprint,
            }
        })
        .collect();

    let mut hasher = ContentHasher::new();
    for output in &outputs {
        hasher.write_string(&output.fingerprint);
    }
    let build_hash = hasher.finish();

    let invalidations = graph.invalidations.clone();
    BuildResult {
        graph,
        outputs,
        build_hash,
        invalidations,
    }
}

fn fingerprint(asset: &Asset) -> String {
    let mut hasher = ContentHasher::new();
    hasher.write_string(&asset.id);
    hasher.write_string(&asset.content_hash);
    for dep in &asset.dependencies {
        hasher.write_string(&dep.specifier);
        hasher.write_string(dep.resolution.kind());
        if let Some(path) = dep.resolution.path() {
            hasher.write_string(&path.to_string_lossy());
        }
    }
    hasher.finish()
}

fn output_name(path: &Path, fingerprint: &str) -> String {
    let stem = path.file_stem().map_or_else(|| "asset".into(), |s| s.to_string_lossy());
    let short = short_id(fingerprint);
    match path.extension() {
        Some(ext) => format!("{stem}.{short}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{short}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::spawn_tokio_worker;
    use spindle_core::ResolverConfig;
    use spindle_util::InMemoryFileSystem;

    fn fixture(files: &[(&str, &str)]) -> Arc<Resolver> {
        let fs = InMemoryFileSystem::new();
        fs.write_file("/p/package.json", r#"{"name": "app"}"#);
        for (path, contents) in files {
            fs.write_file(path, *contents);
        }
        Arc::new(Resolver::new(Arc::new(fs), ResolverConfig::new("/p")))
    }

    fn app() -> Arc<Resolver> {
        fixture(&[
            ("/p/src/index.ts", "import { a } from './a';\nimport 'lib';\nimport fs from 'fs';\n"),
            ("/p/src/a.ts", "export const a = require('./b.js');\n"),
            ("/p/src/b.js", "module.exports = 1;\n"),
            (
                "/p/node_modules/lib/package.json",
                r#"{"name": "lib", "main": "main.js", "sideEffects": false}"#,
            ),
            ("/p/node_modules/lib/main.js", "import './a';\n"),
            ("/p/node_modules/lib/a.js", ""),
        ])
    }

    fn options() -> BuildOptions {
        BuildOptions::new(["src/index.ts"]).with_threads(2)
    }

    #[test]
    fn test_state_transitions() {
        use BuildState::*;
        assert!(Idle.can_transition_to(WorkersStarting));
        assert!(WorkersStarting.can_transition_to(Running));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));
        assert!(!Idle.can_transition_to(Running));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Failed.can_transition_to(Running));
        assert!(!Completed.can_transition_to(Failed));
        assert!(Completed.is_terminal() && Failed.is_terminal());
    }

    #[test]
    fn test_entry_specifier() {
        assert_eq!(entry_specifier("src/index.ts"), "./src/index.ts");
        assert_eq!(entry_specifier("./index.ts"), "./index.ts");
        assert_eq!(entry_specifier("/p/index.ts"), "/p/index.ts");
    }

    #[test]
    fn test_output_name() {
        let fp = "0123456789abcdef0123456789";
        assert_eq!(output_name(Path::new("/p/src/index.ts"), fp), "index.0123456789abcdef.ts");
        assert_eq!(output_name(Path::new("/p/LICENSE"), fp), "LICENSE.0123456789abcdef");
    }

    #[tokio::test]
    async fn test_build_asset_graph() {
        let orchestrator = BuildOrchestrator::new(app());
        let mut spawned = 0;
        let graph = orchestrator
            .build_asset_graph(&options(), |worker| {
                spawned += 1;
                spawn_tokio_worker(worker)
            })
            .await
            .unwrap();

        assert_eq!(spawned, 2);
        assert_eq!(orchestrator.state(), BuildState::Completed);
        assert_eq!(graph.entries, vec![PathBuf::from("/p/src/index.ts")]);
        assert_eq!(graph.len(), 5);

        let index = graph.get(Path::new("/p/src/index.ts")).unwrap();
        let kinds: Vec<_> = index.dependencies.iter().map(|d| d.resolution.kind()).collect();
        assert_eq!(kinds, vec!["path", "path", "builtin"]);

        let lib = graph.get(Path::new("/p/node_modules/lib/main.js")).unwrap();
        assert!(!lib.side_effects);
        assert!(graph.get(Path::new("/p/node_modules/lib/a.js")).is_some());

        let order: Vec<_> = graph.traverse().iter().map(|a| a.path.clone()).collect();
        assert_eq!(order[0], PathBuf::from("/p/src/index.ts"));
        assert_eq!(order.len(), 5);

        assert!(graph
            .invalidations
            .invalidate_on_file_change
            .contains(Path::new("/p/node_modules/lib/package.json")));
    }

    #[tokio::test]
    async fn test_build_is_deterministic() {
        let first = BuildOrchestrator::new(app())
            .build(&options(), spawn_tokio_worker)
            .await
            .unwrap();
        let second = BuildOrchestrator::new(app())
            .build(&options().with_threads(4), spawn_tokio_worker)
            .await
            .unwrap();

        assert_eq!(first.build_hash, second.build_hash);
        assert_eq!(first.outputs, second.outputs);
        assert_eq!(first.outputs.len(), 5);

        let index = first
            .outputs
            .iter()
            .find(|o| o.source == Path::new("/p/src/index.ts"))
            .unwrap();
        assert!(index.name.starts_with("index."));
        assert!(index.name.ends_with(".ts"));
        assert_eq!(index.name.len(), "index..ts".len() + 16);
    }

    #[tokio::test]
    async fn test_content_change_changes_build_hash() {
        let before = BuildOrchestrator::new(app())
            .build(&options(), spawn_tokio_worker)
            .await
            .unwrap();

        let resolver = fixture(&[
            ("/p/src/index.ts", "import { a } from './a';\nimport 'lib';\nimport fs from 'fs';\n"),
            ("/p/src/a.ts", "export const a = require('./b.js');\n"),
            ("/p/src/b.js", "module.exports = 2;\n"),
            (
                "/p/node_modules/lib/package.json",
                r#"{"name": "lib", "main": "main.js", "sideEffects": false}"#,
            ),
            ("/p/node_modules/lib/main.js", "import './a';\n"),
            ("/p/node_modules/lib/a.js", ""),
        ]);
        let after = BuildOrchestrator::new(resolver)
            .build(&options(), spawn_tokio_worker)
            .await
            .unwrap();

        assert_ne!(before.build_hash, after.build_hash);
        let name = |r: &BuildResult, p: &str| {
            r.outputs.iter().find(|o| o.source == Path::new(p)).unwrap().name.clone()
        };
        assert_eq!(name(&before, "/p/src/index.ts"), name(&after, "/p/src/index.ts"));
        assert_ne!(name(&before, "/p/src/b.js"), name(&after, "/p/src/b.js"));
    }

    #[tokio::test]
    async fn test_identical_files_keep_distinct_identities() {
        let resolver = fixture(&[
            ("/p/src/index.ts", "import './a/util';\nimport './b/util';\n"),
            ("/p/src/a/util.ts", "export const util = 1;\n"),
            ("/p/src/b/util.ts", "export const util = 1;\n"),
        ]);
        let result = BuildOrchestrator::new(resolver)
            .build(&options(), spawn_tokio_worker)
            .await
            .unwrap();

        let a = result.graph.get(Path::new("/p/src/a/util.ts")).unwrap();
        let b = result.graph.get(Path::new("/p/src/b/util.ts")).unwrap();
        assert_eq!(a.content_hash, b.content_hash);
        assert_ne!(a.id, b.id);

        let names: BTreeSet<_> = result.outputs.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names.len(), result.outputs.len());

        let index = result.graph.get(Path::new("/p/src/index.ts")).unwrap();
        assert!(index.dependencies.iter().all(|d| d.source_asset_id == index.id));
    }

    #[tokio::test]
    async fn test_unresolved_dependencies_fail_the_build() {
        let resolver = fixture(&[
            ("/p/index.js", "import './missing';\nimport 'nope';\nimport './ok';\n"),
            ("/p/ok.js", ""),
        ]);
        let orchestrator = BuildOrchestrator::new(Arc::clone(&resolver));
        let err = orchestrator
            .build(&BuildOptions::new(["index.js"]).with_threads(1), spawn_tokio_worker)
            .await
            .unwrap_err();

        assert_eq!(err.code(), codes::BUILD_UNRESOLVED);
        let BuildError::Unresolved { failures } = err else {
            panic!("expected unresolved");
        };
        let specifiers: Vec<_> = failures.iter().map(|f| f.specifier.as_str()).collect();
        assert_eq!(specifiers, vec!["./missing", "nope"]);
        assert!(failures.iter().all(|f| f.from == Path::new("/p/index.js")));
        assert_eq!(orchestrator.state(), BuildState::Failed);

        // The failed resolution still left a create invalidation behind.
        assert!(!resolver
            .get_invalidations(Path::new("/p/index.js"))
            .invalidate_on_file_create
            .is_empty());
    }

    #[tokio::test]
    async fn test_missing_entry_is_unresolved() {
        let orchestrator = BuildOrchestrator::new(fixture(&[]));
        let err = orchestrator
            .build_asset_graph(&BuildOptions::new(["main.ts"]).with_threads(1), spawn_tokio_worker)
            .await
            .unwrap_err();
        let BuildError::Unresolved { failures } = err else {
            panic!("expected unresolved");
        };
        assert_eq!(failures[0].specifier, "./main.ts");
        assert_eq!(failures[0].from, Path::new("/p/package.json"));
    }

    #[tokio::test]
    async fn test_worker_failure_fails_the_build() {
        let orchestrator = BuildOrchestrator::new(app());
        let err = orchestrator
            .build(&options().with_threads(1), |worker| {
                let (mut endpoint, _resolver) = worker.into_parts();
                WorkerHandle::Task(tokio::spawn(async move {
                    // Accepts jobs but never answers.
                    endpoint.mark_ready();
                    while let Some(job) = endpoint.recv().await {
                        drop(job);
                    }
                }))
            })
            .await
            .unwrap_err();

        assert_eq!(
            err,
            BuildError::WorkerFailed {
                worker: Some(0),
                message: PoolError::ReplyDropped(0).to_string(),
            }
        );
        assert_eq!(orchestrator.state(), BuildState::Failed);
    }

    #[tokio::test]
    async fn test_worker_that_never_starts_fails_the_build() {
        let orchestrator = BuildOrchestrator::new(app());
        let err = orchestrator
            .build(&options().with_threads(1), |worker| {
                drop(worker);
                WorkerHandle::Detached
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::BUILD_WORKER_FAILED);
        assert_eq!(orchestrator.state(), BuildState::Failed);
    }

    #[tokio::test]
    async fn test_orchestrator_is_single_use() {
        let orchestrator = BuildOrchestrator::new(app());
        orchestrator.build(&options(), spawn_tokio_worker).await.unwrap();

        let err = orchestrator.build(&options(), spawn_tokio_worker).await.unwrap_err();
        assert_eq!(
            err,
            BuildError::InvalidState {
                from: BuildState::Completed,
                to: BuildState::WorkersStarting,
            }
        );
        assert_eq!(orchestrator.state(), BuildState::Completed);
    }

    #[tokio::test]
    async fn test_no_entries() {
        let orchestrator = BuildOrchestrator::new(app());
        let err = orchestrator
            .build(&BuildOptions::default(), spawn_tokio_worker)
            .await
            .unwrap_err();
        assert_eq!(err, BuildError::NoEntries);
        assert_eq!(orchestrator.state(), BuildState::Failed);
    }

    #[tokio::test]
    async fn test_asset_io_failure() {
        let fs = InMemoryFileSystem::new();
        fs.write_file("/p/package.json", "{}");
        fs.write_file("/p/index.js", "import './secret';");
        fs.write_file("/p/secret.js", "");
        fs.deny_read("/p/secret.js");
        let resolver = Arc::new(Resolver::new(Arc::new(fs), ResolverConfig::new("/p")));

        let err = BuildOrchestrator::new(resolver)
            .build(&BuildOptions::new(["index.js"]).with_threads(1), spawn_tokio_worker)
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::BUILD_ASSET_IO_ERROR);
    }
}
