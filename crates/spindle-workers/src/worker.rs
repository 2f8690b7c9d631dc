//! The build worker: receives asset jobs and answers with processed assets.

use crate::pool::{WorkerEndpoint, WorkerHandle, WorkerId};
use crate::protocol::{ProcessedAsset, ResolvedDependency, WorkerRequest, WorkerResponse};
use spindle_core::{scan_imports, ResolveRequest, Resolver};
use spindle_util::ContentHasher;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Extensions whose sources are scanned for imports. Everything else is a
/// leaf asset.
const SCANNED_EXTENSIONS: &[&str] = &["js", "jsx", "mjs", "cjs", "ts", "tsx", "mts", "cts"];

/// One build worker bound to a shared resolver.
#[derive(Debug)]
pub struct Worker {
    endpoint: WorkerEndpoint,
    resolver: Arc<Resolver>,
}

impl Worker {
    #[must_use]
    pub fn new(endpoint: WorkerEndpoint, resolver: Arc<Resolver>) -> Self {
        Self { endpoint, resolver }
    }

    #[must_use]
    pub fn id(&self) -> WorkerId {
        self.endpoint.id()
    }

    /// Take the worker apart to serve its endpoint some other way.
    #[must_use]
    pub fn into_parts(self) -> (WorkerEndpoint, Arc<Resolver>) {
        (self.endpoint, self.resolver)
    }

    /// Serve jobs until the pool drops this worker's channel.
    ///
    /// Each asset is processed on the blocking pool since VFS reads may block.
    pub async fn run(mut self) {
        let id = self.endpoint.id();
        self.endpoint.mark_ready();
        debug!(worker = id, "worker ready");

        while let Some(job) = self.endpoint.recv().await {
            let resolver = Arc::clone(&self.resolver);
            let request = job.request;
            let response = match tokio::task::spawn_blocking(move || handle_request(&resolver, request)).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(worker = id, error = %e, "asset task failed");
                    // Dropping the reply reports the failure to the pool.
                    continue;
                }
            };
            if job.reply.send(response).is_err() {
                trace!(worker = id, "requester went away");
            }
        }

        debug!(worker = id, "worker stopped");
    }
}

/// Run `worker` as a task on the current tokio runtime.
#[must_use]
pub fn spawn_tokio_worker(worker: Worker) -> WorkerHandle {
    WorkerHandle::Task(tokio::spawn(worker.run()))
}

/// Answer one request synchronously.
#[must_use]
pub fn handle_request(resolver: &Resolver, request: WorkerRequest) -> WorkerResponse {
    match request {
        WorkerRequest::ProcessAsset { path } => process_asset(resolver, &path),
    }
}

/// Read, hash and scan `path`, then resolve each import it makes.
#[must_use]
pub fn process_asset(resolver: &Resolver, path: &Path) -> WorkerResponse {
    let bytes = match resolver.file_system().read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            return WorkerResponse::AssetFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        }
    };

    let mut hasher = ContentHasher::new();
    hasher.write_buffer(&bytes);
    let content_hash = hasher.finish();

    let dependencies = if is_scanned(path) {
        let source = String::from_utf8_lossy(&bytes);
        scan_imports(&source)
            .into_iter()
            .map(|import| {
                let request = ResolveRequest::new(import.specifier.clone(), path)
                    .with_kind(import.kind.specifier_kind());
                ResolvedDependency {
                    result: resolver.resolve(&request),
                    specifier: import.specifier,
                    kind: import.kind,
                    line: import.line,
                }
            })
            .collect()
    } else {
        Vec::new()
    };

    trace!(path = %path.display(), deps = dependencies.len(), "processed asset");
    WorkerResponse::Asset(ProcessedAsset {
        path: path.to_path_buf(),
        content_hash,
        size: bytes.len() as u64,
        dependencies,
    })
}

fn is_scanned(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SCANNED_EXTENSIONS.contains(&ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{worker_channel, WorkerPool};
    use spindle_core::{ImportKind, Resolution, ResolverConfig};
    use spindle_util::hash::hash_buffer;
    use spindle_util::InMemoryFileSystem;
    use std::path::PathBuf;

    fn resolver(files: &[(&str, &str)]) -> Arc<Resolver> {
        let fs = InMemoryFileSystem::new();
        fs.write_file("/p/package.json", "{}");
        for (path, contents) in files {
            fs.write_file(path, *contents);
        }
        Arc::new(Resolver::new(Arc::new(fs), ResolverConfig::new("/p")))
    }

    fn asset(response: WorkerResponse) -> ProcessedAsset {
        match response {
            WorkerResponse::Asset(asset) => asset,
            WorkerResponse::AssetFailed { message, .. } => panic!("asset failed: {message}"),
        }
    }

    #[test]
    fn test_process_asset_resolves_imports() {
        let source = "import { a } from './a';\nconst b = require('./b');\nimport('./missing');\n";
        let resolver = resolver(&[
            ("/p/index.js", source),
            ("/p/a.js", ""),
            ("/p/b.js", ""),
        ]);

        let asset = asset(process_asset(&resolver, Path::new("/p/index.js")));
        assert_eq!(asset.content_hash, hash_buffer(source.as_bytes()));
        assert_eq!(asset.size, source.len() as u64);
        assert_eq!(asset.dependencies.len(), 3);

        let a = &asset.dependencies[0];
        assert_eq!(a.specifier, "./a");
        assert_eq!(a.kind, ImportKind::Static);
        assert_eq!(a.line, 1);
        assert_eq!(a.result.resolution, Resolution::Path(PathBuf::from("/p/a.js")));

        let b = &asset.dependencies[1];
        assert_eq!(b.kind, ImportKind::Require);
        assert_eq!(b.result.path(), Some(Path::new("/p/b.js")));

        let missing = &asset.dependencies[2];
        assert_eq!(missing.kind, ImportKind::Dynamic);
        assert!(!missing.result.is_ok());
        assert!(!missing.invalidations().invalidate_on_file_create.is_empty());
    }

    #[test]
    fn test_leaf_assets_are_not_scanned() {
        let resolver = resolver(&[("/p/data.json", r#"{"import": "require('./x')"}"#)]);
        let asset = asset(process_asset(&resolver, Path::new("/p/data.json")));
        assert!(asset.dependencies.is_empty());
    }

    #[test]
    fn test_unreadable_asset_fails() {
        let resolver = resolver(&[]);
        let response = process_asset(&resolver, Path::new("/p/nope.js"));
        assert!(matches!(response, WorkerResponse::AssetFailed { .. }));
    }

    #[tokio::test]
    async fn test_worker_serves_pool() {
        let resolver = resolver(&[("/p/index.ts", "export * from './util';"), ("/p/util.ts", "")]);
        let pool = WorkerPool::new();
        for id in 0..2 {
            let (channel, endpoint) = worker_channel(id);
            let handle = spawn_tokio_worker(Worker::new(endpoint, Arc::clone(&resolver)));
            pool.register_worker(channel, handle).await.unwrap();
        }
        pool.wait_ready().await.unwrap();

        let response = pool
            .dispatch(WorkerRequest::ProcessAsset {
                path: PathBuf::from("/p/index.ts"),
            })
            .await
            .unwrap();
        let asset = asset(response);
        assert_eq!(asset.dependencies[0].kind, ImportKind::Export);
        assert_eq!(asset.dependencies[0].result.path(), Some(Path::new("/p/util.ts")));

        assert_eq!(pool.shutdown().await, 2);
    }
}
