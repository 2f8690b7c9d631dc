//! Messages exchanged between the pool and its workers.

use serde::{Deserialize, Serialize};
use spindle_core::{ImportKind, Invalidations, ResolveResult};
use std::path::PathBuf;
use tokio::sync::oneshot;

/// Work sent to a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerRequest {
    /// Read, hash and scan one file, then resolve its dependencies.
    ProcessAsset { path: PathBuf },
}

/// A worker's answer to one [`WorkerRequest`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerResponse {
    Asset(ProcessedAsset),
    /// The file could not be read.
    AssetFailed { path: PathBuf, message: String },
}

/// One file as seen by a worker.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedAsset {
    pub path: PathBuf,
    pub content_hash: String,
    pub size: u64,
    pub dependencies: Vec<ResolvedDependency>,
}

/// One dependency of a [`ProcessedAsset`] and how it resolved.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedDependency {
    pub specifier: String,
    pub kind: ImportKind,
    pub line: u32,
    pub result: ResolveResult,
}

impl ResolvedDependency {
    #[must_use]
    pub fn invalidations(&self) -> Invalidations {
        self.result.invalidations()
    }
}

/// A request together with the channel its response goes back on.
#[derive(Debug)]
pub struct WorkerJob {
    pub request: WorkerRequest,
    pub reply: oneshot::Sender<WorkerResponse>,
}

impl WorkerJob {
    #[must_use]
    pub fn new(request: WorkerRequest) -> (Self, oneshot::Receiver<WorkerResponse>) {
        let (reply, rx) = oneshot::channel();
        (Self { request, reply }, rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let request = WorkerRequest::ProcessAsset {
            path: PathBuf::from("/p/index.ts"),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "process_asset");
        assert_eq!(json["path"], "/p/index.ts");

        let back: WorkerRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn test_failed_response_shape() {
        let response = WorkerResponse::AssetFailed {
            path: PathBuf::from("/p/a.ts"),
            message: "permission denied".into(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "asset_failed");
        assert_eq!(json["message"], "permission denied");
    }
}
