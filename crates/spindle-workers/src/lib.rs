#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]

//! Parallel builds for spindle.
//!
//! The crate provides:
//! - A worker pool with explicit registration and round-robin dispatch
//! - Build workers that read, hash and scan assets and resolve their imports
//! - The build orchestrator that drives a build from entries to outputs
//!
//! ## Worker protocol
//! Workers receive [`WorkerJob`]s over a bounded channel and answer each on
//! its own oneshot. A worker that drops a reply or its channel fails the
//! build.

pub mod codes;
pub mod graph;
pub mod orchestrator;
pub mod pool;
pub mod protocol;
pub mod threads;
pub mod worker;

pub use graph::{Asset, AssetGraph, Dependency};
pub use orchestrator::{
    BuildError, BuildOptions, BuildOrchestrator, BuildOutput, BuildResult, BuildState,
    UnresolvedDependency,
};
pub use pool::{worker_channel, PoolError, WorkerChannel, WorkerEndpoint, WorkerHandle, WorkerPool};
pub use protocol::{ProcessedAsset, ResolvedDependency, WorkerJob, WorkerRequest, WorkerResponse};
pub use threads::{default_thread_count, thread_count_from_env, thread_count_with_override};
pub use worker::{spawn_tokio_worker, Worker};
