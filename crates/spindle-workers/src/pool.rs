//! Worker channels and the pool that dispatches over them.
//!
//! Lifecycle of one worker: the orchestrator creates a [`WorkerChannel`] /
//! [`WorkerEndpoint`] pair, hands the endpoint to the caller's spawner and
//! registers the channel with the pool. The worker signals ready, receives
//! jobs until its channel is dropped, and is joined on shutdown.
//!
//! Registration and shutdown take the pool's write lock; dispatch takes the
//! read lock, so the channel set never changes under a dispatch.

use crate::protocol::{WorkerJob, WorkerRequest, WorkerResponse};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, warn};

pub type WorkerId = usize;

/// Jobs that may queue on one worker before dispatch waits.
pub const JOB_QUEUE_CAPACITY: usize = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("worker pool is shut down")]
    Closed,

    #[error("worker {0} is already registered")]
    DuplicateWorker(WorkerId),

    #[error("worker pool has no workers")]
    NoWorkers,

    #[error("worker {0} stopped before it became ready")]
    NotReady(WorkerId),

    #[error("worker {0} is gone")]
    WorkerGone(WorkerId),

    #[error("worker {0} dropped a job without replying")]
    ReplyDropped(WorkerId),
}

/// The pool's side of one worker.
#[derive(Debug, Clone)]
pub struct WorkerChannel {
    id: WorkerId,
    jobs: mpsc::Sender<WorkerJob>,
    ready: watch::Receiver<bool>,
}

impl WorkerChannel {
    #[must_use]
    pub fn id(&self) -> WorkerId {
        self.id
    }

    async fn wait_ready(&mut self) -> Result<(), PoolError> {
        while !*self.ready.borrow() {
            if self.ready.changed().await.is_err() {
                return Err(PoolError::NotReady(self.id));
            }
        }
        Ok(())
    }
}

/// The worker's side of one channel.
#[derive(Debug)]
pub struct WorkerEndpoint {
    id: WorkerId,
    jobs: mpsc::Receiver<WorkerJob>,
    ready: watch::Sender<bool>,
}

impl WorkerEndpoint {
    #[must_use]
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Tell the pool this worker accepts jobs.
    pub fn mark_ready(&self) {
        self.ready.send_replace(true);
    }

    /// Next job; `None` once the pool dropped the channel.
    pub async fn recv(&mut self) -> Option<WorkerJob> {
        self.jobs.recv().await
    }
}

/// Create a connected channel/endpoint pair.
#[must_use]
pub fn worker_channel(id: WorkerId) -> (WorkerChannel, WorkerEndpoint) {
    let (job_tx, job_rx) = mpsc::channel(JOB_QUEUE_CAPACITY);
    let (ready_tx, ready_rx) = watch::channel(false);
    (
        WorkerChannel {
            id,
            jobs: job_tx,
            ready: ready_rx,
        },
        WorkerEndpoint {
            id,
            jobs: job_rx,
            ready: ready_tx,
        },
    )
}

/// How the caller runs a worker; joined on shutdown.
#[derive(Debug)]
pub enum WorkerHandle {
    Task(tokio::task::JoinHandle<()>),
    Thread(std::thread::JoinHandle<()>),
    /// Managed entirely by the caller.
    Detached,
}

impl WorkerHandle {
    async fn join(self, id: WorkerId) {
        let outcome = match self {
            Self::Task(task) => task.await.map_err(|e| e.to_string()),
            Self::Thread(thread) => match tokio::task::spawn_blocking(move || thread.join()).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(_)) => Err("worker thread panicked".to_string()),
                Err(e) => Err(e.to_string()),
            },
            Self::Detached => Ok(()),
        };
        if let Err(e) = outcome {
            warn!(worker = id, error = %e, "worker did not exit cleanly");
        }
    }
}

#[derive(Debug)]
struct RegisteredWorker {
    channel: WorkerChannel,
    handle: WorkerHandle,
}

#[derive(Debug, Default)]
struct PoolInner {
    workers: Vec<RegisteredWorker>,
    closed: bool,
}

/// A set of registered workers.
#[derive(Debug, Default)]
pub struct WorkerPool {
    inner: RwLock<PoolInner>,
    next: AtomicUsize,
}

impl WorkerPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a worker's channel into the pool. Each worker id registers once.
    pub async fn register_worker(
        &self,
        channel: WorkerChannel,
        handle: WorkerHandle,
    ) -> Result<(), PoolError> {
        let mut inner = self.inner.write().await;
        if inner.closed {
            return Err(PoolError::Closed);
        }
        if inner.workers.iter().any(|w| w.channel.id == channel.id) {
            return Err(PoolError::DuplicateWorker(channel.id));
        }
        debug!(worker = channel.id, "registered worker");
        inner.workers.push(RegisteredWorker { channel, handle });
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.workers.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Wait until every registered worker signalled ready.
    pub async fn wait_ready(&self) -> Result<(), PoolError> {
        let channels: Vec<WorkerChannel> = {
            let inner = self.inner.read().await;
            if inner.workers.is_empty() {
                return Err(PoolError::NoWorkers);
            }
            inner.workers.iter().map(|w| w.channel.clone()).collect()
        };
        for mut channel in channels {
            channel.wait_ready().await?;
        }
        Ok(())
    }

    /// Send `request` to the next worker in round-robin order and await its
    /// response.
    pub async fn dispatch(&self, request: WorkerRequest) -> Result<WorkerResponse, PoolError> {
        let (job, reply) = WorkerJob::new(request);

        let id = {
            let inner = self.inner.read().await;
            if inner.closed {
                return Err(PoolError::Closed);
            }
            if inner.workers.is_empty() {
                return Err(PoolError::NoWorkers);
            }
            let index = self.next.fetch_add(1, Ordering::Relaxed) % inner.workers.len();
            let channel = &inner.workers[index].channel;
            if channel.jobs.send(job).await.is_err() {
                return Err(PoolError::WorkerGone(channel.id));
            }
            channel.id
        };

        reply.await.map_err(|_| PoolError::ReplyDropped(id))
    }

    /// Close the pool, drop every channel and join the workers.
    ///
    /// Returns how many workers were stopped.
    pub async fn shutdown(&self) -> usize {
        let workers = {
            let mut inner = self.inner.write().await;
            inner.closed = true;
            std::mem::take(&mut inner.workers)
        };

        let count = workers.len();
        let mut handles = Vec::with_capacity(count);
        for worker in workers {
            // Dropping the channel ends the worker's receive loop.
            handles.push((worker.channel.id, worker.handle));
        }
        for (id, handle) in handles {
            handle.join(id).await;
        }
        debug!(workers = count, "worker pool shut down");
        count
    }
}
