//! Worker count policy.

use std::num::NonZeroUsize;

/// Upper bound of [`default_thread_count`].
pub const MAX_DEFAULT_THREADS: usize = 16;

/// Explicit worker count override.
pub const THREADS_ENV: &str = "SPINDLE_THREADS";

/// Worker count requested by a node-style host that manages its own workers.
pub const WORKERS_ENV: &str = "SPINDLE_WORKERS";

/// Workers to start when nothing else is configured: the host's available
/// parallelism, clamped to `1..=MAX_DEFAULT_THREADS`.
#[must_use]
pub fn default_thread_count() -> usize {
    let available = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
    clamp_thread_count(available)
}

/// Clamp a reported parallelism to `1..=MAX_DEFAULT_THREADS`.
#[must_use]
pub fn clamp_thread_count(available: usize) -> usize {
    available.clamp(1, MAX_DEFAULT_THREADS)
}

/// An explicit count wins, then the node-style worker count, then the
/// default. Zero counts are ignored.
#[must_use]
pub fn thread_count_with_override(explicit: Option<usize>, node_workers: Option<usize>) -> usize {
    explicit
        .filter(|&n| n > 0)
        .or(node_workers.filter(|&n| n > 0))
        .unwrap_or_else(default_thread_count)
}

/// [`thread_count_with_override`] with `SPINDLE_THREADS` filling in a missing
/// explicit count and `SPINDLE_WORKERS` as the node-style count.
#[must_use]
pub fn thread_count_from_env(explicit: Option<usize>) -> usize {
    let explicit = explicit.or_else(|| env_count(THREADS_ENV));
    thread_count_with_override(explicit, env_count(WORKERS_ENV))
}

fn env_count(key: &str) -> Option<usize> {
    std::env::var(key).ok()?.trim().parse().ok()
}
