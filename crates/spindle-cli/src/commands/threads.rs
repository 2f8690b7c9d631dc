//! `spindle threads` command implementation.

use super::print_json;
use miette::Result;
use serde::Serialize;
use spindle_core::SCHEMA_VERSION;
use spindle_workers::threads::{
    default_thread_count, thread_count_from_env, MAX_DEFAULT_THREADS, THREADS_ENV, WORKERS_ENV,
};

#[derive(Serialize)]
struct ThreadsJson {
    schema_version: u32,
    ok: bool,
    available_parallelism: usize,
    max_default: usize,
    default: usize,
    effective: usize,
    env: EnvJson,
}

#[derive(Serialize)]
struct EnvJson {
    #[serde(rename = "SPINDLE_THREADS")]
    threads: Option<String>,
    #[serde(rename = "SPINDLE_WORKERS")]
    workers: Option<String>,
}

pub fn run(json: bool) -> Result<()> {
    let report = ThreadsJson {
        schema_version: SCHEMA_VERSION,
        ok: true,
        available_parallelism: std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get),
        max_default: MAX_DEFAULT_THREADS,
        default: default_thread_count(),
        effective: thread_count_from_env(None),
        env: EnvJson {
            threads: std::env::var(THREADS_ENV).ok(),
            workers: std::env::var(WORKERS_ENV).ok(),
        },
    };

    if json {
        print_json(&report)?;
    } else {
        println!("available parallelism: {}", report.available_parallelism);
        println!("default workers:       {} (max {})", report.default, report.max_default);
        println!("effective workers:     {}", report.effective);
    }
    Ok(())
}
