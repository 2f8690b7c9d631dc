#![deny(clippy::all)]
#![warn(clippy::pedantic)]

//! Benchmark harness for spindle.
//!
//! Run benchmarks with: `cargo bench -p spindle-bench`
//!
//! - `hashing`: the content hasher over buffers, chunked writes and files
//! - `resolve`: the resolver and import scanner over an in-memory project
