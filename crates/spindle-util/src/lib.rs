#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Shared utilities for spindle.
//!
//! This crate provides the filesystem abstraction and the content hasher.
//! It has no logging/tracing dependencies; logging is owned by the CLI and
//! the worker crate.

pub mod fs;
pub mod hash;

pub use fs::{FileSystem, InMemoryFileSystem, OsFileSystem};
pub use hash::ContentHasher;
