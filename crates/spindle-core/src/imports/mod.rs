//! Import discovery for JavaScript/TypeScript files.
//!
//! Provides a lightweight scanner that finds dependency specifiers without a
//! full parse.

mod scan;

pub use scan::{scan_imports, ImportKind, ImportSpec};
