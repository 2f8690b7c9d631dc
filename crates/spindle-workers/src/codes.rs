//! Stable error codes for builds.
//!
//! All codes are SCREAMING_SNAKE_CASE and stable across versions.

/// A build was driven through a state it cannot enter.
pub const BUILD_INVALID_STATE: &str = "BUILD_INVALID_STATE";

/// No entries were given.
pub const BUILD_NO_ENTRIES: &str = "BUILD_NO_ENTRIES";

/// A worker could not be registered, never became ready, or stopped answering.
pub const BUILD_WORKER_FAILED: &str = "BUILD_WORKER_FAILED";

/// One or more dependencies did not resolve.
pub const BUILD_UNRESOLVED: &str = "BUILD_UNRESOLVED";

/// An asset could not be read.
pub const BUILD_ASSET_IO_ERROR: &str = "BUILD_ASSET_IO_ERROR";
