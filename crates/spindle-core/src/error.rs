use crate::config_request::ConfigRequestError;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for spindle operations outside of resolution.
///
/// Resolution failures never use this type; they travel inside
/// [`crate::ResolveResult::error`] so their invalidations are kept.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    #[error("Project root not found from {start}")]
    ProjectNotFound { start: PathBuf },

    #[error(transparent)]
    ConfigRequest(#[from] ConfigRequestError),

    #[error("{0}")]
    Other(String),
}

impl Error {
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
