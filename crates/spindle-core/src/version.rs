//! Version and schema identity of this build of spindle.

use serde::Serialize;
use std::fmt;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version of the JSON shapes the CLI prints and the build manifest.
/// Bump this when a field is renamed or removed.
pub const SCHEMA_VERSION: u32 = 1;

/// Set at build time to stamp binaries with their commit.
const GIT_HASH: Option<&str> = option_env!("SPINDLE_BUILD_GIT_HASH");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub version: &'static str,
    pub schema_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_hash: Option<&'static str>,
}

impl VersionInfo {
    #[must_use]
    pub fn current() -> Self {
        Self {
            version: VERSION,
            schema_version: SCHEMA_VERSION,
            git_hash: GIT_HASH,
        }
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "spindle {} (schema {})", self.version, self.schema_version)?;
        if let Some(hash) = self.git_hash {
            write!(f, " [{hash}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let info = VersionInfo {
            version: "1.2.3",
            schema_version: 4,
            git_hash: None,
        };
        assert_eq!(info.to_string(), "spindle 1.2.3 (schema 4)");
        let stamped = VersionInfo {
            git_hash: Some("abc123"),
            ..info
        };
        assert_eq!(stamped.to_string(), "spindle 1.2.3 (schema 4) [abc123]");
    }

    #[test]
    fn test_current_matches_package() {
        let info = VersionInfo::current();
        assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
        assert!(info.schema_version > 0);
    }
}
