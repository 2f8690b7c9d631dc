//! Resolution requests and results.

use super::config::ExportsConditions;
use crate::invalidations::{CreateInvalidation, Invalidations};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error codes for resolution failures.
pub mod codes {
    pub const SPECIFIER_INVALID: &str = "SPECIFIER_INVALID";
    pub const PARENT_INVALID: &str = "PARENT_INVALID";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const PACKAGE_NOT_FOUND: &str = "PACKAGE_NOT_FOUND";
    pub const EXPORTS_NOT_FOUND: &str = "EXPORTS_NOT_FOUND";
    pub const EXPORTS_NO_MATCHING_CONDITION: &str = "EXPORTS_NO_MATCHING_CONDITION";
    pub const EXPORTS_TARGET_NOT_FOUND: &str = "EXPORTS_TARGET_NOT_FOUND";
    pub const EXPORTS_INVALID_TARGET: &str = "EXPORTS_INVALID_TARGET";
    pub const IMPORTS_NOT_FOUND: &str = "IMPORTS_NOT_FOUND";
    pub const PACKAGE_JSON_INVALID: &str = "PACKAGE_JSON_INVALID";
    pub const ALIAS_CYCLE: &str = "ALIAS_CYCLE";
    pub const IO_ERROR: &str = "IO_ERROR";
    pub const INTERNAL: &str = "INTERNAL";
}

/// What a specifier resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Resolution {
    /// A file on disk.
    Path(PathBuf),
    /// A runtime builtin module.
    Builtin(String),
    /// Left to the runtime; not part of the build.
    External,
    /// Resolves to an empty module.
    Empty,
    /// Resolves to a global variable.
    Global(String),
}

impl Resolution {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Path(p) => Some(p),
            _ => None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Path(_) => "path",
            Self::Builtin(_) => "builtin",
            Self::External => "external",
            Self::Empty => "empty",
            Self::Global(_) => "global",
        }
    }
}

/// How the specifier was written, which selects default export conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecifierKind {
    /// `import` / `export ... from` / `import()`: adds the `import` condition.
    #[default]
    Esm,
    /// `require()`: adds the `require` condition.
    CommonJs,
    /// A URL reference, e.g. from CSS or HTML.
    Url,
    /// Anything else; no implied condition.
    Custom,
}

impl SpecifierKind {
    #[must_use]
    pub fn implied_conditions(self) -> ExportsConditions {
        match self {
            Self::Esm => ExportsConditions::IMPORT,
            Self::CommonJs => ExportsConditions::REQUIRE,
            Self::Url | Self::Custom => ExportsConditions::empty(),
        }
    }
}

/// One resolution request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveRequest {
    pub specifier: String,
    pub kind: SpecifierKind,
    /// Absolute path of the requesting file.
    pub parent: PathBuf,
    /// Replaces the resolver's configured conditions when set.
    pub conditions: Option<ExportsConditions>,
}

impl ResolveRequest {
    #[must_use]
    pub fn new(specifier: impl Into<String>, parent: impl Into<PathBuf>) -> Self {
        Self {
            specifier: specifier.into(),
            kind: SpecifierKind::default(),
            parent: parent.into(),
            conditions: None,
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: SpecifierKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn with_conditions(mut self, conditions: ExportsConditions) -> Self {
        self.conditions = Some(conditions);
        self
    }
}

/// Module format of a resolved file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleType {
    #[default]
    Unknown,
    Module,
    CommonJs,
    Json,
}

/// Why a resolution failed.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum ResolveError {
    #[error("invalid specifier '{specifier}': {reason}")]
    MalformedSpecifier { specifier: String, reason: String },

    #[error("parent '{}' is not an absolute path", .parent.display())]
    InvalidParent { parent: PathBuf },

    #[error("cannot find '{specifier}' from '{}'", .from.display())]
    NotFound { specifier: String, from: PathBuf },

    #[error("cannot find package '{package}' from '{}'", .from.display())]
    PackageNotFound { package: String, from: PathBuf },

    #[error("package '{package}' does not export '{subpath}'")]
    PackagePathNotExported { package: String, subpath: String },

    #[error("package '{package}' has no export of '{subpath}' matching the active conditions")]
    NoMatchingCondition { package: String, subpath: String },

    #[error("export target '{}' of package '{package}' does not exist", .target.display())]
    ExportsTargetNotFound { package: String, target: PathBuf },

    #[error("package '{package}' has an invalid export target '{target}'")]
    InvalidPackageTarget { package: String, target: String },

    #[error("'{specifier}' is not defined in the imports of '{}'", .package_json.display())]
    ImportsNotFound {
        specifier: String,
        package_json: PathBuf,
    },

    #[error("invalid package.json at '{}': {message}", .path.display())]
    InvalidPackageJson { path: PathBuf, message: String },

    #[error("alias chain for '{specifier}' is too deep")]
    AliasCycle { specifier: String },

    #[error("failed to read '{}' ({kind}): {message}", .path.display())]
    Io {
        path: PathBuf,
        kind: String,
        message: String,
    },

    #[error("internal resolver error: {message}")]
    Internal { message: String },
}

impl ResolveError {
    #[must_use]
    pub fn io(path: &Path, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            kind: format!("{:?}", err.kind()),
            message: err.to_string(),
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedSpecifier { .. } => codes::SPECIFIER_INVALID,
            Self::InvalidParent { .. } => codes::PARENT_INVALID,
            Self::NotFound { .. } => codes::NOT_FOUND,
            Self::PackageNotFound { .. } => codes::PACKAGE_NOT_FOUND,
            Self::PackagePathNotExported { .. } => codes::EXPORTS_NOT_FOUND,
            Self::NoMatchingCondition { .. } => codes::EXPORTS_NO_MATCHING_CONDITION,
            Self::ExportsTargetNotFound { .. } => codes::EXPORTS_TARGET_NOT_FOUND,
            Self::InvalidPackageTarget { .. } => codes::EXPORTS_INVALID_TARGET,
            Self::ImportsNotFound { .. } => codes::IMPORTS_NOT_FOUND,
            Self::InvalidPackageJson { .. } => codes::PACKAGE_JSON_INVALID,
            Self::AliasCycle { .. } => codes::ALIAS_CYCLE,
            Self::Io { .. } => codes::IO_ERROR,
            Self::Internal { .. } => codes::INTERNAL,
        }
    }

    /// Whether every strategy ran and simply found nothing.
    ///
    /// Not-found failures are recoverable: a later file creation can fix them.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::PackageNotFound { .. }
                | Self::PackagePathNotExported { .. }
                | Self::NoMatchingCondition { .. }
                | Self::ExportsTargetNotFound { .. }
                | Self::ImportsNotFound { .. }
        )
    }

    /// Rank used to keep the most informative of several failures.
    pub(crate) fn specificity(&self) -> u8 {
        match self {
            Self::NotFound { .. } | Self::PackageNotFound { .. } => 0,
            Self::ImportsNotFound { .. } => 1,
            Self::PackagePathNotExported { .. } | Self::NoMatchingCondition { .. } => 2,
            Self::ExportsTargetNotFound { .. } | Self::InvalidPackageTarget { .. } => 3,
            _ => 4,
        }
    }
}

/// Outcome of one resolution.
///
/// When `error` is set `resolution` is meaningless, but the invalidation sets
/// are still complete: creating the missing file must bust the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolveResult {
    pub resolution: Resolution,
    pub invalidate_on_file_change: BTreeSet<PathBuf>,
    pub invalidate_on_file_create: BTreeSet<CreateInvalidation>,
    pub side_effects: bool,
    pub module_type: ModuleType,
    pub error: Option<ResolveError>,
}

impl ResolveResult {
    pub(crate) fn resolved(
        resolution: Resolution,
        invalidations: Invalidations,
        side_effects: bool,
        module_type: ModuleType,
    ) -> Self {
        Self {
            resolution,
            invalidate_on_file_change: invalidations.invalidate_on_file_change,
            invalidate_on_file_create: invalidations.invalidate_on_file_create,
            side_effects,
            module_type,
            error: None,
        }
    }

    pub(crate) fn failed(error: ResolveError, invalidations: Invalidations) -> Self {
        Self {
            resolution: Resolution::Empty,
            invalidate_on_file_change: invalidations.invalidate_on_file_change,
            invalidate_on_file_create: invalidations.invalidate_on_file_create,
            side_effects: true,
            module_type: ModuleType::Unknown,
            error: Some(error),
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// The resolved file, if resolution succeeded with a path.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        if self.error.is_some() {
            return None;
        }
        self.resolution.path()
    }

    #[must_use]
    pub fn invalidations(&self) -> Invalidations {
        Invalidations {
            invalidate_on_file_change: self.invalidate_on_file_change.clone(),
            invalidate_on_file_create: self.invalidate_on_file_create.clone(),
            invalidate_on_startup: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = ResolveError::NotFound {
            specifier: "./x".into(),
            from: "/p".into(),
        };
        assert_eq!(err.code(), "NOT_FOUND");
        assert!(err.is_not_found());

        let err = ResolveError::Io {
            path: "/p/package.json".into(),
            kind: "PermissionDenied".into(),
            message: "denied".into(),
        };
        assert_eq!(err.code(), "IO_ERROR");
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_no_matching_condition_is_not_found() {
        let err = ResolveError::NoMatchingCondition {
            package: "pkg".into(),
            subpath: ".".into(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.code(), "EXPORTS_NO_MATCHING_CONDITION");
    }

    #[test]
    fn test_failed_result_hides_path() {
        let result = ResolveResult::failed(
            ResolveError::Internal {
                message: "x".into(),
            },
            Invalidations::default(),
        );
        assert!(!result.is_ok());
        assert_eq!(result.path(), None);
    }

    #[test]
    fn test_resolution_serializes_tagged() {
        let json = serde_json::to_value(Resolution::Builtin("fs".into())).unwrap();
        assert_eq!(json, serde_json::json!({"type": "builtin", "value": "fs"}));
        let json = serde_json::to_value(Resolution::External).unwrap();
        assert_eq!(json, serde_json::json!({"type": "external"}));
    }

    #[test]
    fn test_kind_implies_conditions() {
        assert_eq!(SpecifierKind::Esm.implied_conditions(), ExportsConditions::IMPORT);
        assert_eq!(SpecifierKind::CommonJs.implied_conditions(), ExportsConditions::REQUIRE);
        assert!(SpecifierKind::Custom.implied_conditions().is_empty());
    }
}
