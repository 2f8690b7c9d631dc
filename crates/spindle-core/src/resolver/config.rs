//! Resolver configuration.

use super::ModuleDirResolver;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::path::PathBuf;
use std::sync::Arc;

/// Default extensions for probing.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs", ".json"];

/// Node.js builtin modules.
pub const NODE_BUILTINS: &[&str] = &[
    "assert",
    "assert/strict",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "diagnostics_channel",
    "dns",
    "dns/promises",
    "domain",
    "events",
    "fs",
    "fs/promises",
    "http",
    "http2",
    "https",
    "inspector",
    "module",
    "net",
    "os",
    "path",
    "path/posix",
    "path/win32",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "readline/promises",
    "repl",
    "stream",
    "stream/promises",
    "stream/web",
    "string_decoder",
    "sys",
    "timers",
    "timers/promises",
    "tls",
    "trace_events",
    "tty",
    "url",
    "util",
    "util/types",
    "v8",
    "vm",
    "wasi",
    "worker_threads",
    "zlib",
];

/// Set of package export conditions.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ExportsConditions(u16);

impl ExportsConditions {
    pub const IMPORT: Self = Self(1 << 0);
    pub const REQUIRE: Self = Self(1 << 1);
    pub const MODULE: Self = Self(1 << 2);
    pub const NODE: Self = Self(1 << 3);
    pub const BROWSER: Self = Self(1 << 4);
    pub const WORKER: Self = Self(1 << 5);
    pub const WORKLET: Self = Self(1 << 6);
    pub const ELECTRON: Self = Self(1 << 7);
    pub const DEVELOPMENT: Self = Self(1 << 8);
    pub const PRODUCTION: Self = Self(1 << 9);
    pub const TYPES: Self = Self(1 << 10);
    pub const DEFAULT: Self = Self(1 << 11);

    const NAMES: &'static [(&'static str, Self)] = &[
        ("import", Self::IMPORT),
        ("require", Self::REQUIRE),
        ("module", Self::MODULE),
        ("node", Self::NODE),
        ("browser", Self::BROWSER),
        ("worker", Self::WORKER),
        ("worklet", Self::WORKLET),
        ("electron", Self::ELECTRON),
        ("development", Self::DEVELOPMENT),
        ("production", Self::PRODUCTION),
        ("types", Self::TYPES),
        ("default", Self::DEFAULT),
    ];

    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// The flag for a condition name, if it is a known condition.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, flag)| *flag)
    }

    /// Whether the exports key `name` is satisfied. `default` always is.
    #[must_use]
    pub fn matches_key(self, name: &str) -> bool {
        if name == "default" {
            return true;
        }
        Self::from_name(name).is_some_and(|flag| self.contains(flag))
    }

    /// Parse a list of condition names.
    ///
    /// # Errors
    /// Returns the first unknown name.
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Self, String> {
        let mut out = Self::empty();
        for name in names {
            let name = name.as_ref();
            match Self::from_name(name) {
                Some(flag) => out.insert(flag),
                None => return Err(name.to_string()),
            }
        }
        Ok(out)
    }

    /// Names of the conditions in the set, in declaration order.
    #[must_use]
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(_, flag)| self.contains(*flag))
            .map(|(n, _)| *n)
            .collect()
    }
}

impl BitOr for ExportsConditions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ExportsConditions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for ExportsConditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

/// Which packages under `node_modules` are resolved into the build.
///
/// Packages that are not included resolve to `External`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IncludeNodeModules {
    Bool(bool),
    /// Only these packages are included.
    Array(Vec<String>),
    /// Per-package switch; unlisted packages are excluded.
    Map(BTreeMap<String, bool>),
}

impl Default for IncludeNodeModules {
    fn default() -> Self {
        Self::Bool(true)
    }
}

impl IncludeNodeModules {
    #[must_use]
    pub fn includes(&self, package: &str) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Array(names) => names.iter().any(|n| n == package),
            Self::Map(map) => map.get(package).copied().unwrap_or(false),
        }
    }
}

/// A package.json field naming a package entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryField {
    Source,
    Browser,
    Module,
    Main,
    Types,
}

impl EntryField {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Browser => "browser",
            Self::Module => "module",
            Self::Main => "main",
            Self::Types => "types",
        }
    }
}

/// How absolute and `~` specifiers are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverMode {
    /// `/x` is a filesystem path; `~` is rejected.
    #[default]
    Node,
    /// `/x` is relative to the project root; `~/x` to the nearest package root.
    Bundler,
}

/// Configuration of one [`super::Resolver`]. Never mutated after the
/// resolver is built.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub project_root: PathBuf,
    pub include_node_modules: IncludeNodeModules,
    /// Keep walking `node_modules` directories above the project root.
    pub search_outside_project_root: bool,
    pub conditions: ExportsConditions,
    /// Final fallback for bare specifiers nothing else resolved.
    pub module_dir_resolver: Option<Arc<dyn ModuleDirResolver>>,
    pub mode: ResolverMode,
    pub entries: Vec<EntryField>,
    pub extensions: Vec<String>,
    /// Builtins in addition to [`NODE_BUILTINS`].
    pub builtins: BTreeSet<String>,
    /// Specifiers or package names that resolve to `External`.
    pub externals: BTreeSet<String>,
}

impl ResolverConfig {
    #[must_use]
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            include_node_modules: IncludeNodeModules::default(),
            search_outside_project_root: false,
            conditions: ExportsConditions::empty(),
            module_dir_resolver: None,
            mode: ResolverMode::default(),
            entries: vec![EntryField::Module, EntryField::Main],
            extensions: DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect(),
            builtins: BTreeSet::new(),
            externals: BTreeSet::new(),
        }
    }

    pub fn with_mode(mut self, mode: ResolverMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_conditions(mut self, conditions: ExportsConditions) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn with_extensions<S: Into<String>>(mut self, extensions: impl IntoIterator<Item = S>) -> Self {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_entries(mut self, entries: Vec<EntryField>) -> Self {
        self.entries = entries;
        self
    }

    pub fn with_include_node_modules(mut self, include: IncludeNodeModules) -> Self {
        self.include_node_modules = include;
        self
    }

    pub fn with_search_outside_project_root(mut self, search: bool) -> Self {
        self.search_outside_project_root = search;
        self
    }

    pub fn with_builtins<S: Into<String>>(mut self, builtins: impl IntoIterator<Item = S>) -> Self {
        self.builtins.extend(builtins.into_iter().map(Into::into));
        self
    }

    pub fn with_externals<S: Into<String>>(mut self, externals: impl IntoIterator<Item = S>) -> Self {
        self.externals.extend(externals.into_iter().map(Into::into));
        self
    }

    pub fn with_module_dir_resolver(mut self, resolver: Arc<dyn ModuleDirResolver>) -> Self {
        self.module_dir_resolver = Some(resolver);
        self
    }

    /// Whether `name` is a builtin module.
    #[must_use]
    pub fn is_builtin(&self, name: &str) -> bool {
        NODE_BUILTINS.contains(&name) || self.builtins.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conditions_parse_and_names() {
        let c = ExportsConditions::parse_list(&["browser", "import"]).unwrap();
        assert!(c.contains(ExportsConditions::BROWSER));
        assert!(c.contains(ExportsConditions::IMPORT));
        assert!(!c.contains(ExportsConditions::REQUIRE));
        assert_eq!(c.names(), vec!["import", "browser"]);

        assert_eq!(
            ExportsConditions::parse_list(&["import", "deno"]),
            Err("deno".to_string())
        );
    }

    #[test]
    fn test_default_condition_always_matches() {
        let c = ExportsConditions::empty();
        assert!(c.matches_key("default"));
        assert!(!c.matches_key("import"));
        assert!(!c.matches_key("react-native"));
    }

    #[test]
    fn test_include_node_modules() {
        assert!(IncludeNodeModules::Bool(true).includes("react"));
        assert!(!IncludeNodeModules::Bool(false).includes("react"));

        let arr = IncludeNodeModules::Array(vec!["lodash".into()]);
        assert!(arr.includes("lodash"));
        assert!(!arr.includes("react"));

        let map = IncludeNodeModules::Map(BTreeMap::from([
            ("react".to_string(), false),
            ("lodash".to_string(), true),
        ]));
        assert!(map.includes("lodash"));
        assert!(!map.includes("react"));
        assert!(!map.includes("vue"));
    }

    #[test]
    fn test_include_node_modules_deserializes_untagged() {
        let v: IncludeNodeModules = serde_json::from_str("false").unwrap();
        assert_eq!(v, IncludeNodeModules::Bool(false));
        let v: IncludeNodeModules = serde_json::from_str(r#"["a"]"#).unwrap();
        assert_eq!(v, IncludeNodeModules::Array(vec!["a".into()]));
        let v: IncludeNodeModules = serde_json::from_str(r#"{"a": true}"#).unwrap();
        assert!(v.includes("a"));
    }

    #[test]
    fn test_config_defaults() {
        let config = ResolverConfig::new("/p");
        assert_eq!(config.entries, vec![EntryField::Module, EntryField::Main]);
        assert_eq!(config.extensions[0], ".ts");
        assert_eq!(config.mode, ResolverMode::Node);
        assert!(config.is_builtin("fs"));
        assert!(config.is_builtin("fs/promises"));
        assert!(!config.is_builtin("lodash"));
        assert!(config.with_builtins(["electron"]).is_builtin("electron"));
    }
}
