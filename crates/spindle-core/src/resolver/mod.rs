//! Module resolver for JavaScript/TypeScript.
//!
//! Resolves one specifier at a time through an ordered pipeline:
//! URL and `node:` short-circuits, aliases, the builtin table, externals,
//! then relative/absolute path probing, `#` imports or `node_modules`
//! package lookup, and finally the module-directory hook.
//!
//! Every filesystem query is made through a [`Probe`], so each result carries
//! the exact set of file changes and file creations that could change it.
//! The same set is appended to the resolver's [`InvalidationLedger`] under
//! the requesting file.

mod config;
mod exports;
mod package_json;
mod result;
pub mod specifier;

pub use config::{
    EntryField, ExportsConditions, IncludeNodeModules, ResolverConfig, ResolverMode,
    DEFAULT_EXTENSIONS, NODE_BUILTINS,
};
pub use exports::{resolve_exports, resolve_imports, ExportsMatch};
pub use package_json::{AliasValue, BrowserField, PackageJson, PackageJsonCache, SideEffects};
pub use result::{
    codes, ModuleType, Resolution, ResolveError, ResolveRequest, ResolveResult, SpecifierKind,
};

use crate::invalidations::{InvalidationLedger, Invalidations};
use crate::lookup::find_node_module;
use crate::probe::Probe;
use specifier::Specifier;
use spindle_util::fs::{normalize_path, FileSystem};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Longest chain of aliases followed before giving up.
const MAX_ALIAS_DEPTH: u8 = 32;

/// Locates a package directory when `node_modules` lookup found nothing.
pub trait ModuleDirResolver: Send + Sync + fmt::Debug {
    /// Directory of `package` as seen from `from`, if known.
    fn resolve_module_dir(&self, fs: &dyn FileSystem, package: &str, from: &Path)
        -> Option<PathBuf>;
}

/// Knows where a package manager installed a package.
pub trait PackageManager: Send + Sync + fmt::Debug {
    fn package_location(&self, fs: &dyn FileSystem, name: &str, from: &Path) -> Option<PathBuf>;
}

/// Package manager with a plain `node_modules` layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeModulesPackageManager;

impl PackageManager for NodeModulesPackageManager {
    fn package_location(&self, fs: &dyn FileSystem, name: &str, from: &Path) -> Option<PathBuf> {
        find_node_module(fs, name, from)
    }
}

/// [`ModuleDirResolver`] backed by a [`PackageManager`].
#[derive(Debug, Clone, Default)]
pub struct PackageManagerResolver<P> {
    manager: P,
}

impl<P: PackageManager> PackageManagerResolver<P> {
    #[must_use]
    pub fn new(manager: P) -> Self {
        Self { manager }
    }
}

impl<P: PackageManager> ModuleDirResolver for PackageManagerResolver<P> {
    fn resolve_module_dir(
        &self,
        fs: &dyn FileSystem,
        package: &str,
        from: &Path,
    ) -> Option<PathBuf> {
        self.manager.package_location(fs, package, from)
    }
}

/// Resolves specifiers against one filesystem and one configuration.
#[derive(Debug)]
pub struct Resolver {
    fs: Arc<dyn FileSystem>,
    config: ResolverConfig,
    ledger: Arc<InvalidationLedger>,
    packages: PackageJsonCache,
}

impl Resolver {
    /// Create a resolver with its own ledger.
    #[must_use]
    pub fn new(fs: Arc<dyn FileSystem>, config: ResolverConfig) -> Self {
        let ledger = Arc::new(InvalidationLedger::new(config.project_root.clone()));
        Self::with_ledger(fs, config, ledger)
    }

    /// Create a resolver that appends to a shared ledger.
    #[must_use]
    pub fn with_ledger(
        fs: Arc<dyn FileSystem>,
        mut config: ResolverConfig,
        ledger: Arc<InvalidationLedger>,
    ) -> Self {
        config.project_root = normalize_path(&config.project_root);
        Self {
            fs,
            config,
            ledger,
            packages: PackageJsonCache::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    #[must_use]
    pub fn ledger(&self) -> &Arc<InvalidationLedger> {
        &self.ledger
    }

    #[must_use]
    pub fn file_system(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Resolve one request.
    ///
    /// Never fails outright: errors are reported in [`ResolveResult::error`]
    /// together with the invalidations collected up to the failure.
    #[must_use]
    pub fn resolve(&self, request: &ResolveRequest) -> ResolveResult {
        if !request.parent.is_absolute() {
            return ResolveResult::failed(
                ResolveError::InvalidParent {
                    parent: request.parent.clone(),
                },
                Invalidations::default(),
            );
        }

        let parent = normalize_path(&request.parent);
        let from_dir = parent.parent().unwrap_or(Path::new("/")).to_path_buf();
        let conditions = request.conditions.unwrap_or(self.config.conditions)
            | request.kind.implied_conditions();

        let session = Session {
            resolver: self,
            probe: Probe::new(self.fs.as_ref()),
            conditions,
        };

        let outcome = session
            .resolve_specifier(&request.specifier, &from_dir, 0)
            .or_else(|err| session.module_dir_fallback(&request.specifier, &from_dir, err));
        let result = session.finish(outcome);

        self.ledger.record(&parent, &result.invalidations());
        result
    }

    /// [`Resolver::resolve`] on the blocking thread pool.
    pub async fn resolve_async(self: Arc<Self>, request: ResolveRequest) -> ResolveResult {
        let resolver = Arc::clone(&self);
        match tokio::task::spawn_blocking(move || resolver.resolve(&request)).await {
            Ok(result) => result,
            Err(e) => ResolveResult::failed(
                ResolveError::Internal {
                    message: e.to_string(),
                },
                Invalidations::default(),
            ),
        }
    }

    /// Ledger entry of a file that has resolved its imports.
    #[must_use]
    pub fn get_invalidations(&self, path: &Path) -> Invalidations {
        self.ledger.get(path)
    }

    /// Drop a cached package.json after it changed on disk.
    pub fn invalidate_package_json(&self, path: &Path) {
        self.packages.invalidate(&normalize_path(path));
    }
}

/// State of one resolution.
struct Session<'r> {
    resolver: &'r Resolver,
    probe: Probe<'r>,
    conditions: ExportsConditions,
}

impl Session<'_> {
    fn config(&self) -> &ResolverConfig {
        &self.resolver.config
    }

    fn finish(self, outcome: Result<Resolution, ResolveError>) -> ResolveResult {
        let described = outcome.and_then(|resolution| self.describe(resolution));
        let invalidations = self.probe.into_invalidations();
        match described {
            Ok((resolution, side_effects, module_type)) => {
                ResolveResult::resolved(resolution, invalidations, side_effects, module_type)
            }
            Err(err) => ResolveResult::failed(err, invalidations),
        }
    }

    /// Canonicalize a resolved file, apply `browser` file redirects and
    /// classify it.
    fn describe(
        &self,
        resolution: Resolution,
    ) -> Result<(Resolution, bool, ModuleType), ResolveError> {
        let Resolution::Path(path) = resolution else {
            return Ok((resolution, true, ModuleType::Unknown));
        };

        let mut path = self.canonical(path);
        let mut package = self.nearest_package(parent_dir(&path))?;

        if self.conditions.contains(ExportsConditions::BROWSER) {
            let redirect = package
                .as_deref()
                .and_then(|p| p.browser_file_redirect(&path).cloned().map(|r| (r, p.dir().to_path_buf())));
            if let Some((redirect, package_dir)) = redirect {
                match redirect {
                    AliasValue::Disabled => return Ok((Resolution::Empty, true, ModuleType::Unknown)),
                    AliasValue::Global(name) => {
                        return Ok((Resolution::Global(name), true, ModuleType::Unknown));
                    }
                    AliasValue::Specifier(target) => {
                        match self.resolve_specifier(&target, &package_dir, 1)? {
                            Resolution::Path(redirected) => {
                                path = self.canonical(redirected);
                                package = self.nearest_package(parent_dir(&path))?;
                            }
                            other => return Ok((other, true, ModuleType::Unknown)),
                        }
                    }
                }
            }
        }

        self.probe.record_change(&path);
        let side_effects = package
            .as_deref()
            .map_or(true, |p| p.has_side_effects(&path));
        let module_type = module_type_for(&path, package.as_deref());
        Ok((Resolution::Path(path), side_effects, module_type))
    }

    fn canonical(&self, path: PathBuf) -> PathBuf {
        self.probe.canonicalize(&path).unwrap_or(path)
    }

    fn resolve_specifier(
        &self,
        spec: &str,
        from_dir: &Path,
        depth: u8,
    ) -> Result<Resolution, ResolveError> {
        let parsed = specifier::parse(spec, self.config().mode).map_err(|reason| {
            ResolveError::MalformedSpecifier {
                specifier: spec.to_string(),
                reason,
            }
        })?;

        match parsed {
            Specifier::Url(_) => Ok(Resolution::External),
            Specifier::Builtin(name) => Ok(Resolution::Builtin(name)),
            Specifier::Relative(rel) => self.resolve_path(&from_dir.join(rel), spec, from_dir),
            Specifier::Absolute(path) => {
                let base = match self.config().mode {
                    ResolverMode::Node => path,
                    ResolverMode::Bundler => {
                        let rel = path.strip_prefix("/").unwrap_or(&path);
                        self.config().project_root.join(rel)
                    }
                };
                self.resolve_path(&base, spec, from_dir)
            }
            Specifier::FileUrl(path) => self.resolve_path(&path, spec, from_dir),
            Specifier::Tilde(rest) => {
                let root = match self.nearest_package(from_dir)? {
                    Some(package) => package.dir().to_path_buf(),
                    None => self.config().project_root.clone(),
                };
                self.resolve_path(&root.join(rest), spec, from_dir)
            }
            Specifier::Hash(name) => self.resolve_hash(&name, from_dir, depth),
            Specifier::Bare { package, subpath } => {
                if let Some(aliased) = self.apply_alias(spec, from_dir, depth)? {
                    return Ok(aliased);
                }
                if self.config().is_builtin(spec) {
                    return Ok(Resolution::Builtin(spec.to_string()));
                }
                let externals = &self.config().externals;
                if externals.contains(spec) || externals.contains(&package) {
                    return Ok(Resolution::External);
                }
                self.resolve_bare(&package, subpath.as_deref(), spec, from_dir)
            }
        }
    }

    /// Aliases from the nearest package.json, then the project's.
    fn apply_alias(
        &self,
        spec: &str,
        from_dir: &Path,
        depth: u8,
    ) -> Result<Option<Resolution>, ResolveError> {
        let browser = self.conditions.contains(ExportsConditions::BROWSER);
        let mut packages = Vec::with_capacity(2);
        if let Some(nearest) = self.nearest_package(from_dir)? {
            packages.push(nearest);
        }
        let root_json = self.config().project_root.join("package.json");
        if packages.first().map_or(true, |p| p.path != root_json) {
            if let Some(root) = self.load_package(&self.config().project_root)? {
                packages.push(root);
            }
        }

        for package in packages {
            let Some(alias) = package.alias_for(spec, browser) else {
                continue;
            };
            return match alias {
                AliasValue::Disabled => Ok(Some(Resolution::Empty)),
                AliasValue::Global(name) => Ok(Some(Resolution::Global(name))),
                AliasValue::Specifier(target) if target == spec => Ok(None),
                AliasValue::Specifier(target) => {
                    if depth >= MAX_ALIAS_DEPTH {
                        return Err(ResolveError::AliasCycle {
                            specifier: spec.to_string(),
                        });
                    }
                    self.resolve_specifier(&target, package.dir(), depth + 1)
                        .map(Some)
                }
            };
        }

        Ok(None)
    }

    fn resolve_path(
        &self,
        base: &Path,
        spec: &str,
        from_dir: &Path,
    ) -> Result<Resolution, ResolveError> {
        let base = normalize_path(base);
        let found = if specifier::is_directory_only(spec) {
            if self.probe.is_dir(&base) {
                self.resolve_dir(&base, true)?
            } else {
                None
            }
        } else {
            self.resolve_file_or_dir(&base, true)?
        };
        match found {
            Some(found) => Ok(Resolution::Path(found)),
            None => Err(ResolveError::NotFound {
                specifier: spec.to_string(),
                from: from_dir.to_path_buf(),
            }),
        }
    }

    /// Exact file, then extensions in order, then the directory.
    fn resolve_file_or_dir(
        &self,
        base: &Path,
        use_entries: bool,
    ) -> Result<Option<PathBuf>, ResolveError> {
        if self.probe.is_file(base) {
            return Ok(Some(base.to_path_buf()));
        }
        if let Some(found) = self.resolve_with_extensions(base) {
            return Ok(Some(found));
        }
        if self.probe.is_dir(base) {
            return self.resolve_dir(base, use_entries);
        }
        Ok(None)
    }

    fn resolve_with_extensions(&self, base: &Path) -> Option<PathBuf> {
        if base.file_name().is_none() {
            return None;
        }
        self.config().extensions.iter().find_map(|ext| {
            let mut candidate = OsString::from(base.as_os_str());
            candidate.push(ext);
            let candidate = PathBuf::from(candidate);
            self.probe.is_file(&candidate).then_some(candidate)
        })
    }

    /// `index.*`, then the entry fields of the directory's package.json.
    fn resolve_dir(&self, dir: &Path, use_entries: bool) -> Result<Option<PathBuf>, ResolveError> {
        for ext in &self.config().extensions {
            let index = dir.join(format!("index{ext}"));
            if self.probe.is_file(&index) {
                return Ok(Some(index));
            }
        }

        if use_entries {
            if let Some(package) = self.load_package(dir)? {
                return self.resolve_entries(&package);
            }
        }

        Ok(None)
    }

    fn resolve_entries(&self, package: &PackageJson) -> Result<Option<PathBuf>, ResolveError> {
        for field in &self.config().entries {
            let Some(entry) = package.entry(*field) else {
                continue;
            };
            let target = normalize_path(&package.dir().join(entry));
            if let Some(found) = self.resolve_file_or_dir(&target, false)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    fn resolve_bare(
        &self,
        package: &str,
        subpath: Option<&str>,
        spec: &str,
        from_dir: &Path,
    ) -> Result<Resolution, ResolveError> {
        if !self.config().include_node_modules.includes(package) {
            return Ok(Resolution::External);
        }

        let Some(package_dir) = self.find_package_dir(package, from_dir) else {
            return Err(ResolveError::PackageNotFound {
                package: package.to_string(),
                from: from_dir.to_path_buf(),
            });
        };

        self.resolve_package(&package_dir, package, subpath, spec)
    }

    /// Walk `node_modules` directories upward; the first package directory
    /// found is the only one tried.
    fn find_package_dir(&self, package: &str, from_dir: &Path) -> Option<PathBuf> {
        let root = &self.config().project_root;
        let stop_at_root = !self.config().search_outside_project_root && from_dir.starts_with(root);

        for dir in from_dir.ancestors() {
            if dir.file_name().is_some_and(|n| n == "node_modules") {
                continue;
            }

            let candidate = dir.join("node_modules").join(package);
            if self.probe.is_dir(&candidate) {
                return Some(candidate);
            }

            if stop_at_root && dir == root {
                break;
            }
        }

        None
    }

    /// `exports` first; when it yields nothing usable, entry fields for the
    /// package root or the subpath as a relative path. The most specific
    /// failure is reported.
    fn resolve_package(
        &self,
        package_dir: &Path,
        name: &str,
        subpath: Option<&str>,
        spec: &str,
    ) -> Result<Resolution, ResolveError> {
        let package = self.load_package(package_dir)?;
        let mut exports_error = None;

        if let Some(exports) = package.as_ref().and_then(|p| p.exports.as_ref()) {
            let key = subpath.map_or_else(|| ".".to_string(), |s| format!("./{s}"));
            match resolve_exports(exports, &key, self.conditions) {
                ExportsMatch::Target(target) => {
                    let target = normalize_path(&package_dir.join(target.trim_start_matches("./")));
                    if let Some(found) = self.resolve_exports_target(&target) {
                        return Ok(Resolution::Path(found));
                    }
                    exports_error = Some(ResolveError::ExportsTargetNotFound {
                        package: name.to_string(),
                        target,
                    });
                }
                ExportsMatch::NotExported => {
                    exports_error = Some(ResolveError::PackagePathNotExported {
                        package: name.to_string(),
                        subpath: key,
                    });
                }
                ExportsMatch::NoMatchingCondition => {
                    exports_error = Some(ResolveError::NoMatchingCondition {
                        package: name.to_string(),
                        subpath: key,
                    });
                }
                ExportsMatch::InvalidTarget(target) => {
                    exports_error = Some(ResolveError::InvalidPackageTarget {
                        package: name.to_string(),
                        target,
                    });
                }
            }
        }

        let found = match (subpath, package.as_deref()) {
            (Some(sub), _) => self.resolve_file_or_dir(&package_dir.join(sub), true)?,
            (None, Some(package)) => match self.resolve_entries(package)? {
                Some(found) => Some(found),
                None => self.resolve_dir(package_dir, false)?,
            },
            (None, None) => self.resolve_dir(package_dir, false)?,
        };

        match found {
            Some(found) => Ok(Resolution::Path(found)),
            None => Err(exports_error.unwrap_or_else(|| ResolveError::NotFound {
                specifier: spec.to_string(),
                from: package_dir.to_path_buf(),
            })),
        }
    }

    /// Export targets name a file; extensions are probed for leniency.
    fn resolve_exports_target(&self, target: &Path) -> Option<PathBuf> {
        if self.probe.is_file(target) {
            return Some(target.to_path_buf());
        }
        self.resolve_with_extensions(target)
    }

    fn resolve_hash(&self, spec: &str, from_dir: &Path, depth: u8) -> Result<Resolution, ResolveError> {
        let Some(package) = self.nearest_package(from_dir)? else {
            return Err(ResolveError::ImportsNotFound {
                specifier: spec.to_string(),
                package_json: from_dir.join("package.json"),
            });
        };
        let not_found = || ResolveError::ImportsNotFound {
            specifier: spec.to_string(),
            package_json: package.path.clone(),
        };
        let Some(imports) = &package.imports else {
            return Err(not_found());
        };
        let package_name = package
            .name
            .clone()
            .unwrap_or_else(|| package.dir().display().to_string());

        match resolve_imports(imports, spec, self.conditions) {
            ExportsMatch::Target(target) if target.starts_with("./") => {
                let target = normalize_path(&package.dir().join(&target[2..]));
                self.resolve_exports_target(&target)
                    .map(Resolution::Path)
                    .ok_or(ResolveError::ExportsTargetNotFound {
                        package: package_name,
                        target,
                    })
            }
            ExportsMatch::Target(target) => {
                if depth >= MAX_ALIAS_DEPTH {
                    return Err(ResolveError::AliasCycle {
                        specifier: spec.to_string(),
                    });
                }
                self.resolve_specifier(&target, package.dir(), depth + 1)
            }
            ExportsMatch::NotExported => Err(not_found()),
            ExportsMatch::NoMatchingCondition => Err(ResolveError::NoMatchingCondition {
                package: package_name,
                subpath: spec.to_string(),
            }),
            ExportsMatch::InvalidTarget(target) => Err(ResolveError::InvalidPackageTarget {
                package: package_name,
                target,
            }),
        }
    }

    fn module_dir_fallback(
        &self,
        spec: &str,
        from_dir: &Path,
        err: ResolveError,
    ) -> Result<Resolution, ResolveError> {
        let Some(hook) = &self.config().module_dir_resolver else {
            return Err(err);
        };
        if !err.is_not_found() {
            return Err(err);
        }
        let Ok(Specifier::Bare { package, subpath }) = specifier::parse(spec, self.config().mode)
        else {
            return Err(err);
        };

        match hook.resolve_module_dir(&self.probe, &package, from_dir) {
            Some(dir) => self
                .resolve_package(&normalize_path(&dir), &package, subpath.as_deref(), spec)
                .map_err(|hook_err| {
                    if hook_err.specificity() >= err.specificity() {
                        hook_err
                    } else {
                        err
                    }
                }),
            None => Err(err),
        }
    }

    fn load_package(&self, dir: &Path) -> Result<Option<Arc<PackageJson>>, ResolveError> {
        self.resolver
            .packages
            .load(&self.probe, &dir.join("package.json"))
    }

    /// Nearest package.json at or above `from`, not looking above the project
    /// root for files inside it.
    fn nearest_package(&self, from: &Path) -> Result<Option<Arc<PackageJson>>, ResolveError> {
        let root = &self.config().project_root;
        let inside = from.starts_with(root);

        for dir in from.ancestors() {
            if let Some(package) = self.load_package(dir)? {
                return Ok(Some(package));
            }
            if inside && dir == root {
                break;
            }
        }

        Ok(None)
    }
}

fn parent_dir(path: &Path) -> &Path {
    path.parent().unwrap_or(Path::new("/"))
}

fn module_type_for(path: &Path, package: Option<&PackageJson>) -> ModuleType {
    match path.extension().and_then(|e| e.to_str()) {
        Some("mjs" | "mts") => ModuleType::Module,
        Some("cjs" | "cts") => ModuleType::CommonJs,
        Some("json") => ModuleType::Json,
        Some("js" | "jsx" | "ts" | "tsx") => package
            .and_then(|p| p.module_type)
            .unwrap_or(ModuleType::Unknown),
        _ => ModuleType::Unknown,
    }
}
