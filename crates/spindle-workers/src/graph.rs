//! The asset graph produced by a build.

use serde::Serialize;
use spindle_core::{ImportKind, Invalidations, ModuleType, Resolution};
use spindle_util::hash::short_id;
use spindle_util::ContentHasher;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};

/// One file in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Asset {
    pub path: PathBuf,
    pub content_hash: String,
    /// Short hash over the project-relative path and `content_hash`.
    pub id: String,
    pub size: u64,
    pub module_type: ModuleType,
    pub side_effects: bool,
    pub dependencies: Vec<Dependency>,
}

impl Asset {
    /// An asset at `path` under the project `root`.
    #[must_use]
    pub fn new(root: &Path, path: PathBuf, content_hash: String, size: u64) -> Self {
        let relative = path.strip_prefix(root).unwrap_or(&path);
        let id = asset_id(relative, &content_hash);
        Self {
            path,
            content_hash,
            id,
            size,
            module_type: ModuleType::Unknown,
            side_effects: true,
            dependencies: Vec::new(),
        }
    }
}

/// Identity of the file at `relative` with `content_hash`. Equal bytes at
/// different paths are different assets.
#[must_use]
pub fn asset_id(relative: &Path, content_hash: &str) -> String {
    let mut hasher = ContentHasher::new();
    hasher.write_string(&relative.to_string_lossy().replace('\\', "/"));
    hasher.write_string(content_hash);
    short_id(&hasher.finish()).to_string()
}

/// An edge from an asset to what one of its specifiers resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
    /// Id of the asset that wrote the specifier.
    pub source_asset_id: String,
    pub specifier: String,
    pub kind: ImportKind,
    pub line: u32,
    pub resolution: Resolution,
}

/// Entries, the assets reachable from them and everything their resolution
/// depended on.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssetGraph {
    pub entries: Vec<PathBuf>,
    pub assets: BTreeMap<PathBuf, Asset>,
    pub invalidations: Invalidations,
}

impl AssetGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&Asset> {
        self.assets.get(path)
    }

    pub fn insert(&mut self, asset: Asset) {
        self.assets.insert(asset.path.clone(), asset);
    }

    /// Paths of the file dependencies of `path`.
    pub fn dependencies_of<'a>(&'a self, path: &Path) -> impl Iterator<Item = &'a Path> + 'a {
        self.assets
            .get(path)
            .into_iter()
            .flat_map(|asset| asset.dependencies.iter())
            .filter_map(|dep| dep.resolution.path())
    }

    /// Assets in breadth-first order from the entries. Every asset appears
    /// once.
    #[must_use]
    pub fn traverse(&self) -> Vec<&Asset> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<&Path> = self.entries.iter().map(PathBuf::as_path).collect();
        let mut order = Vec::with_capacity(self.assets.len());

        while let Some(path) = queue.pop_front() {
            if !seen.insert(path) {
                continue;
            }
            if let Some(asset) = self.assets.get(path) {
                order.push(asset);
                queue.extend(self.dependencies_of(path));
            }
        }
        order
    }

    /// Assets that depend on `path`.
    #[must_use]
    pub fn dependents_of(&self, path: &Path) -> Vec<&Path> {
        self.assets
            .values()
            .filter(|asset| asset.dependencies.iter().any(|d| d.resolution.path() == Some(path)))
            .map(|asset| asset.path.as_path())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(specifier: &str, target: &str) -> Dependency {
        Dependency {
            source_asset_id: String::new(),
            specifier: specifier.to_string(),
            kind: ImportKind::Static,
            line: 1,
            resolution: Resolution::Path(PathBuf::from(target)),
        }
    }

    fn graph() -> AssetGraph {
        let mut graph = AssetGraph::new();
        graph.entries.push(PathBuf::from("/p/index.ts"));

        let mut index = Asset::new(Path::new("/p"), "/p/index.ts".into(), "a".repeat(64), 10);
        index.dependencies.push(dep("./b", "/p/b.ts"));
        index.dependencies.push(dep("./c", "/p/c.ts"));
        index.dependencies.push(Dependency {
            source_asset_id: index.id.clone(),
            specifier: "fs".into(),
            kind: ImportKind::Static,
            line: 3,
            resolution: Resolution::Builtin("fs".into()),
        });
        let mut b = Asset::new(Path::new("/p"), "/p/b.ts".into(), "b".repeat(64), 5);
        b.dependencies.push(dep("./c", "/p/c.ts"));
        let c = Asset::new(Path::new("/p"), "/p/c.ts".into(), "c".repeat(64), 1);

        graph.insert(c);
        graph.insert(b);
        graph.insert(index);
        graph
    }

    #[test]
    fn test_asset_id_covers_path_and_content() {
        let root = Path::new("/p");
        let hash = "0".repeat(64);
        let a = Asset::new(root, "/p/src/a/util.ts".into(), hash.clone(), 0);
        let b = Asset::new(root, "/p/src/b/util.ts".into(), hash.clone(), 0);
        assert_eq!(a.id.len(), 16);
        assert_ne!(a.id, b.id);

        // Stable across project locations.
        let moved = Asset::new(Path::new("/q"), "/q/src/a/util.ts".into(), hash.clone(), 0);
        assert_eq!(a.id, moved.id);
        assert_eq!(a.id, asset_id(Path::new("src/a/util.ts"), &hash));

        let changed = Asset::new(root, "/p/src/a/util.ts".into(), "1".repeat(64), 0);
        assert_ne!(a.id, changed.id);
    }

    #[test]
    fn test_traverse_is_breadth_first_and_unique() {
        let graph = graph();
        let order: Vec<_> = graph.traverse().iter().map(|a| a.path.clone()).collect();
        assert_eq!(
            order,
            vec![
                PathBuf::from("/p/index.ts"),
                PathBuf::from("/p/b.ts"),
                PathBuf::from("/p/c.ts"),
            ]
        );
    }

    #[test]
    fn test_dependency_queries() {
        let graph = graph();
        let deps: Vec<_> = graph.dependencies_of(Path::new("/p/index.ts")).collect();
        assert_eq!(deps, vec![Path::new("/p/b.ts"), Path::new("/p/c.ts")]);

        let mut dependents = graph.dependents_of(Path::new("/p/c.ts"));
        dependents.sort();
        assert_eq!(dependents, vec![Path::new("/p/b.ts"), Path::new("/p/index.ts")]);
        assert_eq!(graph.len(), 3);
    }
}
