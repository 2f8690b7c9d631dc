//! Ancestor-directory lookups.
//!
//! All lookups go through a [`FileSystem`]; pass a [`crate::probe::Probe`] to
//! collect the invalidations a lookup depended on.

use spindle_util::fs::{normalize_path, FileSystem};
use std::path::{Path, PathBuf};

/// Files and directories that mark the root of a project.
pub const PROJECT_ROOT_MARKERS: &[&str] = &[
    "spindle.config.json",
    ".git",
    "yarn.lock",
    "package-lock.json",
    "pnpm-lock.yaml",
    "bun.lockb",
];

/// Search `from` and its ancestors, up to and including `root`, for a file
/// named by one of `names`.
///
/// The nearest directory wins. Within one directory the first name in
/// `names` wins. Returns `None` if nothing is found by `root`; when `from` is
/// not inside `root` the search runs to the filesystem root.
#[must_use]
pub fn find_ancestor_file(
    fs: &dyn FileSystem,
    names: &[&str],
    from: &Path,
    root: &Path,
) -> Option<PathBuf> {
    let from = normalize_path(from);
    let root = normalize_path(root);

    for dir in from.ancestors() {
        for name in names {
            let candidate = dir.join(name);
            if fs.is_file(&candidate) {
                return Some(candidate);
            }
        }

        if dir == root {
            break;
        }
    }

    None
}

/// First existing file in `candidates`, in list order.
#[must_use]
pub fn find_first_file(fs: &dyn FileSystem, candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|path| fs.is_file(path)).cloned()
}

/// Find the installed directory of package `module` by walking the
/// `node_modules` directories above `from`.
///
/// `node_modules` directories themselves are skipped as search bases so that
/// `node_modules/node_modules` is never probed.
#[must_use]
pub fn find_node_module(fs: &dyn FileSystem, module: &str, from: &Path) -> Option<PathBuf> {
    let from = normalize_path(from);

    for dir in from.ancestors() {
        if dir.file_name().is_some_and(|n| n == "node_modules") {
            continue;
        }

        let candidate = dir.join("node_modules").join(module);
        if fs.is_dir(&candidate) {
            return Some(candidate);
        }
    }

    None
}

/// Find the project root by walking up from `cwd`.
///
/// The nearest directory holding one of [`PROJECT_ROOT_MARKERS`] wins; when
/// none exists the nearest directory with a `package.json` is used.
#[must_use]
pub fn find_project_root(fs: &dyn FileSystem, cwd: &Path) -> Option<PathBuf> {
    let cwd = normalize_path(cwd);

    for dir in cwd.ancestors() {
        let marked = PROJECT_ROOT_MARKERS.iter().any(|marker| {
            let path = dir.join(marker);
            fs.is_file(&path) || fs.is_dir(&path)
        });
        if marked {
            return Some(dir.to_path_buf());
        }
    }

    cwd.ancestors()
        .find(|dir| fs.is_file(&dir.join("package.json")))
        .map(Path::to_path_buf)
}
