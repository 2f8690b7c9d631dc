use super::{normalize_path, FileSystem};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use walkdir::WalkDir;

#[derive(Debug, Default)]
struct Tree {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
    unreadable: BTreeSet<PathBuf>,
}

impl Tree {
    fn add_ancestors(&mut self, path: &Path) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if !self.dirs.insert(dir.to_path_buf()) {
                break;
            }
            current = dir.parent();
        }
    }
}

/// Filesystem held entirely in memory.
///
/// Directories are implied by the files written into them and can also be
/// created empty. Paths are normalized lexically; there are no symlinks.
#[derive(Debug)]
pub struct InMemoryFileSystem {
    cwd: PathBuf,
    tree: RwLock<Tree>,
}

impl Default for InMemoryFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryFileSystem {
    /// Create an empty filesystem whose working directory is `/`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_cwd("/")
    }

    /// Create an empty filesystem with the given working directory.
    #[must_use]
    pub fn with_cwd(cwd: impl Into<PathBuf>) -> Self {
        let cwd = normalize_path(&cwd.into());
        let mut tree = Tree::default();
        tree.dirs.insert(cwd.clone());
        tree.add_ancestors(&cwd);
        Self {
            cwd,
            tree: RwLock::new(tree),
        }
    }

    /// Copy every file under `root` from the real disk.
    ///
    /// The copy keeps the absolute paths of the originals and uses `root` as
    /// its working directory. Later changes on disk are not observed.
    ///
    /// # Errors
    /// Returns an error if `root` cannot be canonicalized or a file cannot be read.
    pub fn snapshot(root: &Path) -> io::Result<Self> {
        let root = dunce::canonicalize(root)?;
        let fs = Self::with_cwd(&root);

        for entry in WalkDir::new(&root).follow_links(true) {
            let entry = entry.map_err(io::Error::other)?;
            if entry.file_type().is_dir() {
                fs.create_dir(entry.path());
            } else if entry.file_type().is_file() {
                let bytes = std::fs::read(entry.path())?;
                fs.write_file(entry.path(), bytes);
            }
        }

        Ok(fs)
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize_path(path)
        } else {
            normalize_path(&self.cwd.join(path))
        }
    }

    /// Create or overwrite a file, creating its parent directories.
    pub fn write_file(&self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) {
        let path = self.absolute(path.as_ref());
        let mut tree = self.tree.write().unwrap();
        tree.add_ancestors(&path);
        tree.unreadable.remove(&path);
        tree.files.insert(path, contents.into());
    }

    /// Create a directory and its parents.
    pub fn create_dir(&self, path: impl AsRef<Path>) {
        let path = self.absolute(path.as_ref());
        let mut tree = self.tree.write().unwrap();
        tree.add_ancestors(&path);
        tree.dirs.insert(path);
    }

    /// Remove a file. Returns whether it existed.
    pub fn remove_file(&self, path: impl AsRef<Path>) -> bool {
        let path = self.absolute(path.as_ref());
        let mut tree = self.tree.write().unwrap();
        tree.unreadable.remove(&path);
        tree.files.remove(&path).is_some()
    }

    /// Make reads of an existing file fail with `PermissionDenied`.
    ///
    /// Existence checks still succeed, which is how a real permission error
    /// presents itself to a resolver.
    pub fn deny_read(&self, path: impl AsRef<Path>) {
        let path = self.absolute(path.as_ref());
        self.tree.write().unwrap().unreadable.insert(path);
    }
}

impl FileSystem for InMemoryFileSystem {
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        let path = self.absolute(path);
        let tree = self.tree.read().unwrap();
        if tree.files.contains_key(&path) || tree.dirs.contains(&path) {
            Ok(path)
        } else {
            Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            ))
        }
    }

    fn cwd(&self) -> io::Result<PathBuf> {
        Ok(self.cwd.clone())
    }

    fn is_file(&self, path: &Path) -> bool {
        let path = self.absolute(path);
        self.tree.read().unwrap().files.contains_key(&path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        let path = self.absolute(path);
        self.tree.read().unwrap().dirs.contains(&path)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let path = self.absolute(path);
        let tree = self.tree.read().unwrap();

        if tree.unreadable.contains(&path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("permission denied: {}", path.display()),
            ));
        }

        match tree.files.get(&path) {
            Some(bytes) => Ok(bytes.clone()),
            None if tree.dirs.contains(&path) => Err(io::Error::other(format!(
                "{} is a directory",
                path.display()
            ))),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )),
        }
    }
}
