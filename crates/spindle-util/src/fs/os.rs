use super::FileSystem;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// The real disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        // dunce strips the `\\?\` prefix Windows adds to canonical paths
        dunce::canonicalize(path)
    }

    fn cwd(&self) -> io::Result<PathBuf> {
        std::env::current_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_os_fs_basic_queries() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.js");
        fs::write(&file, "module.exports = 1;").unwrap();

        let os = OsFileSystem;
        assert!(os.is_file(&file));
        assert!(!os.is_dir(&file));
        assert!(os.is_dir(dir.path()));
        assert_eq!(os.read_to_string(&file).unwrap(), "module.exports = 1;");
        assert_eq!(
            os.read(&dir.path().join("missing.js")).unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }

    #[test]
    fn test_os_fs_canonicalize_resolves_dots() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.js"), "").unwrap();

        let os = OsFileSystem;
        let canonical = os.canonicalize(&dir.path().join("sub/../a.js")).unwrap();
        assert_eq!(canonical, os.canonicalize(&dir.path().join("a.js")).unwrap());
    }
}
