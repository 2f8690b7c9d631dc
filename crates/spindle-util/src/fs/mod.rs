//! Virtual filesystem.
//!
//! The resolver and the config request runner only ever touch the disk through
//! [`FileSystem`], so the same code runs against the real disk, a frozen
//! snapshot of a directory, or a map built in a test.

mod memory;
mod os;

pub use memory::InMemoryFileSystem;
pub use os::OsFileSystem;

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Read-only view of a filesystem.
///
/// Implementations must be shareable across threads: a single instance is
/// consulted concurrently by every worker of a build.
pub trait FileSystem: Send + Sync + fmt::Debug {
    /// Resolve `path` to an absolute path with symlinks and `.`/`..` removed.
    ///
    /// # Errors
    /// Returns `NotFound` if nothing exists at `path`.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;

    /// The working directory relative paths are interpreted against.
    ///
    /// # Errors
    /// Returns an error if the working directory is unavailable.
    fn cwd(&self) -> io::Result<PathBuf>;

    /// Whether a regular file exists at `path`.
    fn is_file(&self, path: &Path) -> bool;

    /// Whether a directory exists at `path`.
    fn is_dir(&self, path: &Path) -> bool;

    /// Read a UTF-8 text file.
    ///
    /// # Errors
    /// Returns `NotFound` for missing files; every other failure is surfaced
    /// with its original kind.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Read a file as raw bytes.
    ///
    /// # Errors
    /// Same contract as [`FileSystem::read_to_string`].
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

impl<T: FileSystem + ?Sized> FileSystem for Arc<T> {
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        (**self).canonicalize(path)
    }

    fn cwd(&self) -> io::Result<PathBuf> {
        (**self).cwd()
    }

    fn is_file(&self, path: &Path) -> bool {
        (**self).is_file(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        (**self).is_dir(path)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        (**self).read_to_string(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        (**self).read(path)
    }
}

/// Lexically normalize a path: drop `.` segments and fold `..` into the
/// preceding component.
///
/// Does not touch the disk and does not follow symlinks. A `..` at the root
/// stays at the root; leading `..` segments of a relative path are kept.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }

    out
}

/// Read a file as text, replacing invalid UTF-8 sequences.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn read_to_string_lossy(fs: &dyn FileSystem, path: &Path) -> io::Result<String> {
    let bytes = fs.read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Atomically write bytes to a file by writing to a temp file then renaming.
///
/// The file will either have the old contents or the new contents, never a
/// partial write.
///
/// # Errors
/// Returns an error if the write or rename fails.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));

    // Same directory as the target so the rename stays on one filesystem
    let temp_path = parent.join(format!(
        ".{}.tmp.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("file"),
        std::process::id()
    ));

    {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    match fs::rename(&temp_path, path) {
        Ok(()) => Ok(()),
        Err(e) => {
            // Windows refuses to rename over an existing file
            if cfg!(windows) {
                fs::copy(&temp_path, path)?;
                let _ = fs::remove_file(&temp_path);
                Ok(())
            } else {
                let _ = fs::remove_file(&temp_path);
                Err(e)
            }
        }
    }
}
