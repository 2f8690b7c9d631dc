//! Filesystem wrapper that turns every query into an invalidation.

use crate::invalidations::{CreateInvalidation, Invalidations};
use spindle_util::fs::{normalize_path, FileSystem};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Records what the queries made through it depended on.
///
/// - a failed existence check becomes a create invalidation for the checked
///   name in the checked directory
/// - a successful read becomes a change invalidation for that file
/// - a read that failed for a reason other than absence is recorded as a
///   change of that file and the error is passed on unchanged
#[derive(Debug)]
pub struct Probe<'a> {
    fs: &'a dyn FileSystem,
    invalidations: Mutex<Invalidations>,
}

impl<'a> Probe<'a> {
    #[must_use]
    pub fn new(fs: &'a dyn FileSystem) -> Self {
        Self {
            fs,
            invalidations: Mutex::new(Invalidations::default()),
        }
    }

    /// Record that the content of `path` matters.
    pub fn record_change(&self, path: &Path) {
        self.invalidations
            .lock()
            .unwrap()
            .invalidate_on_file_change(normalize_path(path));
    }

    /// Record that creating `path` must invalidate.
    pub fn record_missing(&self, path: &Path) {
        let path = normalize_path(path);
        let (Some(dir), Some(name)) = (path.parent(), path.file_name()) else {
            return;
        };
        let invalidation = CreateInvalidation::file(dir, &name.to_string_lossy());
        self.invalidations
            .lock()
            .unwrap()
            .invalidate_on_file_create(invalidation);
    }

    /// Record an arbitrary create invalidation.
    pub fn record_create(&self, invalidation: CreateInvalidation) {
        self.invalidations
            .lock()
            .unwrap()
            .invalidate_on_file_create(invalidation);
    }

    /// Everything recorded so far.
    #[must_use]
    pub fn snapshot(&self) -> Invalidations {
        self.invalidations.lock().unwrap().clone()
    }

    #[must_use]
    pub fn into_invalidations(self) -> Invalidations {
        self.invalidations
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn record_read<T>(&self, path: &Path, result: io::Result<T>) -> io::Result<T> {
        match &result {
            Err(e) if e.kind() == io::ErrorKind::NotFound => self.record_missing(path),
            _ => self.record_change(path),
        }
        result
    }
}

impl FileSystem for Probe<'_> {
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        let result = self.fs.canonicalize(path);
        if result.is_err() {
            self.record_missing(path);
        }
        result
    }

    fn cwd(&self) -> io::Result<PathBuf> {
        self.fs.cwd()
    }

    fn is_file(&self, path: &Path) -> bool {
        let found = self.fs.is_file(path);
        if !found {
            self.record_missing(path);
        }
        found
    }

    fn is_dir(&self, path: &Path) -> bool {
        let found = self.fs.is_dir(path);
        if !found {
            self.record_missing(path);
        }
        found
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let result = self.fs.read_to_string(path);
        self.record_read(path, result)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let result = self.fs.read(path);
        self.record_read(path, result)
    }
}
