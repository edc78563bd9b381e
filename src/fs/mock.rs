//! In-memory [`FileSystem`] double for unit tests.
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{DirEntry, FileSystem};
use crate::error::{BuildError, Result};

/// Operation recorded by [`MockFileSystem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOp {
    /// `delete_file(path)`
    DeleteFile(PathBuf),
    /// `remove_dir(path, recursive)`
    RemoveDir(PathBuf, bool),
    /// `set_permissions(path, mode)`
    SetPermissions(PathBuf, u32),
    /// `write(path, contents, append)`
    Write(PathBuf, String, bool),
    /// `copy_file(from, to)`
    CopyFile(PathBuf, PathBuf),
}

/// Mock driver with pre-configured files, executables and permission bits.
///
/// ```ignore
/// let fs = MockFileSystem::new()
///     .with_file("/proj/out.txt", "hello")
///     .with_executable("javac", "/opt/jdk/bin/javac");
/// ```
#[derive(Debug, Default)]
pub struct MockFileSystem {
    files: Mutex<HashMap<PathBuf, String>>,
    dirs: Vec<PathBuf>,
    executables: HashMap<String, String>,
    modes: Mutex<HashMap<PathBuf, u32>>,
    ops: Mutex<Vec<MockOp>>,
}

impl MockFileSystem {
    /// Create an empty mock with nothing configured.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file with `contents`.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_file(self, path: impl Into<PathBuf>, contents: &str) -> Self {
        self.files
            .lock()
            .expect("mock files poisoned")
            .insert(path.into(), contents.to_string());
        self
    }

    /// Register a directory.
    #[must_use]
    pub fn with_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.dirs.push(path.into());
        self
    }

    /// Make `locate_executable(name, _)` return `location`.
    #[must_use]
    pub fn with_executable(mut self, name: &str, location: &str) -> Self {
        self.executables
            .insert(name.to_string(), location.to_string());
        self
    }

    /// Operations performed so far, in call order.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn ops(&self) -> Vec<MockOp> {
        self.ops.lock().expect("mock ops poisoned").clone()
    }

    /// Every registered path: files first, then directories.
    #[allow(clippy::expect_used)]
    fn known_paths(&self) -> Vec<(PathBuf, bool)> {
        let files = self.files.lock().expect("mock files poisoned");
        files
            .keys()
            .map(|p| (p.clone(), false))
            .chain(self.dirs.iter().map(|d| (d.clone(), true)))
            .collect()
    }

    /// Whether `path` is a registered directory or an ancestor of a
    /// registered path.
    fn is_implicit_dir(&self, path: &Path) -> bool {
        self.known_paths()
            .iter()
            .any(|(p, is_dir)| p.starts_with(path) && (p != path || *is_dir))
    }

    #[allow(clippy::expect_used)]
    fn record(&self, op: MockOp) {
        self.ops.lock().expect("mock ops poisoned").push(op);
    }
}

#[allow(clippy::expect_used)]
impl FileSystem for MockFileSystem {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn case_sensitive(&self) -> bool {
        true
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        self.files.lock().expect("mock files poisoned").remove(path);
        self.record(MockOp::DeleteFile(path.to_path_buf()));
        Ok(())
    }

    fn remove_dir(&self, path: &Path, recursive: bool) -> Result<()> {
        self.record(MockOp::RemoveDir(path.to_path_buf(), recursive));
        Ok(())
    }

    fn locate_executable(&self, name: &str, fallback: &str) -> String {
        self.executables
            .get(name)
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    }

    fn same_path(&self, a: &Path, b: &Path) -> bool {
        super::normalize_lexically(a) == super::normalize_lexically(b)
    }

    fn permissions(&self, path: &Path) -> Result<u32> {
        self.modes
            .lock()
            .expect("mock modes poisoned")
            .get(path)
            .copied()
            .ok_or_else(|| {
                BuildError::io(path, std::io::Error::from(std::io::ErrorKind::NotFound))
            })
    }

    fn set_permissions(&self, path: &Path, mode: u32) -> Result<()> {
        self.modes
            .lock()
            .expect("mock modes poisoned")
            .insert(path.to_path_buf(), mode);
        self.record(MockOp::SetPermissions(path.to_path_buf(), mode));
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.dirs.iter().any(|d| d == path)
            || self
                .files
                .lock()
                .expect("mock files poisoned")
                .contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.iter().any(|d| d == path)
    }

    fn create_dir_all(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.files
            .lock()
            .expect("mock files poisoned")
            .get(path)
            .cloned()
            .ok_or_else(|| {
                BuildError::io(path, std::io::Error::from(std::io::ErrorKind::NotFound))
            })
    }

    fn write(&self, path: &Path, contents: &str, append: bool) -> Result<()> {
        {
            let mut files = self.files.lock().expect("mock files poisoned");
            let entry = files.entry(path.to_path_buf()).or_default();
            if !append {
                entry.clear();
            }
            entry.push_str(contents);
        }
        self.record(MockOp::Write(path.to_path_buf(), contents.to_string(), append));
        Ok(())
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        let path = super::normalize_lexically(path);
        if self.exists(&path) || self.is_implicit_dir(&path) {
            Ok(path)
        } else {
            Err(BuildError::io(path, std::io::Error::from(std::io::ErrorKind::NotFound)))
        }
    }

    fn read_dir_sorted(&self, dir: &Path, _follow_symlinks: bool) -> Result<Vec<DirEntry>> {
        if !self.is_implicit_dir(dir) {
            return Err(BuildError::io(dir, std::io::Error::from(std::io::ErrorKind::NotFound)));
        }
        let mut entries: BTreeMap<String, bool> = BTreeMap::new();
        for (path, is_dir) in self.known_paths() {
            let Ok(rest) = path.strip_prefix(dir) else {
                continue;
            };
            let mut components = rest.components();
            let Some(first) = components.next() else {
                continue;
            };
            let below = components.next().is_some() || is_dir;
            let slot = entries
                .entry(first.as_os_str().to_string_lossy().into_owned())
                .or_insert(false);
            *slot |= below;
        }
        Ok(entries
            .into_iter()
            .map(|(name, is_dir)| DirEntry {
                name,
                is_dir,
                is_symlink: false,
            })
            .collect())
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<()> {
        let contents = self.read_to_string(from)?;
        self.files
            .lock()
            .expect("mock files poisoned")
            .insert(to.to_path_buf(), contents);
        self.record(MockOp::CopyFile(from.to_path_buf(), to.to_path_buf()));
        Ok(())
    }
}
