//! Filesystem driver abstraction.
//!
//! Every file operation the engine performs goes through a [`FileSystem`]
//! trait object chosen once at startup by [`for_platform`] and injected into
//! the [`Project`](crate::project::Project). Drivers hold no process-wide
//! state (in particular they never change the current directory), so a single
//! instance is safe to share between parallel targets.

#[cfg(test)]
pub(crate) mod mock;
#[cfg(unix)]
mod unix;
mod windows;

use std::io::Write as _;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use walkdir::WalkDir;

use crate::error::{BuildError, Result};
use crate::platform::{Os, Platform};

#[cfg(test)]
pub use mock::{MockFileSystem, MockOp};
#[cfg(unix)]
pub use unix::UnixFileSystem;
pub use windows::WindowsFileSystem;

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// File name inside the listed directory.
    pub name: String,
    /// Whether the entry is a directory (after following a symlink, when asked to).
    pub is_dir: bool,
    /// Whether the entry itself is a symlink.
    pub is_symlink: bool,
}

/// Platform-specific file primitives.
///
/// The content helpers (`read_to_string`, `write`, `copy_file`, `create_dir_all`)
/// have portable default implementations; drivers override the operations
/// whose semantics differ between hosts.
pub trait FileSystem: Send + Sync + std::fmt::Debug {
    /// Short driver name (`"unix"`, `"windows"`).
    fn name(&self) -> &'static str;

    /// Whether path names compare case-sensitively on this host.
    fn case_sensitive(&self) -> bool;

    /// Delete a single file. Deleting a missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Filesystem`] if the file exists but cannot be removed.
    fn delete_file(&self, path: &Path) -> Result<()>;

    /// Remove a directory; with `recursive` its contents go too.
    ///
    /// Removing a missing directory is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Filesystem`] if removal fails (for example a
    /// non-empty directory without `recursive`).
    fn remove_dir(&self, path: &Path, recursive: bool) -> Result<()>;

    /// Locate `name` on the executable search path, returning `fallback`
    /// unchanged when nothing is found.
    fn locate_executable(&self, name: &str, fallback: &str) -> String {
        which::which(name).map_or_else(
            |_| fallback.to_string(),
            |found| found.to_string_lossy().into_owned(),
        )
    }

    /// Whether `a` and `b` name the same file under this host's rules.
    fn same_path(&self, a: &Path, b: &Path) -> bool;

    /// POSIX-style permission bits of `path` (`0o7777` mask).
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Filesystem`] if `path` cannot be inspected.
    fn permissions(&self, path: &Path) -> Result<u32>;

    /// Apply POSIX-style permission bits to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Filesystem`] if the permissions cannot be changed.
    fn set_permissions(&self, path: &Path, mode: u32) -> Result<()>;

    /// Returns `true` if `path` exists.
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    /// Returns `true` if `path` is a directory.
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    /// Create `path` and any missing ancestors.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Filesystem`] if a directory cannot be created.
    fn create_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path).map_err(|e| BuildError::io(path, e))
    }

    /// Read a whole file as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Filesystem`] if the file cannot be read.
    fn read_to_string(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|e| BuildError::io(path, e))
    }

    /// Write `contents` to `path`, creating parent directories first.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Filesystem`] if the file cannot be written.
    fn write(&self, path: &Path, contents: &str, append: bool) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
            .map_err(|e| BuildError::io(path, e))?;
        file.write_all(contents.as_bytes())
            .map_err(|e| BuildError::io(path, e))
    }

    /// Copy a single file, creating the destination's parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Filesystem`] if the copy fails.
    fn copy_file(&self, from: &Path, to: &Path) -> Result<()> {
        if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.create_dir_all(parent)?;
        }
        std::fs::copy(from, to)
            .map(|_| ())
            .map_err(|e| BuildError::io(from, e))
    }

    /// Resolve `path` to an absolute path with symlinks resolved.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Filesystem`] if `path` does not exist.
    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        dunce::canonicalize(path).map_err(|e| BuildError::io(path, e))
    }

    /// Entries directly inside `dir`, sorted by file name.
    ///
    /// With `follow_symlinks`, a symlink reports the type of its target.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Filesystem`] if `dir` or one of its entries
    /// cannot be read.
    fn read_dir_sorted(&self, dir: &Path, follow_symlinks: bool) -> Result<Vec<DirEntry>> {
        WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .map(|entry| {
                let entry = entry.map_err(|e| walk_error(dir, e))?;
                Ok(DirEntry {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    is_dir: entry.file_type().is_dir(),
                    is_symlink: entry.path_is_symlink(),
                })
            })
            .collect()
    }
}

fn walk_error(dir: &Path, err: walkdir::Error) -> BuildError {
    let path = err.path().map_or_else(|| dir.to_path_buf(), Path::to_path_buf);
    let message = err.to_string();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other(message));
    BuildError::io(path, source)
}

/// Select the driver for `platform`.
///
/// # Errors
///
/// Returns [`BuildError::UnsupportedPlatform`] if the platform has no driver
/// compiled into this binary.
pub fn for_platform(platform: &Platform) -> Result<Arc<dyn FileSystem>> {
    match platform.require_supported()? {
        Os::Windows => Ok(Arc::new(WindowsFileSystem)),
        #[cfg(unix)]
        Os::Unix => Ok(Arc::new(UnixFileSystem)),
        _ => Err(BuildError::UnsupportedPlatform {
            platform: platform.target_os.to_string(),
        }),
    }
}

/// Select the driver for the current host.
///
/// # Errors
///
/// Returns [`BuildError::UnsupportedPlatform`] on hosts without a driver.
pub fn detect() -> Result<Arc<dyn FileSystem>> {
    for_platform(&Platform::detect())
}

/// Resolve `.` and `..` components without touching the filesystem.
///
/// A `..` that would climb above the root (or above the first component of a
/// relative path) is kept.
#[must_use]
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out.iter().collect()
}

/// Canonicalize `path` when it exists, otherwise normalize it lexically.
pub(crate) fn canonical_or_lexical(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| normalize_lexically(path))
}
