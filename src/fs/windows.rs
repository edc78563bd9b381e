//! Windows filesystem driver.
//!
//! Windows has no POSIX mode bits; they are emulated from the read-only
//! attribute and the file's extension. The driver is plain portable code so
//! its path rules are unit-tested on every host.
use std::path::{Path, PathBuf};

use super::{FileSystem, canonical_or_lexical};
use crate::error::{BuildError, Result};

const EXECUTABLE_EXTENSIONS: &[&str] = &["exe", "bat", "cmd", "com"];

/// Driver for Windows hosts.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsFileSystem;

impl WindowsFileSystem {
    /// Case-folded, separator-normalised key used for path comparison.
    fn comparison_key(path: &Path) -> String {
        let resolved: PathBuf = canonical_or_lexical(path);
        resolved
            .to_string_lossy()
            .replace('/', "\\")
            .trim_end_matches('\\')
            .to_lowercase()
    }

    #[allow(clippy::permissions_set_readonly_false)]
    fn clear_readonly(path: &Path) -> std::io::Result<()> {
        let meta = std::fs::symlink_metadata(path)?;
        let mut perms = meta.permissions();
        if perms.readonly() {
            perms.set_readonly(false);
            std::fs::set_permissions(path, perms)?;
        }
        Ok(())
    }
}

impl FileSystem for WindowsFileSystem {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn case_sensitive(&self) -> bool {
        false
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        if std::fs::symlink_metadata(path).is_err() {
            return Ok(());
        }
        Self::clear_readonly(path).map_err(|e| BuildError::io(path, e))?;
        std::fs::remove_file(path).map_err(|e| BuildError::io(path, e))
    }

    fn remove_dir(&self, path: &Path, recursive: bool) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        if !recursive {
            return std::fs::remove_dir(path).map_err(|e| BuildError::io(path, e));
        }
        // Read-only entries block removal on Windows.
        for entry in walkdir::WalkDir::new(path).contents_first(true) {
            let entry = entry.map_err(|e| {
                BuildError::io(path, e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::other("directory walk failed")
                }))
            })?;
            Self::clear_readonly(entry.path()).map_err(|e| BuildError::io(entry.path(), e))?;
        }
        std::fs::remove_dir_all(path).map_err(|e| BuildError::io(path, e))
    }

    fn same_path(&self, a: &Path, b: &Path) -> bool {
        Self::comparison_key(a) == Self::comparison_key(b)
    }

    fn permissions(&self, path: &Path) -> Result<u32> {
        let meta = std::fs::metadata(path).map_err(|e| BuildError::io(path, e))?;
        let mut mode = if meta.permissions().readonly() {
            0o444
        } else {
            0o666
        };
        let executable = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                EXECUTABLE_EXTENSIONS
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            });
        if meta.is_dir() || executable {
            mode |= 0o111;
        }
        Ok(mode)
    }

    fn set_permissions(&self, path: &Path, mode: u32) -> Result<()> {
        let meta = std::fs::metadata(path).map_err(|e| BuildError::io(path, e))?;
        let mut perms = meta.permissions();
        perms.set_readonly(mode & 0o200 == 0);
        std::fs::set_permissions(path, perms).map_err(|e| BuildError::io(path, e))
    }
}
