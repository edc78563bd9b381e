//! Unix filesystem driver.
use std::os::unix::fs::PermissionsExt as _;
use std::path::Path;

use super::{FileSystem, canonical_or_lexical};
use crate::error::{BuildError, Result};

/// Driver for Linux, macOS and other Unix-like hosts.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixFileSystem;

impl FileSystem for UnixFileSystem {
    fn name(&self) -> &'static str {
        "unix"
    }

    fn case_sensitive(&self) -> bool {
        true
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other.map_err(|e| BuildError::io(path, e)),
        }
    }

    fn remove_dir(&self, path: &Path, recursive: bool) -> Result<()> {
        let result = if recursive {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_dir(path)
        };
        match result {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other.map_err(|e| BuildError::io(path, e)),
        }
    }

    fn same_path(&self, a: &Path, b: &Path) -> bool {
        canonical_or_lexical(a) == canonical_or_lexical(b)
    }

    fn permissions(&self, path: &Path) -> Result<u32> {
        let meta = std::fs::metadata(path).map_err(|e| BuildError::io(path, e))?;
        Ok(meta.permissions().mode() & 0o7777)
    }

    fn set_permissions(&self, path: &Path, mode: u32) -> Result<()> {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o7777))
            .map_err(|e| BuildError::io(path, e))
    }
}
