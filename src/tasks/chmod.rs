use anyhow::{Context as _, Result};

use super::{Task, TaskDescriptor};
use crate::error::BuildError;
use crate::logging::Level;
use crate::project::TaskContext;

/// Apply octal permission bits to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChmodTask {
    file: String,
    mode: u32,
}

impl ChmodTask {
    /// Build from `file` and octal `perm` (e.g. `"755"`).
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidTask`] if either is missing or `perm` is
    /// not an octal mode.
    pub fn from_descriptor(d: &TaskDescriptor) -> crate::error::Result<Self> {
        d.allow(&["file", "perm"])?;
        let perm = d.required("perm")?;
        let mode = parse_mode(&perm).ok_or_else(|| BuildError::InvalidTask {
            kind: d.kind.clone(),
            reason: format!("'{perm}' is not an octal mode"),
        })?;
        Ok(Self {
            file: d.required("file")?,
            mode,
        })
    }
}

fn parse_mode(perm: &str) -> Option<u32> {
    u32::from_str_radix(perm.trim(), 8)
        .ok()
        .filter(|m| *m <= 0o7777)
}

impl Task for ChmodTask {
    fn kind(&self) -> &'static str {
        "chmod"
    }

    fn perform(&self, ctx: &TaskContext<'_>) -> Result<()> {
        let path = ctx.resolve_path(&self.file)?;
        ctx.fs()
            .set_permissions(&path, self.mode)
            .with_context(|| format!("chmod {:o} {}", self.mode, path.display()))?;
        ctx.log(Level::Debug, format!("{:o} {}", self.mode, path.display()));
        Ok(())
    }
}
