use anyhow::Result;

use super::{Task, TaskDescriptor};
use crate::logging::Level;
use crate::project::TaskContext;

/// Create a directory and its missing ancestors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MkdirTask {
    dir: String,
}

impl MkdirTask {
    /// Build from the required `dir` attribute.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidTask`](crate::error::BuildError::InvalidTask)
    /// if `dir` is missing.
    pub fn from_descriptor(d: &TaskDescriptor) -> crate::error::Result<Self> {
        d.allow(&["dir"])?;
        Ok(Self {
            dir: d.required("dir")?,
        })
    }
}

impl Task for MkdirTask {
    fn kind(&self) -> &'static str {
        "mkdir"
    }

    fn perform(&self, ctx: &TaskContext<'_>) -> Result<()> {
        let path = ctx.resolve_path(&self.dir)?;
        if ctx.fs().is_dir(&path) {
            return Ok(());
        }
        ctx.fs().create_dir_all(&path)?;
        ctx.log(Level::Info, format!("Created dir: {}", path.display()));
        Ok(())
    }
}
