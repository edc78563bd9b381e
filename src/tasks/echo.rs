use anyhow::{Context as _, Result};

use super::{Task, TaskDescriptor, expand_opt};
use crate::logging::Level;
use crate::project::TaskContext;

/// Print a message, or write it to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoTask {
    message: String,
    file: Option<String>,
    append: bool,
}

impl EchoTask {
    /// Build from `message`, optional `file` and `append`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidTask`](crate::error::BuildError::InvalidTask)
    /// for unknown or malformed attributes.
    pub fn from_descriptor(d: &TaskDescriptor) -> crate::error::Result<Self> {
        d.allow(&["message", "file", "append"])?;
        Ok(Self {
            message: d.string("message")?.unwrap_or_default(),
            file: d.string("file")?,
            append: d.flag("append")?.unwrap_or(false),
        })
    }
}

impl Task for EchoTask {
    fn kind(&self) -> &'static str {
        "echo"
    }

    fn perform(&self, ctx: &TaskContext<'_>) -> Result<()> {
        let message = ctx.expand(&self.message)?;
        match expand_opt(ctx, self.file.as_deref())? {
            Some(file) => {
                let path = ctx.resolve_path(&file)?;
                ctx.fs()
                    .write(&path, &message, self.append)
                    .with_context(|| format!("writing {}", path.display()))?;
            }
            None => ctx.log(Level::Info, message),
        }
        Ok(())
    }
}
