use anyhow::{Result, bail};

use super::{Task, TaskDescriptor};
use crate::project::TaskContext;

/// Fail the target with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailTask {
    message: String,
}

impl FailTask {
    /// Build from an optional `message`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidTask`](crate::error::BuildError::InvalidTask)
    /// for unknown attributes.
    pub fn from_descriptor(d: &TaskDescriptor) -> crate::error::Result<Self> {
        d.allow(&["message"])?;
        Ok(Self {
            message: d.string("message")?.unwrap_or_else(|| "No message".to_string()),
        })
    }
}

impl Task for FailTask {
    fn kind(&self) -> &'static str {
        "fail"
    }

    fn perform(&self, ctx: &TaskContext<'_>) -> Result<()> {
        bail!("{}", ctx.expand(&self.message)?)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;
    use crate::tasks::test_helpers::{perform, project_with};

    #[test]
    fn fails_with_expanded_message() {
        let project = project_with(MockFileSystem::new());
        project.properties().set("why", "disk full");
        let task =
            FailTask::from_descriptor(&TaskDescriptor::new("fail").attr("message", "stop: ${why}"))
                .unwrap();
        let err = perform(&project, &task).0.unwrap_err();
        assert_eq!(err.to_string(), "stop: disk full");
    }

    #[test]
    fn default_message() {
        let project = project_with(MockFileSystem::new());
        let task = FailTask::from_descriptor(&TaskDescriptor::new("fail")).unwrap();
        assert_eq!(perform(&project, &task).0.unwrap_err().to_string(), "No message");
    }
}
