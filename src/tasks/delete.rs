use anyhow::Result;

use super::{Task, TaskDescriptor};
use crate::error::BuildError;
use crate::logging::Level;
use crate::project::TaskContext;

/// Delete a file, or a directory (recursively unless told otherwise).
///
/// Missing targets are not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTask {
    /// A single file.
    File(String),
    /// A directory.
    Dir {
        /// Path relative to the base directory.
        dir: String,
        /// Remove contents too.
        recursive: bool,
    },
}

impl DeleteTask {
    /// Build from `file`, or `dir` + `recursive` (default `true`).
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidTask`] unless exactly one of `file` or
    /// `dir` is given.
    pub fn from_descriptor(d: &TaskDescriptor) -> crate::error::Result<Self> {
        d.allow(&["file", "dir", "recursive"])?;
        match (d.string("file")?, d.string("dir")?) {
            (Some(file), None) => Ok(Self::File(file)),
            (None, Some(dir)) => Ok(Self::Dir {
                dir,
                recursive: d.flag("recursive")?.unwrap_or(true),
            }),
            _ => Err(BuildError::InvalidTask {
                kind: d.kind.clone(),
                reason: "exactly one of 'file' or 'dir' is required".into(),
            }),
        }
    }
}

impl Task for DeleteTask {
    fn kind(&self) -> &'static str {
        "delete"
    }

    fn perform(&self, ctx: &TaskContext<'_>) -> Result<()> {
        match self {
            Self::File(file) => {
                let path = ctx.resolve_path(file)?;
                if !ctx.fs().exists(&path) {
                    return Ok(());
                }
                ctx.fs().delete_file(&path)?;
                ctx.log(Level::Info, format!("Deleting: {}", path.display()));
            }
            Self::Dir { dir, recursive } => {
                let path = ctx.resolve_path(dir)?;
                if !ctx.fs().is_dir(&path) {
                    return Ok(());
                }
                ctx.fs().remove_dir(&path, *recursive)?;
                ctx.log(Level::Info, format!("Deleting directory {}", path.display()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::fs::{MockFileSystem, MockOp};
    use crate::project::Project;
    use crate::tasks::test_helpers::perform;
    use std::sync::Arc;

    fn project(fs: MockFileSystem) -> (Project, Arc<MockFileSystem>) {
        let fs = Arc::new(fs);
        (Project::new("/work", fs.clone()), fs)
    }

    #[test]
    fn deletes_existing_file_only() {
        let (p, fs) = project(MockFileSystem::new().with_file("/work/a.txt", "x"));
        perform(&p, &DeleteTask::File("a.txt".into())).0.unwrap();
        perform(&p, &DeleteTask::File("gone.txt".into())).0.unwrap();
        assert_eq!(fs.ops(), [MockOp::DeleteFile(PathBuf::from("/work/a.txt"))]);
    }

    #[test]
    fn removes_directory_recursively_by_default() {
        let (p, fs) = project(MockFileSystem::new().with_dir("/work/build"));
        let task =
            DeleteTask::from_descriptor(&TaskDescriptor::new("delete").attr("dir", "build")).unwrap();
        perform(&p, &task).0.unwrap();
        assert_eq!(fs.ops(), [MockOp::RemoveDir(PathBuf::from("/work/build"), true)]);
    }

    #[test]
    fn needs_exactly_one_of_file_or_dir() {
        assert!(DeleteTask::from_descriptor(&TaskDescriptor::new("delete")).is_err());
        let both = TaskDescriptor::new("delete").attr("file", "a").attr("dir", "b");
        assert!(DeleteTask::from_descriptor(&both).is_err());
    }
}
