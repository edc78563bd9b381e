use std::path::PathBuf;

use anyhow::Result;

use super::{Task, TaskDescriptor, expand_opt};
use crate::logging::Level;
use crate::project::TaskContext;

/// Run an external program.
///
/// The executable is located on the search path through the filesystem
/// driver; the working directory defaults to the project base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecTask {
    executable: String,
    args: Vec<String>,
    dir: Option<String>,
    output_property: Option<String>,
    result_property: Option<String>,
    fail_on_error: bool,
}

impl ExecTask {
    /// Build from `executable`, `args`, `dir`, `output-property`,
    /// `result-property` and `fail-on-error` (default `true`).
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidTask`](crate::error::BuildError::InvalidTask)
    /// if `executable` is missing or an attribute is malformed.
    pub fn from_descriptor(d: &TaskDescriptor) -> crate::error::Result<Self> {
        d.allow(&[
            "executable",
            "args",
            "dir",
            "output-property",
            "result-property",
            "fail-on-error",
        ])?;
        Ok(Self {
            executable: d.required("executable")?,
            args: d.list("args")?,
            dir: d.string("dir")?,
            output_property: d.string("output-property")?,
            result_property: d.string("result-property")?,
            fail_on_error: d.flag("fail-on-error")?.unwrap_or(true),
        })
    }
}

impl Task for ExecTask {
    fn kind(&self) -> &'static str {
        "exec"
    }

    fn perform(&self, ctx: &TaskContext<'_>) -> Result<()> {
        let name = ctx.expand(&self.executable)?;
        let program = PathBuf::from(ctx.fs().locate_executable(&name, &name));
        let args = self
            .args
            .iter()
            .map(|a| ctx.expand(a))
            .collect::<crate::error::Result<Vec<_>>>()?;
        let dir = match expand_opt(ctx, self.dir.as_deref())? {
            Some(dir) => ctx.resolve_path(&dir)?,
            None => ctx.base_dir().to_path_buf(),
        };

        ctx.log(
            Level::Debug,
            format!("Executing '{}' with {} argument(s)", program.display(), args.len()),
        );
        let result = ctx.executor().run_in(&dir, &program, &args)?;

        if let Some(prop) = &self.result_property {
            let code = result.code.map_or_else(|| "-1".to_string(), |c| c.to_string());
            ctx.set_property(prop, &code);
        }
        match &self.output_property {
            Some(prop) => {
                ctx.set_property(prop, result.stdout.trim_end());
            }
            None => {
                for line in result.stdout.lines() {
                    ctx.log(Level::Info, line);
                }
            }
        }
        if self.fail_on_error {
            result.checked(&name)?;
        } else if !result.success {
            ctx.log(
                Level::Warn,
                format!("{name} exited with {}", result.code.unwrap_or(-1)),
            );
        }
        Ok(())
    }
}
