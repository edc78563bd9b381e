//! Task capability trait, the kind registry and the built-in task kinds.
mod chmod;
mod copy;
mod delete;
mod descriptor;
mod echo;
mod exec;
mod fail;
mod mkdir;
mod property;
mod registry;

pub use chmod::ChmodTask;
pub use copy::CopyTask;
pub use delete::DeleteTask;
pub use descriptor::TaskDescriptor;
pub use echo::EchoTask;
pub use exec::ExecTask;
pub use fail::FailTask;
pub use mkdir::MkdirTask;
pub use property::PropertyTask;
pub use registry::{TaskConstructor, TaskRegistry};

use std::fmt;

use anyhow::Result;

use crate::project::TaskContext;

/// One unit of work inside a target.
///
/// Implementations hold their (unexpanded) attributes and resolve them
/// against the live property store when [`perform`](Task::perform) runs, so
/// values set by earlier targets are visible.
pub trait Task: Send + Sync + fmt::Debug {
    /// Kind tag, used as the default event label.
    fn kind(&self) -> &str;

    /// Execute the task.
    ///
    /// # Errors
    ///
    /// Returns an error if the task cannot complete; the executor fails the
    /// owning target with it.
    fn perform(&self, ctx: &TaskContext<'_>) -> Result<()>;
}

/// A task backed by a closure.
pub struct FnTask<F> {
    kind: String,
    body: F,
}

impl<F> fmt::Debug for FnTask<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTask")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl<F> Task for FnTask<F>
where
    F: Fn(&TaskContext<'_>) -> Result<()> + Send + Sync,
{
    fn kind(&self) -> &str {
        &self.kind
    }

    fn perform(&self, ctx: &TaskContext<'_>) -> Result<()> {
        (self.body)(ctx)
    }
}

/// Wrap a closure as a [`Task`] of the given kind.
pub fn from_fn<F>(kind: impl Into<String>, body: F) -> FnTask<F>
where
    F: Fn(&TaskContext<'_>) -> Result<()> + Send + Sync,
{
    FnTask {
        kind: kind.into(),
        body,
    }
}

/// Expand an optional attribute.
fn expand_opt(ctx: &TaskContext<'_>, raw: Option<&str>) -> Result<Option<String>> {
    Ok(raw.map(|r| ctx.expand(r)).transpose()?)
}
