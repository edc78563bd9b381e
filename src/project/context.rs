//! Per-task view of the project handed to [`Task::perform`](crate::tasks::Task::perform).
use std::path::{Path, PathBuf};

use crate::conditions::ConditionContext;
use crate::error::Result;
use crate::exec::Executor;
use crate::filters::FilterEnv;
use crate::fs::{self, FileSystem};
use crate::logging::{BuildEvent, EventKind, EventSink, Level};
use crate::properties::PropertyStore;
use crate::selector::Selector;

use super::Project;

/// What a running task may touch.
///
/// Events go to the sink of the owning target, which is buffered during
/// parallel execution.
#[derive(Clone, Copy)]
pub struct TaskContext<'a> {
    project: &'a Project,
    target: &'a str,
    task: &'a str,
    sink: &'a dyn EventSink,
}

impl std::fmt::Debug for TaskContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("target", &self.target)
            .field("task", &self.task)
            .finish_non_exhaustive()
    }
}

impl<'a> TaskContext<'a> {
    pub(crate) const fn new(
        project: &'a Project,
        target: &'a str,
        task: &'a str,
        sink: &'a dyn EventSink,
    ) -> Self {
        Self {
            project,
            target,
            task,
            sink,
        }
    }

    /// The owning project.
    #[must_use]
    pub const fn project(&self) -> &'a Project {
        self.project
    }

    /// Name of the running target.
    #[must_use]
    pub const fn target_name(&self) -> &'a str {
        self.target
    }

    /// Label of the running task.
    #[must_use]
    pub const fn task_name(&self) -> &'a str {
        self.task
    }

    /// The live property store.
    #[must_use]
    pub const fn properties(&self) -> &'a PropertyStore {
        self.project.properties()
    }

    /// The filesystem driver.
    #[must_use]
    pub fn fs(&self) -> &'a dyn FileSystem {
        self.project.fs()
    }

    /// The process executor.
    #[must_use]
    pub fn executor(&self) -> &'a dyn Executor {
        self.project.executor()
    }

    /// The project base directory.
    #[must_use]
    pub fn base_dir(&self) -> &'a Path {
        self.project.base_dir()
    }

    /// Expand `${..}` references against the current store.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::CircularPropertyReference`](crate::error::BuildError::CircularPropertyReference)
    /// on a cycle.
    pub fn expand(&self, text: &str) -> Result<String> {
        self.properties().expand(text)
    }

    /// Expand `raw` and resolve it against the base directory.
    ///
    /// # Errors
    ///
    /// Same as [`TaskContext::expand`].
    pub fn resolve_path(&self, raw: &str) -> Result<PathBuf> {
        let expanded = self.expand(raw)?;
        Ok(fs::normalize_lexically(&self.base_dir().join(expanded)))
    }

    /// Assign a property (first write wins) and report it.
    pub fn set_property(&self, name: &str, value: &str) -> bool {
        let stored = self.properties().set(name, value);
        let message = if stored {
            format!("{name} = {value}")
        } else {
            format!("{name} already set, keeping existing value")
        };
        self.emit(BuildEvent::task(EventKind::PropertySet, self.target, self.task, message)
            .with_level(Level::Debug));
        stored
    }

    /// Emit a free-form message.
    pub fn log(&self, level: Level, message: impl Into<String>) {
        self.emit(BuildEvent::task(EventKind::Message, self.target, self.task, message).with_level(level));
    }

    /// Run `selector` below `base` and report how many entries matched.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Filesystem`](crate::error::BuildError::Filesystem)
    /// if the walk fails.
    pub fn select(&self, selector: &Selector, base: &Path) -> Result<Vec<PathBuf>> {
        let selected = selector.select_with(self.fs(), base)?;
        self.emit(
            BuildEvent::task(
                EventKind::Selection,
                self.target,
                self.task,
                format!("{} entries under {}", selected.len(), base.display()),
            )
            .with_level(Level::Debug),
        );
        Ok(selected)
    }

    /// Collaborators for reading through a filter chain.
    #[must_use]
    pub fn filter_env(&self) -> FilterEnv<'a> {
        FilterEnv {
            fs: self.fs(),
            properties: self.properties(),
            base_dir: self.base_dir(),
        }
    }

    /// Collaborators for evaluating a condition.
    #[must_use]
    pub fn condition_context(&self) -> ConditionContext<'a> {
        self.project.condition_context()
    }

    fn emit(&self, event: BuildEvent) {
        self.sink.emit(event);
    }
}
