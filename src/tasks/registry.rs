//! Maps task kind tags to constructors.
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::{
    ChmodTask, CopyTask, DeleteTask, EchoTask, ExecTask, FailTask, MkdirTask, PropertyTask, Task,
    TaskDescriptor,
};
use crate::error::{BuildError, Result};

/// Builds a task from its descriptor, validating attributes.
pub type TaskConstructor = Box<dyn Fn(&TaskDescriptor) -> Result<Arc<dyn Task>> + Send + Sync>;

/// Registry of task kinds available to the descriptor loader.
#[derive(Default)]
pub struct TaskRegistry {
    constructors: BTreeMap<String, TaskConstructor>,
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl TaskRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in kind.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_task("property", PropertyTask::from_descriptor);
        registry.register_task("echo", EchoTask::from_descriptor);
        registry.register_task("mkdir", MkdirTask::from_descriptor);
        registry.register_task("delete", DeleteTask::from_descriptor);
        registry.register_task("copy", CopyTask::from_descriptor);
        registry.register_task("chmod", ChmodTask::from_descriptor);
        registry.register_task("exec", ExecTask::from_descriptor);
        registry.register_task("fail", FailTask::from_descriptor);
        registry
    }

    /// Register (or replace) the constructor for `kind`.
    pub fn register<F>(&mut self, kind: impl Into<String>, constructor: F)
    where
        F: Fn(&TaskDescriptor) -> Result<Arc<dyn Task>> + Send + Sync + 'static,
    {
        self.constructors.insert(kind.into(), Box::new(constructor));
    }

    /// Register a kind whose constructor yields a concrete task type.
    pub fn register_task<T, F>(&mut self, kind: impl Into<String>, constructor: F)
    where
        T: Task + 'static,
        F: Fn(&TaskDescriptor) -> Result<T> + Send + Sync + 'static,
    {
        self.register(kind, move |d| {
            constructor(d).map(|t| Arc::new(t) as Arc<dyn Task>)
        });
    }

    /// Whether `kind` is registered.
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    /// Registered kinds, sorted.
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Build the task a descriptor names.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnknownTaskKind`] for an unregistered kind and
    /// whatever the constructor reports for bad attributes.
    pub fn create(&self, descriptor: &TaskDescriptor) -> Result<Arc<dyn Task>> {
        let constructor = self
            .constructors
            .get(&descriptor.kind)
            .ok_or_else(|| BuildError::UnknownTaskKind(descriptor.kind.clone()))?;
        constructor(descriptor)
    }
}
