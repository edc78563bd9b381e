//! The project model and its execution entry points.
//!
//! A [`Project`] owns the property store, the target table and the injected
//! collaborators (filesystem driver, event sink, custom predicates).
//! [`Project::execute_targets`] plans the dependency closure of the requested
//! targets, then runs it serially or, with [`BuildOptions::parallel`], on
//! scoped threads.

mod context;
mod executor;
mod graph;
mod scheduler;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;

use crate::conditions::{Condition, ConditionContext, PredicateRegistry};
use crate::error::{BuildError, Result};
use crate::exec::{Executor, SystemExecutor};
use crate::fs::FileSystem;
use crate::logging::{EventSink, Logger};
use crate::properties::PropertyStore;
use crate::tasks::Task;

pub use context::TaskContext;

/// One task inside a target, with its own optional guards.
#[derive(Clone)]
pub struct TaskSpec {
    /// Label used in events (defaults to the task's kind).
    pub label: String,
    /// Run only when this holds.
    pub if_condition: Option<Condition>,
    /// Skip when this holds.
    pub unless_condition: Option<Condition>,
    /// The task body.
    pub task: Arc<dyn Task>,
}

impl fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSpec")
            .field("label", &self.label)
            .field("if_condition", &self.if_condition)
            .field("unless_condition", &self.unless_condition)
            .finish_non_exhaustive()
    }
}

impl TaskSpec {
    /// Wrap a task, labelled by its kind.
    pub fn new(task: impl Task + 'static) -> Self {
        Self::from_arc(Arc::new(task))
    }

    /// Wrap an already shared task.
    #[must_use]
    pub fn from_arc(task: Arc<dyn Task>) -> Self {
        Self {
            label: task.kind().to_string(),
            if_condition: None,
            unless_condition: None,
            task,
        }
    }

    /// Override the event label.
    #[must_use]
    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the `if` guard.
    #[must_use]
    pub fn when(mut self, condition: Condition) -> Self {
        self.if_condition = Some(condition);
        self
    }

    /// Set the `unless` guard.
    #[must_use]
    pub fn unless(mut self, condition: Condition) -> Self {
        self.unless_condition = Some(condition);
        self
    }
}

/// A named unit of work with dependencies and a task sequence.
#[derive(Debug, Clone)]
pub struct Target {
    /// Unique name.
    pub name: String,
    /// Targets that must complete first, in declaration order.
    pub depends: Vec<String>,
    /// Tasks run in order.
    pub tasks: Vec<TaskSpec>,
    /// Run only when this holds.
    pub if_condition: Option<Condition>,
    /// Skip when this holds.
    pub unless_condition: Option<Condition>,
    /// Shown by `describe_targets`.
    pub description: Option<String>,
}

impl Target {
    /// An empty target.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            depends: Vec::new(),
            tasks: Vec::new(),
            if_condition: None,
            unless_condition: None,
            description: None,
        }
    }

    /// Add a dependency.
    #[must_use]
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends.push(name.into());
        self
    }

    /// Append a task.
    #[must_use]
    pub fn task(mut self, spec: TaskSpec) -> Self {
        self.tasks.push(spec);
        self
    }

    /// Set the `if` guard.
    #[must_use]
    pub fn when(mut self, condition: Condition) -> Self {
        self.if_condition = Some(condition);
        self
    }

    /// Set the `unless` guard.
    #[must_use]
    pub fn unless(mut self, condition: Condition) -> Self {
        self.unless_condition = Some(condition);
        self
    }

    /// Set the description.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn conditions(&self) -> impl Iterator<Item = &Condition> {
        let own = self.if_condition.iter().chain(&self.unless_condition);
        let tasks = self
            .tasks
            .iter()
            .flat_map(|t| t.if_condition.iter().chain(&t.unless_condition));
        own.chain(tasks)
    }
}

/// Build-level execution switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Continue with unaffected targets after a failure.
    pub keep_going: bool,
    /// Run independent branches concurrently.
    pub parallel: bool,
}

/// Execution state of a target within one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetStatus {
    /// Planned, not started.
    Pending,
    /// Tasks are running.
    Running,
    /// Every task ran.
    Succeeded,
    /// A task failed.
    Failed,
    /// Not run; the reason says why.
    Skipped {
        /// Guard outcome or `dependency failed`.
        reason: String,
    },
}

impl TargetStatus {
    /// Whether the target will not change state again.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Running => f.write_str("running"),
            Self::Succeeded => f.write_str("succeeded"),
            Self::Failed => f.write_str("failed"),
            Self::Skipped { reason } => write!(f, "skipped ({reason})"),
        }
    }
}

/// Terminal status of every executed target, in completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// `(target, status)` pairs.
    pub targets: Vec<(String, TargetStatus)>,
}

impl BuildReport {
    /// Status of `name`, if it was part of the build.
    #[must_use]
    pub fn status(&self, name: &str) -> Option<&TargetStatus> {
        self.targets
            .iter()
            .find_map(|(n, s)| (n == name).then_some(s))
    }

    /// Names in completion order.
    #[must_use]
    pub fn order(&self) -> Vec<&str> {
        self.targets.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Names of targets that succeeded, in completion order.
    #[must_use]
    pub fn succeeded(&self) -> Vec<&str> {
        self.targets
            .iter()
            .filter(|(_, s)| *s == TargetStatus::Succeeded)
            .map(|(n, _)| n.as_str())
            .collect()
    }
}

/// Root build context.
pub struct Project {
    name: Option<String>,
    base_dir: PathBuf,
    default_target: Option<String>,
    properties: PropertyStore,
    targets: IndexMap<String, Target>,
    fs: Arc<dyn FileSystem>,
    executor: Arc<dyn Executor>,
    sink: Arc<dyn EventSink>,
    predicates: PredicateRegistry,
    options: BuildOptions,
    statuses: RwLock<HashMap<String, TargetStatus>>,
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Project")
            .field("name", &self.name)
            .field("base_dir", &self.base_dir)
            .field("default_target", &self.default_target)
            .field("targets", &self.targets.keys().collect::<Vec<_>>())
            .field("fs", &self.fs.name())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Project {
    /// An empty project rooted at `base_dir`, logging through [`Logger`].
    pub fn new(base_dir: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            name: None,
            base_dir: base_dir.into(),
            default_target: None,
            properties: PropertyStore::new(),
            targets: IndexMap::new(),
            fs,
            executor: Arc::new(SystemExecutor),
            sink: Arc::new(Logger::new()),
            predicates: PredicateRegistry::new(),
            options: BuildOptions::default(),
            statuses: RwLock::new(HashMap::new()),
        }
    }

    /// Set the project name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Replace the event sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the process executor.
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    /// Replace the execution options.
    #[must_use]
    pub const fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the default target.
    pub fn set_default_target(&mut self, name: impl Into<String>) {
        self.default_target = Some(name.into());
    }

    /// Register a target.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::DuplicateTarget`] if the name is taken.
    pub fn add_target(&mut self, target: Target) -> Result<()> {
        if self.targets.contains_key(&target.name) {
            return Err(BuildError::DuplicateTarget(target.name));
        }
        self.targets.insert(target.name.clone(), target);
        Ok(())
    }

    /// Project name, if declared.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Directory relative paths resolve against.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Default target, if declared.
    #[must_use]
    pub fn default_target(&self) -> Option<&str> {
        self.default_target.as_deref()
    }

    /// The live property store.
    #[must_use]
    pub const fn properties(&self) -> &PropertyStore {
        &self.properties
    }

    /// The filesystem driver.
    #[must_use]
    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    /// The process executor.
    #[must_use]
    pub fn executor(&self) -> &dyn Executor {
        self.executor.as_ref()
    }

    /// The event sink.
    #[must_use]
    pub fn sink(&self) -> &Arc<dyn EventSink> {
        &self.sink
    }

    /// Custom predicates available to guards.
    pub const fn predicates_mut(&mut self) -> &mut PredicateRegistry {
        &mut self.predicates
    }

    /// Execution options.
    #[must_use]
    pub const fn options(&self) -> BuildOptions {
        self.options
    }

    /// A target by name.
    #[must_use]
    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.get(name)
    }

    /// Target names in declaration order.
    #[must_use]
    pub fn target_names(&self) -> Vec<&str> {
        self.targets.keys().map(String::as_str).collect()
    }

    /// `(name, description)` for every described target, in declaration order.
    #[must_use]
    pub fn describe_targets(&self) -> Vec<(&str, &str)> {
        self.targets
            .values()
            .filter_map(|t| t.description.as_deref().map(|d| (t.name.as_str(), d)))
            .collect()
    }

    /// Live status of `name` in the running or most recent build.
    ///
    /// Targets planned for the build start as [`TargetStatus::Pending`],
    /// become [`TargetStatus::Running`] once their guards pass, and end in a
    /// terminal status. Targets outside the plan report `None`.
    #[must_use]
    pub fn status(&self, name: &str) -> Option<TargetStatus> {
        self.statuses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub(crate) fn set_status(&self, name: &str, status: TargetStatus) {
        self.statuses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), status);
    }

    fn reset_statuses(&self, order: &[&Target]) {
        let mut statuses = self.statuses.write().unwrap_or_else(PoisonError::into_inner);
        statuses.clear();
        statuses.extend(order.iter().map(|t| (t.name.clone(), TargetStatus::Pending)));
    }

    /// Check the whole target table before anything runs.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnknownTarget`] for a dangling dependency or
    /// default, [`BuildError::CyclicDependency`] for a cycle, and
    /// [`BuildError::UnknownPredicate`] for an unregistered custom guard.
    pub fn validate(&self) -> Result<()> {
        graph::plan(&self.targets, &self.target_names())?;
        if let Some(default) = &self.default_target
            && !self.targets.contains_key(default)
        {
            return Err(BuildError::UnknownTarget {
                name: default.clone(),
                required_by: None,
            });
        }
        for target in self.targets.values() {
            for condition in target.conditions() {
                if let Some(name) = condition
                    .custom_names()
                    .into_iter()
                    .find(|n| !self.predicates.contains(n))
                {
                    return Err(BuildError::UnknownPredicate(name.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Run one target and its dependency closure.
    ///
    /// # Errors
    ///
    /// See [`Project::execute_targets`].
    pub fn execute_target(&self, name: &str) -> Result<BuildReport> {
        self.execute_targets(&[name])
    }

    /// Run the default target.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::NoDefaultTarget`] if none is declared, otherwise
    /// see [`Project::execute_targets`].
    pub fn execute_default(&self) -> Result<BuildReport> {
        let name = self.default_target.as_deref().ok_or(BuildError::NoDefaultTarget)?;
        self.execute_target(name)
    }

    /// Run the named targets, sharing one memo so a common dependency runs
    /// once for the whole build.
    ///
    /// # Errors
    ///
    /// Structural problems ([`BuildError::UnknownTarget`],
    /// [`BuildError::CyclicDependency`]) are reported before any task runs.
    /// A failing task yields [`BuildError::TaskFailure`]; in keep-going mode
    /// all failures are collected into [`BuildError::BuildFailed`]. A
    /// property cycle aborts with [`BuildError::CircularPropertyReference`].
    pub fn execute_targets<S: AsRef<str>>(&self, names: &[S]) -> Result<BuildReport> {
        let order = graph::plan(&self.targets, names)?;
        self.reset_statuses(&order);
        let roots: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
        if self.options.parallel {
            scheduler::run_parallel(self, &order, &roots)
        } else {
            executor::run_serial(self, &order, &roots)
        }
    }

    pub(crate) fn condition_context(&self) -> ConditionContext<'_> {
        ConditionContext {
            properties: &self.properties,
            fs: self.fs.as_ref(),
            base_dir: &self.base_dir,
            predicates: &self.predicates,
        }
    }
}
