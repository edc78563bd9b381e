//! Domain-specific error types for the build engine.
//!
//! Every component returns [`BuildError`]. Task bodies are written against
//! [`anyhow::Result`] and the executor folds their failures into
//! [`BuildError::TaskFailure`], keeping the rendered cause chain so the
//! driver can print an actionable message.
//!
//! # Error kinds
//!
//! ```text
//! BuildError
//! ├── structural (load time)  UnknownTarget, NoDefaultTarget, DuplicateTarget, CyclicDependency,
//! │                           InvalidSelector, InvalidFilter, UnknownTaskKind,
//! │                           InvalidTask, UnknownPredicate
//! ├── expansion (lazy)        CircularPropertyReference, UndefinedProperty
//! ├── execution               TaskFailure, BuildFailed
//! └── host                    Filesystem, UnsupportedPlatform
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the build engine.
#[derive(Error, Debug)]
pub enum BuildError {
    /// A requested or depended-upon target does not exist.
    #[error("{}", unknown_target_message(.name, .required_by.as_deref()))]
    UnknownTarget {
        /// Name that could not be resolved.
        name: String,
        /// Target whose `depends` list named it, if any.
        required_by: Option<String>,
    },

    /// No target was requested and the project declares no default.
    #[error("No target specified and the project has no default target")]
    NoDefaultTarget,

    /// Two targets were registered under the same name.
    #[error("Duplicate target '{0}'")]
    DuplicateTarget(String),

    /// The dependency relation contains a cycle.
    #[error("Cyclic dependency: {}", .cycle.join(" -> "))]
    CyclicDependency {
        /// The cycle, starting and ending with the same target.
        cycle: Vec<String>,
    },

    /// A property references itself, directly or through other properties.
    #[error("Circular property reference: {}", .chain.join(" -> "))]
    CircularPropertyReference {
        /// The expansion chain, ending with the repeated name.
        chain: Vec<String>,
    },

    /// A property was required but never assigned.
    #[error("Property '{0}' is not defined")]
    UndefinedProperty(String),

    /// A task failed; the owning target is aborted.
    #[error("Task '{task}' in target '{target}' failed: {reason}")]
    TaskFailure {
        /// Target that owns the task.
        target: String,
        /// Task kind or label.
        task: String,
        /// Rendered cause chain.
        reason: String,
        /// Underlying error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// One or more targets failed in keep-going mode.
    #[error("Build failed: {} target(s) failed", .failures.len())]
    BuildFailed {
        /// Every failure collected during the build, in completion order.
        failures: Vec<BuildError>,
    },

    /// A selector pattern is malformed.
    #[error("Invalid selector pattern '{pattern}': {reason}")]
    InvalidSelector {
        /// Pattern as written.
        pattern: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A filter specification names an unknown type or carries a bad parameter.
    #[error("Invalid filter '{kind}': {reason}")]
    InvalidFilter {
        /// Filter type tag.
        kind: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A guard names a custom predicate that was never registered.
    #[error("Unknown condition predicate '{0}'")]
    UnknownPredicate(String),

    /// A task descriptor is missing an attribute or carries a bad one.
    #[error("Invalid '{kind}' task: {reason}")]
    InvalidTask {
        /// Task kind.
        kind: String,
        /// What is wrong with it.
        reason: String,
    },

    /// No task handler is registered for a descriptor's kind.
    #[error("Unknown task kind '{0}'")]
    UnknownTaskKind(String),

    /// An I/O operation failed.
    #[error("Filesystem error at {}: {source}", .path.display())]
    Filesystem {
        /// Path being operated on.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The host platform has no filesystem driver.
    #[error("Unsupported platform: {platform}")]
    UnsupportedPlatform {
        /// Platform identifier as reported by the compiler target.
        platform: String,
    },
}

fn unknown_target_message(name: &str, required_by: Option<&str>) -> String {
    match required_by {
        Some(parent) => format!("Target '{name}' does not exist (required by '{parent}')"),
        None => format!("Target '{name}' does not exist"),
    }
}

impl BuildError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Wrap a task body's failure.
    ///
    /// The `{:#}` rendering keeps every `.context(...)` layer in `reason`.
    pub fn task_failure(target: &str, task: &str, err: anyhow::Error) -> Self {
        Self::TaskFailure {
            target: target.to_string(),
            task: task.to_string(),
            reason: format!("{err:#}"),
            source: err.into(),
        }
    }

    /// Whether this error is detected before any task runs.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::UnknownTarget { .. }
                | Self::DuplicateTarget(_)
                | Self::NoDefaultTarget
                | Self::CyclicDependency { .. }
                | Self::InvalidSelector { .. }
                | Self::InvalidFilter { .. }
                | Self::UnknownTaskKind(_)
                | Self::InvalidTask { .. }
                | Self::UnknownPredicate(_)
        )
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = BuildError> = std::result::Result<T, E>;
