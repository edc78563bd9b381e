//! Core event types and the [`EventSink`] trait.
use std::fmt;

/// Severity of a [`BuildEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Diagnostic detail (suppressed on console unless verbose).
    Debug,
    /// Normal progress.
    Info,
    /// Something unexpected that did not fail the build.
    Warn,
    /// A failure.
    Error,
}

/// What a [`BuildEvent`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The requested targets are about to run.
    BuildStarted,
    /// The build is over (successfully or not).
    BuildFinished,
    /// A target's tasks are about to run.
    TargetStarted,
    /// A target completed; `level` is [`Level::Error`] when it failed.
    TargetFinished,
    /// A target's guard was false or a dependency failed.
    TargetSkipped,
    /// A task is about to run.
    TaskStarted,
    /// A task completed; `level` is [`Level::Error`] when it failed.
    TaskFinished,
    /// A task assigned a property.
    PropertySet,
    /// A task enumerated files.
    Selection,
    /// Free-form task output.
    Message,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BuildStarted => "build-started",
            Self::BuildFinished => "build-finished",
            Self::TargetStarted => "target-started",
            Self::TargetFinished => "target-finished",
            Self::TargetSkipped => "target-skipped",
            Self::TaskStarted => "task-started",
            Self::TaskFinished => "task-finished",
            Self::PropertySet => "property-set",
            Self::Selection => "selection",
            Self::Message => "message",
        };
        f.write_str(s)
    }
}

/// One record of the build's log stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildEvent {
    /// Owning target, if any.
    pub target: Option<String>,
    /// Task kind or label, if any.
    pub task: Option<String>,
    /// Severity.
    pub level: Level,
    /// Event type.
    pub kind: EventKind,
    /// Human-readable text.
    pub message: String,
}

impl BuildEvent {
    /// A build-level event.
    pub fn build(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            target: None,
            task: None,
            level: Level::Info,
            kind,
            message: message.into(),
        }
    }

    /// An event owned by `target`.
    pub fn target(kind: EventKind, target: &str, message: impl Into<String>) -> Self {
        Self {
            target: Some(target.to_string()),
            ..Self::build(kind, message)
        }
    }

    /// An event owned by `task` inside `target`.
    pub fn task(kind: EventKind, target: &str, task: &str, message: impl Into<String>) -> Self {
        Self {
            task: Some(task.to_string()),
            ..Self::target(kind, target, message)
        }
    }

    /// Override the level.
    #[must_use]
    pub const fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
}

/// `kind [target/task] message`, the form used in summaries and snapshots.
impl fmt::Display for BuildEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        match (&self.target, &self.task) {
            (Some(target), Some(task)) => write!(f, " [{target}/{task}]")?,
            (Some(target), None) => write!(f, " [{target}]")?,
            _ => {}
        }
        if !self.message.is_empty() {
            write!(f, " {}", self.message)?;
        }
        Ok(())
    }
}

/// Consumer of the build's event stream.
///
/// [`Logger`](super::Logger) forwards to `tracing`,
/// [`BufferedSink`](super::BufferedSink) defers a parallel target's events,
/// and [`RecordingSink`](super::RecordingSink) keeps them for inspection.
pub trait EventSink: Send + Sync {
    /// Accept one event.
    fn emit(&self, event: BuildEvent);
}
