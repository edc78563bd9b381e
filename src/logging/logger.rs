//! Production sink: forwards events to `tracing` and collects target
//! outcomes for the end-of-build summary.
use std::sync::Mutex;

use super::types::{BuildEvent, EventKind, EventSink, Level};

/// Emit at a runtime [`Level`] with a literal tracing target.
macro_rules! emit_at {
    ($target:literal, $level:expr, $msg:expr) => {
        match $level {
            Level::Debug => tracing::debug!(target: $target, "{}", $msg),
            Level::Info => tracing::info!(target: $target, "{}", $msg),
            Level::Warn => tracing::warn!(target: $target, "{}", $msg),
            Level::Error => tracing::error!(target: $target, "{}", $msg),
        }
    };
}

/// Final state of a target as seen in the event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every task ran.
    Succeeded,
    /// A task failed.
    Failed,
    /// The guard was false or a dependency failed.
    Skipped,
}

/// Summary row for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetEntry {
    /// Target name.
    pub name: String,
    /// How it ended.
    pub outcome: Outcome,
    /// Skip reason or failure message.
    pub message: Option<String>,
}

/// Event sink backed by the global `tracing` subscriber.
#[derive(Debug, Default)]
pub struct Logger {
    targets: Mutex<Vec<TargetEntry>>,
}

impl Logger {
    /// Create a logger with an empty summary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Summary rows recorded so far, in completion order.
    #[must_use]
    pub fn entries(&self) -> Vec<TargetEntry> {
        self.targets.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Number of failed targets.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.targets.lock().map_or(0, |guard| {
            guard
                .iter()
                .filter(|t| t.outcome == Outcome::Failed)
                .count()
        })
    }

    /// Log one line per finished target and a totals line.
    pub fn print_summary(&self) {
        let targets = self.entries();
        if targets.is_empty() {
            return;
        }

        tracing::info!(target: "antler::build", "Summary");
        let (mut ok, mut skipped, mut failed) = (0u32, 0u32, 0u32);
        for entry in &targets {
            let (icon, color) = match entry.outcome {
                Outcome::Succeeded => {
                    ok += 1;
                    ("✓", "\x1b[32m")
                }
                Outcome::Skipped => {
                    skipped += 1;
                    ("○", "\x1b[33m")
                }
                Outcome::Failed => {
                    failed += 1;
                    ("✗", "\x1b[31m")
                }
            };
            let suffix = entry
                .message
                .as_ref()
                .map_or_else(String::new, |msg| format!(" ({msg})"));
            tracing::info!("{color}{icon} {}{suffix}\x1b[0m", entry.name);
        }

        let total = ok + skipped + failed;
        tracing::info!(
            "{total} targets: \x1b[32m{ok} ok\x1b[0m, \x1b[33m{skipped} skipped\x1b[0m, \x1b[31m{failed} failed\x1b[0m"
        );
    }

    fn record(&self, event: &BuildEvent) {
        let outcome = match event.kind {
            EventKind::TargetFinished if event.level == Level::Error => Outcome::Failed,
            EventKind::TargetFinished => Outcome::Succeeded,
            EventKind::TargetSkipped => Outcome::Skipped,
            _ => return,
        };
        let Some(name) = &event.target else {
            return;
        };
        if let Ok(mut guard) = self.targets.lock() {
            guard.push(TargetEntry {
                name: name.clone(),
                outcome,
                message: (outcome != Outcome::Succeeded && !event.message.is_empty())
                    .then(|| event.message.clone()),
            });
        }
    }
}

/// Console form of an event.
fn render(event: &BuildEvent) -> String {
    match (event.kind, &event.target, &event.task) {
        (EventKind::TargetStarted, Some(target), _) => format!("{target}:"),
        (_, _, Some(task)) => format!("[{task}] {}", event.message),
        (_, Some(target), None) => format!("{target}: {}", event.message),
        _ => event.message.clone(),
    }
}

impl EventSink for Logger {
    fn emit(&self, event: BuildEvent) {
        self.record(&event);
        let msg = render(&event);
        match event.kind {
            EventKind::BuildStarted | EventKind::BuildFinished => {
                emit_at!("antler::build", event.level, msg);
            }
            EventKind::TargetStarted | EventKind::TargetFinished | EventKind::TargetSkipped => {
                emit_at!("antler::target", event.level, msg);
            }
            EventKind::TaskStarted | EventKind::TaskFinished | EventKind::Message => {
                emit_at!("antler::task", event.level, msg);
            }
            EventKind::PropertySet => emit_at!("antler::property", event.level, msg),
            EventKind::Selection => emit_at!("antler::selection", event.level, msg),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::capture_tracing;

    #[test]
    fn logger_new_has_empty_summary() {
        let log = Logger::new();
        assert!(log.entries().is_empty());
        assert_eq!(log.failure_count(), 0);
    }

    #[test]
    fn records_target_outcomes() {
        let log = Logger::new();
        let (_, _captured) = capture_tracing(|| {
            log.emit(BuildEvent::target(EventKind::TargetFinished, "a", "done"));
            log.emit(BuildEvent::target(EventKind::TargetSkipped, "b", "if condition false"));
            log.emit(
                BuildEvent::target(EventKind::TargetFinished, "c", "boom").with_level(Level::Error),
            );
            log.emit(BuildEvent::task(EventKind::TaskFinished, "c", "echo", ""));
        });

        let entries = log.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].outcome, Outcome::Succeeded);
        assert_eq!(entries[0].message, None);
        assert_eq!(entries[1].outcome, Outcome::Skipped);
        assert_eq!(entries[1].message.as_deref(), Some("if condition false"));
        assert_eq!(entries[2].outcome, Outcome::Failed);
        assert_eq!(log.failure_count(), 1);
    }

    #[test]
    fn routes_events_to_tracing_targets() {
        let log = Logger::new();
        let ((), captured) = capture_tracing(|| {
            log.emit(BuildEvent::target(EventKind::TargetStarted, "compile", ""));
            log.emit(
                BuildEvent::task(EventKind::PropertySet, "compile", "property", "p = 1")
                    .with_level(Level::Debug),
            );
            log.emit(BuildEvent::task(EventKind::Selection, "compile", "copy", "2 files"));
            log.emit(
                BuildEvent::task(EventKind::Message, "compile", "echo", "careful")
                    .with_level(Level::Warn),
            );
        });

        assert_eq!(
            captured,
            [
                ("antler::target".to_string(), tracing::Level::INFO, "compile:".to_string()),
                (
                    "antler::property".to_string(),
                    tracing::Level::DEBUG,
                    "[property] p = 1".to_string()
                ),
                (
                    "antler::selection".to_string(),
                    tracing::Level::INFO,
                    "[copy] 2 files".to_string()
                ),
                ("antler::task".to_string(), tracing::Level::WARN, "[echo] careful".to_string()),
            ]
        );
    }

    #[test]
    fn summary_lists_every_target() {
        let log = Logger::new();
        let ((), captured) = capture_tracing(|| {
            log.emit(BuildEvent::target(EventKind::TargetFinished, "a", ""));
            log.emit(BuildEvent::target(EventKind::TargetSkipped, "b", "unless condition true"));
            log.print_summary();
        });
        let messages: Vec<&str> = captured.iter().map(|(_, _, m)| m.as_str()).collect();
        assert!(messages.contains(&"Summary"));
        assert!(messages.iter().any(|m| m.contains("✓ a")));
        assert!(messages.iter().any(|m| m.contains("○ b (unless condition true)")));
        assert!(messages.iter().any(|m| m.starts_with("2 targets:")));
    }

    #[test]
    fn empty_summary_logs_nothing() {
        let log = Logger::new();
        let ((), captured) = capture_tracing(|| log.print_summary());
        assert!(captured.is_empty());
    }
}
