//! Dependency-driven parallel target execution.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use super::executor::{self, TargetRun};
use super::{BuildReport, Project, Target, TargetStatus};
use crate::error::{BuildError, Result};
use crate::logging::BufferedSink;

/// Completion state shared by the worker threads.
///
/// Each target calls [`wait_for_deps`](TargetGraph::wait_for_deps) before
/// starting and [`mark_complete`](TargetGraph::mark_complete) when done. The
/// value stored per name says whether dependents must be skipped.
#[derive(Debug, Default)]
struct TargetGraph<'a> {
    completed: Mutex<HashMap<&'a str, bool>>,
    condvar: Condvar,
}

impl<'a> TargetGraph<'a> {
    fn new() -> Self {
        Self::default()
    }

    /// Block until every dependency completed. Returns `true` if any of them
    /// blocks its dependents.
    fn wait_for_deps(&self, deps: &[String]) -> bool {
        let mut completed = self.completed.lock().unwrap_or_else(PoisonError::into_inner);
        while !deps.iter().all(|d| completed.contains_key(d.as_str())) {
            completed = self
                .condvar
                .wait(completed)
                .unwrap_or_else(PoisonError::into_inner);
        }
        let blocked = deps
            .iter()
            .any(|d| completed.get(d.as_str()).copied().unwrap_or(false));
        drop(completed);
        blocked
    }

    fn mark_complete(&self, name: &'a str, blocks_dependents: bool) {
        let mut completed = self.completed.lock().unwrap_or_else(PoisonError::into_inner);
        completed.insert(name, blocks_dependents);
        drop(completed);
        self.condvar.notify_all();
    }
}

/// Marks a worker's target complete if the worker unwinds before doing so.
///
/// Dependents waiting in [`TargetGraph::wait_for_deps`] are then released,
/// see the abort flag and return, so the scope can join and re-raise the
/// panic instead of blocking forever.
struct CompletionGuard<'g, 'a> {
    graph: &'g TargetGraph<'a>,
    abort: &'g AtomicBool,
    name: &'a str,
    armed: bool,
}

impl<'g, 'a> CompletionGuard<'g, 'a> {
    const fn new(graph: &'g TargetGraph<'a>, abort: &'g AtomicBool, name: &'a str) -> Self {
        Self {
            graph,
            abort,
            name,
            armed: true,
        }
    }

    fn complete(mut self, blocks_dependents: bool) {
        self.armed = false;
        self.graph.mark_complete(self.name, blocks_dependents);
    }
}

impl Drop for CompletionGuard<'_, '_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::error!(target: "antler::scheduler", "{}: worker panicked", self.name);
            self.abort.store(true, Ordering::SeqCst);
            self.graph.mark_complete(self.name, true);
        }
    }
}

/// What the workers report back.
#[derive(Debug, Default)]
struct Outcomes {
    report: Vec<(String, TargetStatus)>,
    failures: Vec<BuildError>,
    fatal: Option<BuildError>,
}

/// Run `order` with one scoped OS thread per target.
///
/// A target starts once all its dependencies completed. Events are buffered
/// per target and flushed when it finishes, so a target's output is never
/// interleaved with another's. Without keep-going, the first failure stops
/// targets that have not started yet. A panicking task releases the targets
/// waiting on it and the panic resumes once every worker has returned.
pub(super) fn run_parallel(
    project: &Project,
    order: &[&Target],
    roots: &[&str],
) -> Result<BuildReport> {
    let sink = project.sink();
    let keep_going = project.options().keep_going;
    let graph = TargetGraph::new();
    let flush_lock = Arc::new(Mutex::new(()));
    let abort = AtomicBool::new(false);
    let outcomes = Mutex::new(Outcomes::default());

    executor::build_started(sink.as_ref(), roots);

    std::thread::scope(|s| {
        for &target in order {
            let (graph, flush_lock, abort, outcomes) = (&graph, &flush_lock, &abort, &outcomes);
            s.spawn(move || {
                let name = target.name.as_str();
                let blocked = graph.wait_for_deps(&target.depends);
                let guard = CompletionGuard::new(graph, abort, name);
                if abort.load(Ordering::SeqCst) {
                    guard.complete(true);
                    return;
                }
                tracing::trace!(target: "antler::scheduler", "{name}: dependencies satisfied");

                let buf = BufferedSink::new(Arc::clone(sink), Arc::clone(flush_lock));
                let run = if blocked {
                    Ok(executor::skip_blocked(&buf, target))
                } else {
                    executor::run_target(project, target, &buf)
                };
                buf.flush();

                let mut out = outcomes.lock().unwrap_or_else(PoisonError::into_inner);
                let blocks_dependents = match run {
                    Err(fatal) => {
                        abort.store(true, Ordering::SeqCst);
                        project.set_status(name, TargetStatus::Failed);
                        out.fatal.get_or_insert(fatal);
                        true
                    }
                    Ok(TargetRun::Succeeded) => {
                        executor::finish(project, &mut out.report, name, TargetStatus::Succeeded);
                        false
                    }
                    Ok(TargetRun::Skipped(reason)) => {
                        let blocks = reason == executor::DEPENDENCY_FAILED;
                        executor::finish(project, &mut out.report, name, TargetStatus::Skipped { reason });
                        blocks
                    }
                    Ok(TargetRun::Failed(err)) => {
                        if !keep_going {
                            abort.store(true, Ordering::SeqCst);
                        }
                        executor::finish(project, &mut out.report, name, TargetStatus::Failed);
                        out.failures.push(err);
                        true
                    }
                };
                drop(out);
                guard.complete(blocks_dependents);
            });
        }
    });

    let Outcomes {
        report,
        mut failures,
        fatal,
    } = outcomes.into_inner().unwrap_or_else(PoisonError::into_inner);

    if let Some(fatal) = fatal {
        executor::build_finished(sink.as_ref(), false);
        return Err(fatal);
    }
    if failures.is_empty() {
        executor::build_finished(sink.as_ref(), true);
        return Ok(BuildReport { targets: report });
    }
    executor::build_finished(sink.as_ref(), false);
    if keep_going {
        Err(BuildError::BuildFailed { failures })
    } else {
        Err(failures.swap_remove(0))
    }
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;
    use crate::fs::MockFileSystem;
    use crate::logging::{EventKind, RecordingSink};
    use crate::project::{BuildOptions, TaskSpec};
    use crate::tasks::from_fn;

    type Trace = Arc<Mutex<Vec<String>>>;

    fn parallel_project(keep_going: bool) -> (Project, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let project = Project::new("/work", Arc::new(MockFileSystem::new()))
            .with_sink(sink.clone())
            .with_options(BuildOptions {
                keep_going,
                parallel: true,
            });
        (project, sink)
    }

    fn mark(trace: &Trace, label: &'static str) -> TaskSpec {
        let trace = Arc::clone(trace);
        TaskSpec::new(from_fn(label, move |ctx| {
            std::thread::sleep(Duration::from_millis(5));
            trace.lock().unwrap().push(ctx.target_name().to_string());
            Ok(())
        }))
    }

    fn position(trace: &[String], name: &str) -> usize {
        trace.iter().position(|n| n == name).unwrap()
    }

    // -----------------------------------------------------------------------
    // TargetGraph
    // -----------------------------------------------------------------------

    #[test]
    fn graph_no_deps_does_not_block() {
        let graph = TargetGraph::new();
        assert!(!graph.wait_for_deps(&[]));
    }

    #[test]
    fn graph_reports_blocking_dependency() {
        let graph = TargetGraph::new();
        graph.mark_complete("a", false);
        graph.mark_complete("b", true);
        assert!(!graph.wait_for_deps(&["a".to_string()]));
        assert!(graph.wait_for_deps(&["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn graph_notifies_waiters() {
        let graph = Arc::new(TargetGraph::<'static>::new());
        let g = Arc::clone(&graph);
        let handle = std::thread::spawn(move || g.wait_for_deps(&["a".to_string()]));
        std::thread::sleep(Duration::from_millis(50));
        graph.mark_complete("a", false);
        assert!(!handle.join().expect("waiter thread should complete"));
    }

    // -----------------------------------------------------------------------
    // run_parallel
    // -----------------------------------------------------------------------

    #[test]
    fn shared_dependency_runs_once_before_dependents() {
        let (mut p, _) = parallel_project(false);
        let t: Trace = Arc::default();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        p.add_target(Target::new("init").task(TaskSpec::new(from_fn("count", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))))
        .unwrap();
        p.add_target(Target::new("left").depends_on("init").task(mark(&t, "l")))
            .unwrap();
        p.add_target(Target::new("right").depends_on("init").task(mark(&t, "r")))
            .unwrap();
        p.add_target(
            Target::new("all")
                .depends_on("left")
                .depends_on("right")
                .task(mark(&t, "a")),
        )
        .unwrap();

        let report = p.execute_target("all").unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(report.succeeded().len(), 4);
        let trace = t.lock().unwrap();
        assert!(position(&trace, "left") < position(&trace, "all"));
        assert!(position(&trace, "right") < position(&trace, "all"));
        let order = report.order();
        assert_eq!(order[0], "init");
        assert_eq!(order[3], "all");
    }

    #[test]
    fn target_events_are_not_interleaved() {
        let (mut p, sink) = parallel_project(false);
        let t: Trace = Arc::default();
        for name in ["a", "b", "c"] {
            p.add_target(
                Target::new(name)
                    .task(mark(&t, "1"))
                    .task(mark(&t, "2"))
                    .task(mark(&t, "3")),
            )
            .unwrap();
        }
        p.execute_targets(&["a", "b", "c"]).unwrap();

        let events = sink.events();
        let mut current: Option<String> = None;
        for event in &events[1..events.len() - 1] {
            match event.kind {
                EventKind::TargetStarted => {
                    assert!(current.is_none());
                    current.clone_from(&event.target);
                }
                EventKind::TargetFinished => {
                    assert_eq!(current, event.target);
                    current = None;
                }
                _ => assert_eq!(current, event.target),
            }
        }
        assert!(current.is_none());
    }

    #[test]
    fn keep_going_skips_dependents_of_failure() {
        let (mut p, sink) = parallel_project(true);
        let t: Trace = Arc::default();
        p.add_target(
            Target::new("bad").task(TaskSpec::new(from_fn("fail", |_| Err(anyhow::anyhow!("boom"))))),
        )
        .unwrap();
        p.add_target(Target::new("child").depends_on("bad").task(mark(&t, "c")))
            .unwrap();
        p.add_target(Target::new("sibling").task(mark(&t, "s"))).unwrap();

        let err = p.execute_targets(&["child", "sibling"]).unwrap_err();
        assert!(matches!(&err, BuildError::BuildFailed { failures } if failures.len() == 1));
        assert_eq!(*t.lock().unwrap(), ["sibling"]);
        let skipped = sink.of_kind(EventKind::TargetSkipped);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].target.as_deref(), Some("child"));
        assert_eq!(skipped[0].message, "dependency failed");
    }

    #[test]
    fn panicking_task_releases_dependents_and_resumes_panic() {
        let (mut p, _) = parallel_project(false);
        let t: Trace = Arc::default();
        p.add_target(Target::new("a").task(TaskSpec::new(from_fn("explode", |_| {
            panic!("task handler bug")
        }))))
        .unwrap();
        p.add_target(Target::new("b").depends_on("a").task(mark(&t, "b")))
            .unwrap();

        let p = Arc::new(p);
        let worker = Arc::clone(&p);
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                worker.execute_target("b").map(|_| ())
            }));
            done_tx.send(result.is_err()).unwrap();
        });
        let panicked = done_rx
            .recv_timeout(Duration::from_secs(10))
            .expect("parallel build should return after a panic");
        assert!(panicked);
        assert!(t.lock().unwrap().is_empty());
        assert_eq!(p.status("b"), Some(TargetStatus::Pending));
    }

    #[test]
    fn statuses_end_terminal() {
        let (mut p, _) = parallel_project(false);
        let t: Trace = Arc::default();
        p.add_target(Target::new("a").task(mark(&t, "a"))).unwrap();
        p.add_target(Target::new("b").depends_on("a").task(mark(&t, "b")))
            .unwrap();
        p.execute_target("b").unwrap();
        assert_eq!(p.status("a"), Some(TargetStatus::Succeeded));
        assert_eq!(p.status("b"), Some(TargetStatus::Succeeded));
    }

    #[test]
    fn failure_without_keep_going_returns_task_failure() {
        let (mut p, _) = parallel_project(false);
        let t: Trace = Arc::default();
        p.add_target(
            Target::new("bad").task(TaskSpec::new(from_fn("fail", |_| Err(anyhow::anyhow!("boom"))))),
        )
        .unwrap();
        p.add_target(Target::new("after").depends_on("bad").task(mark(&t, "x")))
            .unwrap();

        let err = p.execute_target("after").unwrap_err();
        assert!(matches!(err, BuildError::TaskFailure { ref target, .. } if target == "bad"));
        assert!(t.lock().unwrap().is_empty());
    }
}
