//! Serial execution of a planned target list.

use std::collections::HashSet;

use super::{BuildReport, Project, Target, TargetStatus, TaskContext};
use crate::conditions::{Condition, ConditionContext};
use crate::error::{BuildError, Result};
use crate::logging::{BuildEvent, EventKind, EventSink, Level};

/// Skip reason for targets downstream of a failure.
pub(super) const DEPENDENCY_FAILED: &str = "dependency failed";

/// How one target ended.
#[derive(Debug)]
pub(super) enum TargetRun {
    Succeeded,
    Skipped(String),
    Failed(BuildError),
}

pub(super) fn build_started(sink: &dyn EventSink, roots: &[&str]) {
    sink.emit(BuildEvent::build(EventKind::BuildStarted, roots.join(", ")));
}

pub(super) fn build_finished(sink: &dyn EventSink, success: bool) {
    let event = if success {
        BuildEvent::build(EventKind::BuildFinished, "BUILD SUCCESSFUL")
    } else {
        BuildEvent::build(EventKind::BuildFinished, "BUILD FAILED").with_level(Level::Error)
    };
    sink.emit(event);
}

/// Skip the target because a dependency failed.
pub(super) fn skip_blocked(sink: &dyn EventSink, target: &Target) -> TargetRun {
    sink.emit(BuildEvent::target(
        EventKind::TargetSkipped,
        &target.name,
        DEPENDENCY_FAILED,
    ));
    TargetRun::Skipped(DEPENDENCY_FAILED.to_string())
}

/// Why a guard pair blocks execution, if it does. Both guards must pass.
fn guard_blocks(
    if_condition: Option<&Condition>,
    unless_condition: Option<&Condition>,
    ctx: &ConditionContext<'_>,
) -> Result<Option<String>> {
    if let Some(c) = if_condition
        && !c.evaluate(ctx)?
    {
        return Ok(Some("if condition is false".to_string()));
    }
    if let Some(c) = unless_condition
        && c.evaluate(ctx)?
    {
        return Ok(Some("unless condition is true".to_string()));
    }
    Ok(None)
}

/// Evaluate the target's guards and run its tasks in order.
///
/// `Err` is reserved for errors that abort the whole build regardless of
/// keep-going (a property cycle); task failures come back as
/// [`TargetRun::Failed`].
pub(super) fn run_target(
    project: &Project,
    target: &Target,
    sink: &dyn EventSink,
) -> Result<TargetRun> {
    let conditions = project.condition_context();
    let name = target.name.as_str();

    if let Some(reason) = guard_blocks(
        target.if_condition.as_ref(),
        target.unless_condition.as_ref(),
        &conditions,
    )? {
        sink.emit(BuildEvent::target(EventKind::TargetSkipped, name, reason.clone()));
        return Ok(TargetRun::Skipped(reason));
    }

    project.set_status(name, TargetStatus::Running);
    sink.emit(BuildEvent::target(EventKind::TargetStarted, name, ""));

    for spec in &target.tasks {
        let label = spec.label.as_str();
        if let Some(reason) = guard_blocks(
            spec.if_condition.as_ref(),
            spec.unless_condition.as_ref(),
            &conditions,
        )? {
            sink.emit(
                BuildEvent::task(EventKind::Message, name, label, format!("skipped: {reason}"))
                    .with_level(Level::Debug),
            );
            continue;
        }

        sink.emit(BuildEvent::task(EventKind::TaskStarted, name, label, "").with_level(Level::Debug));
        let ctx = TaskContext::new(project, name, label, sink);
        if let Err(err) = spec.task.perform(&ctx) {
            if let Some(BuildError::CircularPropertyReference { chain }) = err.downcast_ref::<BuildError>() {
                let fatal = BuildError::CircularPropertyReference {
                    chain: chain.clone(),
                };
                report_failure(sink, name, label, &fatal.to_string());
                return Err(fatal);
            }
            let failure = BuildError::task_failure(name, label, err);
            if let BuildError::TaskFailure { reason, .. } = &failure {
                report_failure(sink, name, label, reason);
            }
            return Ok(TargetRun::Failed(failure));
        }
        sink.emit(BuildEvent::task(EventKind::TaskFinished, name, label, "").with_level(Level::Debug));
    }

    sink.emit(BuildEvent::target(EventKind::TargetFinished, name, ""));
    Ok(TargetRun::Succeeded)
}

/// Record a terminal status in the project's table and in `report`.
pub(super) fn finish(
    project: &Project,
    report: &mut Vec<(String, TargetStatus)>,
    name: &str,
    status: TargetStatus,
) {
    debug_assert!(status.is_terminal(), "{name} finished as {status}");
    project.set_status(name, status.clone());
    report.push((name.to_string(), status));
}

fn report_failure(sink: &dyn EventSink, target: &str, task: &str, reason: &str) {
    sink.emit(BuildEvent::task(EventKind::TaskFinished, target, task, reason).with_level(Level::Error));
    sink.emit(BuildEvent::target(EventKind::TargetFinished, target, reason).with_level(Level::Error));
}

/// Run `order` one target at a time.
pub(super) fn run_serial(
    project: &Project,
    order: &[&Target],
    roots: &[&str],
) -> Result<BuildReport> {
    let sink = project.sink().as_ref();
    let keep_going = project.options().keep_going;
    let mut report = BuildReport::default();
    let mut blocked: HashSet<&str> = HashSet::new();
    let mut failures = Vec::new();

    build_started(sink, roots);

    for target in order {
        let name = target.name.as_str();
        let run = if target.depends.iter().any(|d| blocked.contains(d.as_str())) {
            skip_blocked(sink, target)
        } else {
            match run_target(project, target, sink) {
                Ok(run) => run,
                Err(fatal) => {
                    project.set_status(name, TargetStatus::Failed);
                    build_finished(sink, false);
                    return Err(fatal);
                }
            }
        };

        let status = match run {
            TargetRun::Succeeded => TargetStatus::Succeeded,
            TargetRun::Skipped(reason) => {
                if reason == DEPENDENCY_FAILED {
                    blocked.insert(name);
                }
                TargetStatus::Skipped { reason }
            }
            TargetRun::Failed(err) => {
                if !keep_going {
                    project.set_status(name, TargetStatus::Failed);
                    build_finished(sink, false);
                    return Err(err);
                }
                blocked.insert(name);
                failures.push(err);
                TargetStatus::Failed
            }
        };
        finish(project, &mut report.targets, name, status);
    }

    if failures.is_empty() {
        build_finished(sink, true);
        Ok(report)
    } else {
        build_finished(sink, false);
        Err(BuildError::BuildFailed { failures })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::fs::MockFileSystem;
    use crate::logging::RecordingSink;
    use crate::project::{BuildOptions, TaskSpec};
    use crate::tasks::from_fn;

    type Trace = Arc<Mutex<Vec<String>>>;

    fn project() -> (Project, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let project = Project::new("/work", Arc::new(MockFileSystem::new()))
            .with_sink(sink.clone());
        (project, sink)
    }

    /// A task that appends `target/label` to `trace`.
    fn mark(trace: &Trace, label: &'static str) -> TaskSpec {
        let trace = Arc::clone(trace);
        TaskSpec::new(from_fn(label, move |ctx| {
            trace
                .lock()
                .unwrap()
                .push(format!("{}/{}", ctx.target_name(), ctx.task_name()));
            Ok(())
        }))
    }

    fn failing(message: &'static str) -> TaskSpec {
        TaskSpec::new(from_fn("fail", move |_| Err(anyhow::anyhow!(message))))
    }

    fn trace() -> Trace {
        Arc::new(Mutex::new(Vec::new()))
    }

    // -----------------------------------------------------------------------
    // ordering
    // -----------------------------------------------------------------------

    #[test]
    fn shared_dependency_runs_once_in_order() {
        let (mut p, _) = project();
        let t = trace();
        p.add_target(Target::new("init").task(mark(&t, "i"))).unwrap();
        p.add_target(Target::new("compile").depends_on("init").task(mark(&t, "c")))
            .unwrap();
        p.add_target(Target::new("docs").depends_on("init").task(mark(&t, "d")))
            .unwrap();
        p.add_target(
            Target::new("dist")
                .depends_on("compile")
                .depends_on("docs")
                .task(mark(&t, "x")),
        )
        .unwrap();

        let report = p.execute_target("dist").unwrap();
        assert_eq!(
            *t.lock().unwrap(),
            ["init/i", "compile/c", "docs/d", "dist/x"]
        );
        assert_eq!(report.order(), ["init", "compile", "docs", "dist"]);
        assert_eq!(report.succeeded().len(), 4);
    }

    #[test]
    fn tasks_run_in_declaration_order() {
        let (mut p, _) = project();
        let t = trace();
        p.add_target(
            Target::new("a")
                .task(mark(&t, "1"))
                .task(mark(&t, "2"))
                .task(mark(&t, "3")),
        )
        .unwrap();
        p.execute_target("a").unwrap();
        assert_eq!(*t.lock().unwrap(), ["a/1", "a/2", "a/3"]);
    }

    #[test]
    fn dependency_sets_property_read_by_dependent() {
        let (mut p, sink) = project();
        p.add_target(Target::new("B").task(TaskSpec::new(from_fn("set", |ctx| {
            ctx.set_property("p", "1");
            Ok(())
        }))))
        .unwrap();
        p.add_target(
            Target::new("A")
                .depends_on("B")
                .task(TaskSpec::new(from_fn("write", |ctx| {
                    let value = ctx.expand("${p}")?;
                    ctx.fs().write(&ctx.resolve_path("out.txt")?, &value, false)?;
                    Ok(())
                }))),
        )
        .unwrap();

        p.execute_target("A").unwrap();
        assert_eq!(p.fs().read_to_string(Path::new("/work/out.txt")).unwrap(), "1");
        insta::assert_snapshot!(sink.transcript(), @r"
        build-started A
        target-started [B]
        task-started [B/set]
        property-set [B/set] p = 1
        task-finished [B/set]
        target-finished [B]
        target-started [A]
        task-started [A/write]
        task-finished [A/write]
        target-finished [A]
        build-finished BUILD SUCCESSFUL
        ");
    }

    // -----------------------------------------------------------------------
    // guards
    // -----------------------------------------------------------------------

    #[test]
    fn unless_skips_when_property_set() {
        let (mut p, sink) = project();
        let t = trace();
        p.add_target(
            Target::new("a")
                .unless(Condition::IsSet("skip.me".into()))
                .task(mark(&t, "run")),
        )
        .unwrap();

        p.execute_target("a").unwrap();
        assert_eq!(t.lock().unwrap().len(), 1);

        p.properties().set("skip.me", "");
        let report = p.execute_target("a").unwrap();
        assert_eq!(t.lock().unwrap().len(), 1);
        assert_eq!(
            report.status("a"),
            Some(&TargetStatus::Skipped {
                reason: "unless condition is true".into()
            })
        );
        assert_eq!(sink.of_kind(EventKind::TargetSkipped).len(), 1);
    }

    #[test]
    fn if_and_unless_are_anded() {
        let (mut p, _) = project();
        let t = trace();
        p.add_target(
            Target::new("a")
                .when(Condition::IsSet("on".into()))
                .unless(Condition::IsSet("off".into()))
                .task(mark(&t, "run")),
        )
        .unwrap();

        p.execute_target("a").unwrap();
        assert!(t.lock().unwrap().is_empty());
        p.properties().set("on", "1");
        p.execute_target("a").unwrap();
        assert_eq!(t.lock().unwrap().len(), 1);
        p.properties().set("off", "1");
        p.execute_target("a").unwrap();
        assert_eq!(t.lock().unwrap().len(), 1);
    }

    #[test]
    fn guard_sees_properties_set_by_dependencies() {
        let (mut p, _) = project();
        let t = trace();
        p.add_target(Target::new("probe").task(TaskSpec::new(from_fn("detect", |ctx| {
            ctx.set_property("feature", "yes");
            Ok(())
        }))))
        .unwrap();
        p.add_target(
            Target::new("use")
                .depends_on("probe")
                .when(Condition::IsTrue("${feature}".into()))
                .task(mark(&t, "run")),
        )
        .unwrap();

        p.execute_target("use").unwrap();
        assert_eq!(*t.lock().unwrap(), ["use/run"]);
    }

    #[test]
    fn skipped_target_still_satisfies_dependents() {
        let (mut p, _) = project();
        let t = trace();
        p.add_target(Target::new("opt").when(Condition::IsSet("never".into())))
            .unwrap();
        p.add_target(Target::new("main").depends_on("opt").task(mark(&t, "run")))
            .unwrap();
        p.execute_target("main").unwrap();
        assert_eq!(*t.lock().unwrap(), ["main/run"]);
    }

    #[test]
    fn task_guards_skip_single_tasks() {
        let (mut p, _) = project();
        let t = trace();
        p.add_target(
            Target::new("a")
                .task(mark(&t, "always"))
                .task(mark(&t, "gated").when(Condition::IsSet("gate".into())))
                .task(mark(&t, "last")),
        )
        .unwrap();
        p.execute_target("a").unwrap();
        assert_eq!(*t.lock().unwrap(), ["a/always", "a/last"]);
    }

    // -----------------------------------------------------------------------
    // statuses
    // -----------------------------------------------------------------------

    #[test]
    fn status_moves_from_pending_through_running() {
        let (mut p, _) = project();
        let seen: Arc<Mutex<Vec<(String, Option<TargetStatus>)>>> = Arc::default();
        let record = Arc::clone(&seen);
        p.add_target(Target::new("first").task(TaskSpec::new(from_fn("look", move |ctx| {
            let project = ctx.project();
            let now = [
                ("first".to_string(), project.status("first")),
                ("second".to_string(), project.status("second")),
            ];
            record.lock().unwrap().extend(now);
            Ok(())
        }))))
        .unwrap();
        p.add_target(Target::new("second").depends_on("first")).unwrap();
        p.add_target(Target::new("unplanned")).unwrap();

        assert_eq!(p.status("first"), None);
        p.execute_target("second").unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            [
                ("first".to_string(), Some(TargetStatus::Running)),
                ("second".to_string(), Some(TargetStatus::Pending)),
            ]
        );
        assert_eq!(p.status("first"), Some(TargetStatus::Succeeded));
        assert_eq!(p.status("second"), Some(TargetStatus::Succeeded));
        assert_eq!(p.status("unplanned"), None);
        assert!(p.status("second").unwrap().is_terminal());
    }

    #[test]
    fn guard_skip_never_reports_running() {
        let (mut p, _) = project();
        p.add_target(Target::new("gated").when(Condition::IsSet("nope".into())))
            .unwrap();
        p.execute_target("gated").unwrap();
        assert_eq!(
            p.status("gated"),
            Some(TargetStatus::Skipped {
                reason: "if condition is false".into()
            })
        );
    }

    // -----------------------------------------------------------------------
    // failures
    // -----------------------------------------------------------------------

    #[test]
    fn failure_aborts_target_and_build() {
        let (mut p, sink) = project();
        let t = trace();
        p.add_target(
            Target::new("bad")
                .task(mark(&t, "before"))
                .task(failing("boom"))
                .task(mark(&t, "after")),
        )
        .unwrap();
        p.add_target(Target::new("other").task(mark(&t, "x"))).unwrap();

        let err = p.execute_targets(&["bad", "other"]).unwrap_err();
        assert_eq!(err.to_string(), "Task 'fail' in target 'bad' failed: boom");
        assert_eq!(*t.lock().unwrap(), ["bad/before"]);
        assert_eq!(p.status("bad"), Some(TargetStatus::Failed));
        assert_eq!(p.status("other"), Some(TargetStatus::Pending));
        let last = sink.events().pop().unwrap();
        assert_eq!(last.kind, EventKind::BuildFinished);
        assert_eq!(last.level, Level::Error);
    }

    #[test]
    fn keep_going_runs_unaffected_targets() {
        let (p, _) = project();
        let mut p = p.with_options(BuildOptions {
            keep_going: true,
            parallel: false,
        });
        let t = trace();
        p.add_target(Target::new("bad").task(failing("boom"))).unwrap();
        p.add_target(Target::new("child").depends_on("bad").task(mark(&t, "c")))
            .unwrap();
        p.add_target(Target::new("grandchild").depends_on("child").task(mark(&t, "g")))
            .unwrap();
        p.add_target(Target::new("sibling").task(mark(&t, "s"))).unwrap();

        let err = p
            .execute_targets(&["grandchild", "sibling"])
            .unwrap_err();
        assert!(matches!(&err, BuildError::BuildFailed { failures } if failures.len() == 1));
        assert_eq!(*t.lock().unwrap(), ["sibling/s"]);
        assert_eq!(p.status("bad"), Some(TargetStatus::Failed));
        assert_eq!(
            p.status("grandchild"),
            Some(TargetStatus::Skipped {
                reason: DEPENDENCY_FAILED.into()
            })
        );
        assert_eq!(p.status("sibling"), Some(TargetStatus::Succeeded));
    }

    #[test]
    fn property_cycle_aborts_even_when_keeping_going() {
        let (p, _) = project();
        let mut p = p.with_options(BuildOptions {
            keep_going: true,
            parallel: false,
        });
        let t = trace();
        p.properties().set("a", "${b}");
        p.properties().set("b", "${a}");
        p.add_target(Target::new("loop").task(TaskSpec::new(from_fn("echo", |ctx| {
            ctx.expand("${a}")?;
            Ok(())
        }))))
        .unwrap();
        p.add_target(Target::new("later").task(mark(&t, "x"))).unwrap();

        let err = p.execute_targets(&["loop", "later"]).unwrap_err();
        assert!(matches!(
            err,
            BuildError::CircularPropertyReference { chain } if chain == ["a", "b", "a"]
        ));
        assert!(t.lock().unwrap().is_empty());
    }

    #[test]
    fn structural_errors_precede_any_task() {
        let (mut p, sink) = project();
        let t = trace();
        p.add_target(Target::new("a").depends_on("b").task(mark(&t, "x"))).unwrap();
        p.add_target(Target::new("b").depends_on("a")).unwrap();

        let err = p.execute_target("a").unwrap_err();
        assert!(matches!(err, BuildError::CyclicDependency { .. }));
        assert!(t.lock().unwrap().is_empty());
        assert!(sink.events().is_empty());

        let err = p.execute_target("missing").unwrap_err();
        assert!(matches!(err, BuildError::UnknownTarget { .. }));
    }
}
