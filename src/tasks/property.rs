use anyhow::{Context as _, Result};

use super::{Task, TaskDescriptor};
use crate::error::BuildError;
use crate::filters::parse_side_file;
use crate::logging::Level;
use crate::project::TaskContext;

/// Assign a property, or every `key=value` line of a property file.
///
/// Existing values are kept (first write wins).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyTask {
    /// `name` / `value`; the value is expanded before it is stored.
    Value {
        /// Property name.
        name: String,
        /// Unexpanded value.
        value: String,
    },
    /// `file`; values are stored unexpanded.
    File {
        /// Path relative to the base directory.
        file: String,
        /// Skip silently when the file is missing.
        optional: bool,
    },
}

impl PropertyTask {
    /// Build from `name` + `value`, or `file` (+ `optional`).
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidTask`] unless exactly one form is given.
    pub fn from_descriptor(d: &TaskDescriptor) -> crate::error::Result<Self> {
        d.allow(&["name", "value", "file", "optional"])?;
        match (d.has("name"), d.has("file")) {
            (true, false) => Ok(Self::Value {
                name: d.required("name")?,
                value: d.required("value")?,
            }),
            (false, true) => Ok(Self::File {
                file: d.required("file")?,
                optional: d.flag("optional")?.unwrap_or(false),
            }),
            _ => Err(BuildError::InvalidTask {
                kind: d.kind.clone(),
                reason: "exactly one of 'name' or 'file' is required".into(),
            }),
        }
    }
}

impl Task for PropertyTask {
    fn kind(&self) -> &'static str {
        "property"
    }

    fn perform(&self, ctx: &TaskContext<'_>) -> Result<()> {
        match self {
            Self::Value { name, value } => {
                let value = ctx.expand(value)?;
                ctx.set_property(name, &value);
            }
            Self::File { file, optional } => {
                let path = ctx.resolve_path(file)?;
                if *optional && !ctx.fs().exists(&path) {
                    ctx.log(
                        Level::Debug,
                        format!("{} not found, skipping", path.display()),
                    );
                    return Ok(());
                }
                let text = ctx
                    .fs()
                    .read_to_string(&path)
                    .with_context(|| format!("loading properties from {}", path.display()))?;
                for (key, value) in parse_side_file(&text) {
                    ctx.set_property(&key, &value);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;
    use crate::tasks::test_helpers::{perform, project_with};

    #[test]
    fn value_is_expanded_and_first_write_wins() {
        let project = project_with(MockFileSystem::new());
        project.properties().set("base", "/opt");
        project.properties().set("taken", "old");

        let task = PropertyTask::from_descriptor(
            &TaskDescriptor::new("property")
                .attr("name", "home")
                .attr("value", "${base}/app"),
        )
        .unwrap();
        perform(&project, &task).0.unwrap();
        assert_eq!(project.properties().get_raw("home").as_deref(), Some("/opt/app"));

        let task = PropertyTask::Value {
            name: "taken".into(),
            value: "new".into(),
        };
        perform(&project, &task).0.unwrap();
        assert_eq!(project.properties().get_raw("taken").as_deref(), Some("old"));
    }

    #[test]
    fn file_loads_every_pair_unexpanded() {
        let fs = MockFileSystem::new().with_file(
            "/work/build.properties",
            "# defaults\nsrc=src\nout=${src}/../out\n",
        );
        let project = project_with(fs);
        let task = PropertyTask::File {
            file: "build.properties".into(),
            optional: false,
        };
        perform(&project, &task).0.unwrap();
        assert_eq!(project.properties().get_raw("out").as_deref(), Some("${src}/../out"));
        assert_eq!(project.properties().get("out").unwrap().as_deref(), Some("src/../out"));
    }

    #[test]
    fn missing_file_fails_unless_optional() {
        let project = project_with(MockFileSystem::new());
        let task = PropertyTask::File {
            file: "absent.properties".into(),
            optional: false,
        };
        let err = perform(&project, &task).0.unwrap_err();
        assert!(format!("{err:#}").contains("loading properties from /work/absent.properties"));

        let task = PropertyTask::File {
            file: "absent.properties".into(),
            optional: true,
        };
        perform(&project, &task).0.unwrap();
    }

    #[test]
    fn descriptor_needs_one_form() {
        assert!(PropertyTask::from_descriptor(&TaskDescriptor::new("property")).is_err());
        let both = TaskDescriptor::new("property")
            .attr("name", "a")
            .attr("value", "b")
            .attr("file", "c");
        assert!(PropertyTask::from_descriptor(&both).is_err());
        let no_value = TaskDescriptor::new("property").attr("name", "a");
        assert!(PropertyTask::from_descriptor(&no_value).is_err());
    }
}
