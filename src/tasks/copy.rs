use std::path::Path;

use anyhow::{Context as _, Result};

use super::{Task, TaskDescriptor};
use crate::error::BuildError;
use crate::filters::FilterChain;
use crate::logging::Level;
use crate::project::TaskContext;
use crate::selector::Selector;

/// What a [`CopyTask`] reads.
#[derive(Debug, Clone)]
enum Source {
    File { file: String },
    Dir { dir: String, selector: Selector },
}

/// Where a [`CopyTask`] writes.
#[derive(Debug, Clone)]
enum Destination {
    File(String),
    Dir(String),
}

/// Copy one file or a selected tree, optionally through a filter chain.
///
/// The selector and the chain are built when the descriptor is loaded, so
/// malformed patterns and unknown filter types fail before the build starts.
#[derive(Debug, Clone)]
pub struct CopyTask {
    source: Source,
    destination: Destination,
    filters: FilterChain,
}

impl CopyTask {
    /// Build from `file` → `tofile`/`todir`, or `dir` (+ `includes`,
    /// `excludes`, `default-excludes`) → `todir`, with an optional `filter`
    /// array.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidTask`] for a bad attribute combination,
    /// [`BuildError::InvalidSelector`] for a malformed pattern and
    /// [`BuildError::InvalidFilter`] for a bad filter stage.
    pub fn from_descriptor(d: &TaskDescriptor) -> crate::error::Result<Self> {
        d.allow(&[
            "file",
            "dir",
            "tofile",
            "todir",
            "includes",
            "excludes",
            "default-excludes",
            "filter",
        ])?;
        let invalid = |reason: &str| BuildError::InvalidTask {
            kind: d.kind.clone(),
            reason: reason.to_string(),
        };

        let source = match (d.string("file")?, d.string("dir")?) {
            (Some(file), None) => Source::File { file },
            (None, Some(dir)) => {
                let selector = Selector::from_patterns(&d.list("includes")?, &d.list("excludes")?)?
                    .default_excludes(d.flag("default-excludes")?.unwrap_or(true));
                Source::Dir { dir, selector }
            }
            _ => return Err(invalid("exactly one of 'file' or 'dir' is required")),
        };
        let destination = match (d.string("tofile")?, d.string("todir")?, &source) {
            (Some(_), _, Source::Dir { .. }) => {
                return Err(invalid("'tofile' cannot be used with 'dir'"));
            }
            (Some(to), None, Source::File { .. }) => Destination::File(to),
            (None, Some(to), _) => Destination::Dir(to),
            _ => return Err(invalid("exactly one of 'tofile' or 'todir' is required")),
        };
        Ok(Self {
            source,
            destination,
            filters: FilterChain::from_specs(&d.filters("filter")?)?,
        })
    }

    fn copy_one(&self, ctx: &TaskContext<'_>, from: &Path, to: &Path) -> Result<()> {
        if self.filters.is_empty() {
            ctx.fs().copy_file(from, to)?;
        } else {
            let text = self.filters.read_file(from, &ctx.filter_env())?;
            ctx.fs().write(to, &text, false)?;
        }
        Ok(())
    }
}

impl Task for CopyTask {
    fn kind(&self) -> &'static str {
        "copy"
    }

    fn perform(&self, ctx: &TaskContext<'_>) -> Result<()> {
        match (&self.source, &self.destination) {
            (Source::File { file }, destination) => {
                let from = ctx.resolve_path(file)?;
                let to = match destination {
                    Destination::File(to) => ctx.resolve_path(to)?,
                    Destination::Dir(dir) => {
                        let name = from
                            .file_name()
                            .with_context(|| format!("{} has no file name", from.display()))?;
                        ctx.resolve_path(dir)?.join(name)
                    }
                };
                self.copy_one(ctx, &from, &to)
                    .with_context(|| format!("copying {} to {}", from.display(), to.display()))?;
                ctx.log(Level::Info, format!("Copying 1 file to {}", to.display()));
            }
            (Source::Dir { dir, selector }, Destination::Dir(todir)) => {
                let base = ctx.resolve_path(dir)?;
                let target = ctx.resolve_path(todir)?;
                let selected = ctx.select(selector, &base)?;
                for relative in &selected {
                    let (from, to) = (base.join(relative), target.join(relative));
                    self.copy_one(ctx, &from, &to)
                        .with_context(|| format!("copying {}", relative.display()))?;
                }
                ctx.log(
                    Level::Info,
                    format!("Copying {} files to {}", selected.len(), target.display()),
                );
            }
            (Source::Dir { .. }, Destination::File(_)) => {
                anyhow::bail!("cannot copy a directory to a single file");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::*;
    use crate::fs::MockFileSystem;
    use crate::project::Project;
    use crate::tasks::test_helpers::{perform, project_with};

    fn copy(src: &str) -> CopyTask {
        let d = TaskDescriptor {
            kind: "copy".into(),
            attributes: src.parse().unwrap(),
        };
        CopyTask::from_descriptor(&d).unwrap()
    }

    fn write(root: &Path, rel: &str, text: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    #[test]
    fn single_file_through_filters() {
        let project = project_with(
            MockFileSystem::new()
                .with_file("/work/VERSION.in", "version=@v@\nextra\n")
                .with_file("/work/tokens.ini", "v=1.2\n"),
        );
        let task = copy(
            "file = 'VERSION.in'\ntofile = 'out/VERSION'\n\
             filter = [{ type = 'replace-tokens', file = 'tokens.ini' }, { type = 'head', lines = 1 }]",
        );
        perform(&project, &task).0.unwrap();
        let out = project
            .fs()
            .read_to_string(Path::new("/work/out/VERSION"))
            .unwrap();
        assert_eq!(out, "version=1.2\n");
    }

    #[test]
    fn file_to_dir_keeps_name() {
        let project = project_with(MockFileSystem::new().with_file("/work/a.txt", "x"));
        perform(&project, &copy("file = 'a.txt'\ntodir = 'dist'")).0.unwrap();
        assert_eq!(
            project.fs().read_to_string(Path::new("/work/dist/a.txt")).unwrap(),
            "x"
        );
    }

    #[test]
    fn tree_copy_honours_selector() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "src/Main.java", "class Main {}");
        write(tmp.path(), "src/util/Util.java", "class Util {}");
        write(tmp.path(), "src/util/notes.txt", "skip me");
        write(tmp.path(), "src/.git/HEAD", "ref");

        let project = Project::new(tmp.path(), crate::fs::detect().unwrap());
        let task = copy("dir = 'src'\ntodir = 'build'\nincludes = ['**/*.java']");
        let (result, events) = perform(&project, &task);
        result.unwrap();

        assert!(tmp.path().join("build/Main.java").is_file());
        assert!(tmp.path().join("build/util/Util.java").is_file());
        assert!(!tmp.path().join("build/util/notes.txt").exists());
        assert!(!tmp.path().join("build/.git").exists());
        assert!(events.iter().any(|e| e.message.starts_with("Copying 2 files to")));
    }

    #[test]
    fn tree_copy_selects_through_the_driver() {
        let project = project_with(
            MockFileSystem::new()
                .with_file("/work/src/a.txt", "a")
                .with_file("/work/src/nested/b.txt", "b")
                .with_file("/work/src/nested/b.txt~", "backup"),
        );
        perform(&project, &copy("dir = 'src'\ntodir = 'out'")).0.unwrap();
        let fs = project.fs();
        assert_eq!(fs.read_to_string(Path::new("/work/out/a.txt")).unwrap(), "a");
        assert_eq!(fs.read_to_string(Path::new("/work/out/nested/b.txt")).unwrap(), "b");
        assert!(!fs.exists(Path::new("/work/out/nested/b.txt~")));
    }

    #[test]
    fn bad_combinations_fail_at_load() {
        let bad = [
            "tofile = 'x'",
            "file = 'a'",
            "dir = 'a'\ntofile = 'x'",
            "file = 'a'\ntofile = 'x'\ntodir = 'y'",
        ];
        for src in bad {
            let d = TaskDescriptor {
                kind: "copy".into(),
                attributes: src.parse().unwrap(),
            };
            let err = CopyTask::from_descriptor(&d).unwrap_err();
            assert!(matches!(err, BuildError::InvalidTask { .. }), "{src}");
        }
    }

    #[test]
    fn bad_filter_fails_at_load() {
        let d = TaskDescriptor {
            kind: "copy".into(),
            attributes: "file = 'a'\ntofile = 'b'\nfilter = [{ type = 'rot13' }]"
                .parse()
                .unwrap(),
        };
        let err = CopyTask::from_descriptor(&d).unwrap_err();
        assert!(matches!(err, BuildError::InvalidFilter { .. }));
    }
}
