//! TOML project descriptor loading.
//!
//! ```toml
//! name = "demo"
//! default = "dist"
//! basedir = "."
//!
//! [properties]
//! src = "src"
//! out = "${basedir}/build"
//!
//! [[target]]
//! name = "dist"
//! depends = ["compile"]
//! unless = "skip.dist"
//!
//! [[target.task]]
//! kind = "copy"
//! dir = "${src}"
//! todir = "${out}"
//! ```
//!
//! Command-line properties are stored first, then `basedir`, then the
//! `[properties]` table, so first-write-wins lets the command line override
//! the descriptor. A `-D basedir=...` override replaces the descriptor's
//! `basedir` and is resolved against the descriptor's directory the same way.
mod guard;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use serde::Deserialize;

use crate::conditions::{Condition, PredicateRegistry};
use crate::fs::{self, FileSystem};
use crate::project::{BuildOptions, Project, Target, TaskSpec};
use crate::tasks::{TaskDescriptor, TaskRegistry};

use guard::RawGuard;

/// Name of the property holding the resolved base directory.
pub const BASEDIR_PROPERTY: &str = "basedir";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProject {
    name: Option<String>,
    default: Option<String>,
    basedir: Option<String>,
    #[serde(default)]
    properties: toml::Table,
    #[serde(default, rename = "target")]
    targets: Vec<RawTarget>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTarget {
    name: String,
    #[serde(default)]
    depends: Vec<String>,
    description: Option<String>,
    #[serde(rename = "if")]
    if_condition: Option<RawGuard>,
    unless: Option<RawGuard>,
    #[serde(default, rename = "task")]
    tasks: Vec<toml::Table>,
}

/// Everything besides the descriptor that shapes the loaded project.
#[derive(Debug, Default)]
pub struct LoadOptions {
    /// `-D name=value` properties, set before the descriptor's.
    pub properties: Vec<(String, String)>,
    /// Custom predicates guards may name.
    pub predicates: PredicateRegistry,
    /// Execution switches.
    pub build: BuildOptions,
}

/// Read and build the project described by `path`.
///
/// The base directory defaults to the descriptor's directory.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if the project
/// is structurally invalid (see [`parse`]).
pub fn load(
    path: &Path,
    fs: Arc<dyn FileSystem>,
    registry: &TaskRegistry,
    options: LoadOptions,
) -> Result<Project> {
    let text = fs
        .read_to_string(path)
        .with_context(|| format!("Failed to read project file: {}", path.display()))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let dir = fs::canonical_or_lexical(dir);
    parse(&text, &dir, fs, registry, options)
        .with_context(|| format!("Failed to load project file: {}", path.display()))
}

/// Build a project from descriptor text located in `dir`.
///
/// # Errors
///
/// Returns an error for malformed TOML, non-scalar property values, task
/// tables without a `kind`, unknown task kinds, bad task attributes,
/// duplicate targets, and whatever [`Project::validate`] reports (dangling
/// dependencies, cycles, unregistered custom predicates).
pub fn parse(
    text: &str,
    dir: &Path,
    fs: Arc<dyn FileSystem>,
    registry: &TaskRegistry,
    options: LoadOptions,
) -> Result<Project> {
    let raw: RawProject = toml::from_str(text).context("Failed to parse TOML project")?;

    let cli_basedir = options
        .properties
        .iter()
        .find(|(name, _)| name == BASEDIR_PROPERTY)
        .map(|(_, value)| value.as_str());
    let base_dir = match cli_basedir.or(raw.basedir.as_deref()) {
        Some(rel) => fs::normalize_lexically(&dir.join(rel)),
        None => dir.to_path_buf(),
    };
    let mut project = Project::new(&base_dir, fs).with_options(options.build);
    if let Some(name) = raw.name {
        project = project.named(name);
    }
    *project.predicates_mut() = options.predicates;

    let properties = project.properties();
    for (name, value) in options.properties {
        if name != BASEDIR_PROPERTY {
            properties.set(name, value);
        }
    }
    properties.set(BASEDIR_PROPERTY, base_dir.display().to_string());
    for (name, value) in raw.properties {
        let value = scalar(&value)
            .with_context(|| format!("property '{name}' must be a string, number or boolean"))?;
        properties.set(name, value);
    }

    for raw_target in raw.targets {
        let name = raw_target.name.clone();
        let target = build_target(raw_target, registry)
            .with_context(|| format!("in target '{name}'"))?;
        project.add_target(target)?;
    }
    if let Some(default) = raw.default {
        project.set_default_target(default);
    }

    project.validate()?;
    tracing::debug!(
        target: "antler::config",
        "loaded {} target(s), base directory {}",
        project.target_names().len(),
        base_dir.display()
    );
    Ok(project)
}

fn build_target(raw: RawTarget, registry: &TaskRegistry) -> Result<Target> {
    let mut target = Target::new(raw.name);
    target.depends = raw.depends;
    target.description = raw.description;
    target.if_condition = raw.if_condition.map(Condition::from);
    target.unless_condition = raw.unless.map(Condition::from);
    for (index, table) in raw.tasks.into_iter().enumerate() {
        let spec = build_task(table, registry).with_context(|| format!("task #{}", index + 1))?;
        target.tasks.push(spec);
    }
    Ok(target)
}

fn build_task(mut table: toml::Table, registry: &TaskRegistry) -> Result<TaskSpec> {
    let kind = match table.remove("kind") {
        Some(toml::Value::String(kind)) => kind,
        Some(_) => bail!("'kind' must be a string"),
        None => bail!("task without a 'kind'"),
    };
    let label = match table.remove("label") {
        Some(toml::Value::String(label)) => Some(label),
        Some(_) => bail!("'label' must be a string"),
        None => None,
    };
    let if_condition = take_guard(&mut table, "if")?;
    let unless_condition = take_guard(&mut table, "unless")?;

    let task = registry.create(&TaskDescriptor {
        kind,
        attributes: table,
    })?;
    let mut spec = TaskSpec::from_arc(task);
    if let Some(label) = label {
        spec = spec.labelled(label);
    }
    spec.if_condition = if_condition;
    spec.unless_condition = unless_condition;
    Ok(spec)
}

fn take_guard(table: &mut toml::Table, key: &str) -> Result<Option<Condition>> {
    table
        .remove(key)
        .map(|value| {
            value
                .try_into::<RawGuard>()
                .map(Condition::from)
                .with_context(|| format!("invalid '{key}' guard"))
        })
        .transpose()
}

fn scalar(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        toml::Value::Datetime(_) | toml::Value::Array(_) | toml::Value::Table(_) => None,
    }
}
