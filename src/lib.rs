//! Declarative build engine.
//!
//! A project is a set of named targets with dependencies, each holding an
//! ordered list of tasks. Executing a target runs its transitive
//! dependencies first, exactly once per build.
//!
//! The public API is organised into layers:
//!
//! - **[`properties`]**: first-write-wins property store with lazy `${name}` expansion
//! - **[`selector`]**: `**`-aware include/exclude patterns and directory selection
//! - **[`filters`]**: validated filter chains applied while reading file content
//! - **[`conditions`]**: guard expressions for targets and tasks
//! - **[`project`]**: the target graph, serial executor and parallel scheduler
//! - **[`tasks`]**: the task trait, registry and built-in task kinds
//! - **[`config`]**: the TOML project descriptor loader
//!
//! Filesystem access goes through [`fs::FileSystem`], progress is reported as
//! [`logging::BuildEvent`]s and errors are [`error::BuildError`]s.
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod conditions;
pub mod config;
pub mod error;
pub mod exec;
pub mod filters;
pub mod fs;
pub mod logging;
pub mod platform;
pub mod project;
pub mod properties;
pub mod selector;
pub mod tasks;
