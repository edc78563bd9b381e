// Shared helpers for integration tests.
//
// Provides a temporary-directory-backed project and a fluent builder so each
// integration test can lay out sources and a descriptor without repeating
// filesystem boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use antler::config::{self, LoadOptions};
use antler::logging::RecordingSink;
use antler::project::{BuildOptions, Project};
use antler::tasks::TaskRegistry;

/// Name of the descriptor written by [`ProjectFixture::with_descriptor`].
pub const DESCRIPTOR: &str = "build.toml";

/// An isolated project directory backed by a [`tempfile::TempDir`].
///
/// The directory is deleted when the fixture is dropped.
pub struct ProjectFixture {
    root: tempfile::TempDir,
}

impl ProjectFixture {
    /// Start from an empty directory.
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().expect("create temp dir"),
        }
    }

    /// Write `content` to `rel`, creating parent directories.
    pub fn with_file(self, rel: &str, content: &str) -> Self {
        let path = self.root.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dir");
        }
        std::fs::write(&path, content).expect("write fixture file");
        self
    }

    /// Write the project descriptor.
    pub fn with_descriptor(self, toml: &str) -> Self {
        self.with_file(DESCRIPTOR, toml)
    }

    /// Canonical project root (what the loader resolves `basedir` to).
    pub fn root(&self) -> PathBuf {
        dunce::canonicalize(self.root.path()).expect("canonicalize root")
    }

    /// Absolute path of `rel` inside the project.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.path().join(rel)
    }

    /// Contents of `rel`.
    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.path(rel)).expect("read fixture file")
    }

    /// Whether `rel` exists.
    pub fn exists(&self, rel: &str) -> bool {
        self.path(rel).exists()
    }

    /// Load the descriptor with default options.
    pub fn load(&self) -> (Project, Arc<RecordingSink>) {
        self.load_with(LoadOptions::default())
    }

    /// Load the descriptor in keep-going and/or parallel mode.
    pub fn load_mode(&self, keep_going: bool, parallel: bool) -> (Project, Arc<RecordingSink>) {
        self.load_with(LoadOptions {
            build: BuildOptions {
                keep_going,
                parallel,
            },
            ..LoadOptions::default()
        })
    }

    /// Load the descriptor, recording events.
    pub fn load_with(&self, options: LoadOptions) -> (Project, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let project = self.try_load(options).expect("load project").with_sink(sink.clone());
        (project, sink)
    }

    /// Load the descriptor, returning the loader's error.
    pub fn try_load(&self, options: LoadOptions) -> anyhow::Result<Project> {
        let fs = antler::fs::detect().expect("filesystem driver");
        config::load(
            &self.root.path().join(DESCRIPTOR),
            fs,
            &TaskRegistry::with_builtins(),
            options,
        )
    }
}

/// Relative paths of every file below `dir`, sorted, with `/` separators.
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(dir)
                .ok()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    files.sort();
    files
}
