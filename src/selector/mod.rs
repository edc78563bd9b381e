//! File selection below a base directory.
//!
//! A [`Selector`] holds include and exclude [`Pattern`]s. Walking a base
//! directory yields every entry that matches at least one include and no
//! exclude, as paths relative to the base, in stable pre-order with siblings
//! sorted by file name. Subtrees that no include can reach, or that an
//! exclude covers entirely, are never descended into.

mod pattern;

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use crate::error::{BuildError, Result};
use crate::fs::FileSystem;

pub use pattern::Pattern;

/// Version-control metadata, editor backups and OS litter excluded by default.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "**/*~",
    "**/#*#",
    "**/.#*",
    "**/%*%",
    "**/._*",
    "**/CVS",
    "**/CVS/**",
    "**/.cvsignore",
    "**/SCCS",
    "**/SCCS/**",
    "**/vssver.scc",
    "**/.svn",
    "**/.svn/**",
    "**/.git",
    "**/.git/**",
    "**/.gitattributes",
    "**/.gitignore",
    "**/.gitmodules",
    "**/.hg",
    "**/.hg/**",
    "**/.hgignore",
    "**/.hgsub",
    "**/.hgsubstate",
    "**/.hgtags",
    "**/.bzr",
    "**/.bzr/**",
    "**/.bzrignore",
    "**/.DS_Store",
];

static DEFAULT_EXCLUDE_PATTERNS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    DEFAULT_EXCLUDES
        .iter()
        .filter_map(|p| Pattern::parse(p).ok())
        .collect()
});

/// Which kinds of entries a selection returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectionKind {
    /// Regular files (and symlinks that are not followed).
    #[default]
    Files,
    /// Directories only.
    Directories,
    /// Both files and directories.
    Both,
}

impl SelectionKind {
    const fn accepts(self, is_dir: bool) -> bool {
        match self {
            Self::Files => !is_dir,
            Self::Directories => is_dir,
            Self::Both => true,
        }
    }
}

/// Include/exclude pattern set with walk options.
#[derive(Debug, Clone)]
pub struct Selector {
    includes: Vec<Pattern>,
    excludes: Vec<Pattern>,
    kind: SelectionKind,
    default_excludes: bool,
    case_sensitive: Option<bool>,
    follow_symlinks: bool,
}

impl Default for Selector {
    fn default() -> Self {
        Self {
            includes: Vec::new(),
            excludes: Vec::new(),
            kind: SelectionKind::Files,
            default_excludes: true,
            case_sensitive: None,
            follow_symlinks: false,
        }
    }
}

impl Selector {
    /// An empty selector. With no includes it selects everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a selector from include and exclude pattern strings.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidSelector`] for the first malformed pattern.
    pub fn from_patterns<S: AsRef<str>>(includes: &[S], excludes: &[S]) -> Result<Self> {
        let mut selector = Self::new();
        for p in includes {
            selector.includes.push(Pattern::parse(p.as_ref())?);
        }
        for p in excludes {
            selector.excludes.push(Pattern::parse(p.as_ref())?);
        }
        Ok(selector)
    }

    /// Add an include pattern.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidSelector`] if the pattern is malformed.
    pub fn include(mut self, pattern: &str) -> Result<Self> {
        self.includes.push(Pattern::parse(pattern)?);
        Ok(self)
    }

    /// Add an exclude pattern.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidSelector`] if the pattern is malformed.
    pub fn exclude(mut self, pattern: &str) -> Result<Self> {
        self.excludes.push(Pattern::parse(pattern)?);
        Ok(self)
    }

    /// Restrict results to files, directories or both.
    #[must_use]
    pub const fn kind(mut self, kind: SelectionKind) -> Self {
        self.kind = kind;
        self
    }

    /// Toggle the [`DEFAULT_EXCLUDES`] set (on by default).
    #[must_use]
    pub const fn default_excludes(mut self, enabled: bool) -> Self {
        self.default_excludes = enabled;
        self
    }

    /// Force case-sensitive or case-insensitive matching.
    ///
    /// Without this the filesystem driver decides.
    #[must_use]
    pub const fn case_sensitive(mut self, sensitive: bool) -> Self {
        self.case_sensitive = Some(sensitive);
        self
    }

    /// Descend into symlinked directories.
    #[must_use]
    pub const fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Include patterns in declaration order.
    #[must_use]
    pub fn includes(&self) -> &[Pattern] {
        &self.includes
    }

    /// Exclude patterns in declaration order (without the defaults).
    #[must_use]
    pub fn excludes(&self) -> &[Pattern] {
        &self.excludes
    }

    /// Select below `base`, listing directories through `fs` and matching
    /// with the driver's case sensitivity.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Filesystem`] if `base` cannot be resolved, a
    /// directory cannot be listed, or a followed symlink loops back onto one
    /// of its ancestors.
    pub fn select_with(&self, fs: &dyn FileSystem, base: &Path) -> Result<Vec<PathBuf>> {
        let base = fs.canonicalize(base)?;
        let walk = Walk {
            selector: self,
            fs,
            base_segments: absolute_segments(&base),
            case_sensitive: self.case_sensitive.unwrap_or_else(|| fs.case_sensitive()),
            base,
        };
        let mut selected = Vec::new();
        let mut ancestors = vec![walk.base.clone()];
        walk.visit(&mut Vec::new(), &mut ancestors, &mut selected)?;
        Ok(selected)
    }

    /// Select below `base` through the host's filesystem driver.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnsupportedPlatform`] on hosts without a driver,
    /// otherwise the same as [`Selector::select_with`].
    pub fn select(&self, base: &Path) -> Result<Vec<PathBuf>> {
        let fs = crate::fs::detect()?;
        self.select_with(fs.as_ref(), base)
    }

    /// Test one path relative to `base` without touching the filesystem.
    ///
    /// `base` only matters for absolute patterns; it should be the
    /// canonical directory a walk would start from.
    #[must_use]
    pub fn matches(&self, base: &Path, relative: &Path, is_dir: bool) -> bool {
        let case_sensitive = self.case_sensitive.unwrap_or(!cfg!(windows));
        let base = absolute_segments(base);
        let segments = relative_segments(relative);
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        self.kind.accepts(is_dir)
            && self.is_included(&base, &segments, case_sensitive)
            && !self.is_excluded(&base, &segments, case_sensitive)
    }

    fn is_included(&self, base: &[String], path: &[&str], case_sensitive: bool) -> bool {
        self.includes.is_empty()
            || self
                .includes
                .iter()
                .any(|p| p.matches(base, path, case_sensitive))
    }

    fn could_include_below(&self, base: &[String], path: &[&str], case_sensitive: bool) -> bool {
        self.includes.is_empty()
            || self
                .includes
                .iter()
                .any(|p| p.could_match_below(base, path, case_sensitive))
    }

    fn active_excludes(&self) -> impl Iterator<Item = &Pattern> {
        let defaults: &[Pattern] = if self.default_excludes {
            DEFAULT_EXCLUDE_PATTERNS.as_slice()
        } else {
            &[]
        };
        self.excludes.iter().chain(defaults)
    }

    fn is_excluded(&self, base: &[String], path: &[&str], case_sensitive: bool) -> bool {
        self.active_excludes()
            .any(|p| p.matches(base, path, case_sensitive))
    }

    fn excludes_subtree(&self, base: &[String], path: &[&str], case_sensitive: bool) -> bool {
        self.active_excludes()
            .any(|p| p.covers_subtree(base, path, case_sensitive))
    }
}

/// Select entries below `base` matching `includes` and not `excludes`.
///
/// # Errors
///
/// Returns [`BuildError::InvalidSelector`] for a malformed pattern and
/// [`BuildError::Filesystem`] if the walk fails.
pub fn select<S: AsRef<str>>(base: &Path, includes: &[S], excludes: &[S]) -> Result<Vec<PathBuf>> {
    Selector::from_patterns(includes, excludes)?.select(base)
}

fn relative_segments(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// Segments of an absolute path as absolute patterns spell them
/// (`C:` for a drive prefix, no empty root segment).
fn absolute_segments(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Prefix(prefix) => Some(prefix.as_os_str().to_string_lossy().into_owned()),
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// One pre-order traversal below a canonical base directory.
struct Walk<'a> {
    selector: &'a Selector,
    fs: &'a dyn FileSystem,
    base: PathBuf,
    base_segments: Vec<String>,
    case_sensitive: bool,
}

impl Walk<'_> {
    /// Visit the children of `relative`, descending only where an include
    /// could still match and no exclude covers the whole subtree.
    fn visit(
        &self,
        relative: &mut Vec<String>,
        ancestors: &mut Vec<PathBuf>,
        selected: &mut Vec<PathBuf>,
    ) -> Result<()> {
        let dir = self.path_of(relative);
        for entry in self.fs.read_dir_sorted(&dir, self.selector.follow_symlinks)? {
            relative.push(entry.name);
            if self.accept(relative, entry.is_dir, selected) {
                // Followed links can revisit a directory; track the real path of each level.
                let tracked = self.selector.follow_symlinks;
                if tracked {
                    let path = self.path_of(relative);
                    let real = self.fs.canonicalize(&path)?;
                    if ancestors.contains(&real) {
                        return Err(BuildError::io(
                            path,
                            std::io::Error::other("symlink loops back onto an ancestor"),
                        ));
                    }
                    ancestors.push(real);
                }
                self.visit(relative, ancestors, selected)?;
                if tracked {
                    ancestors.pop();
                }
            }
            relative.pop();
        }
        Ok(())
    }

    fn path_of(&self, relative: &[String]) -> PathBuf {
        let mut path = self.base.clone();
        path.extend(relative);
        path
    }

    /// Record `relative` if it is selected. Returns whether to descend.
    fn accept(&self, relative: &[String], is_dir: bool, selected: &mut Vec<PathBuf>) -> bool {
        let selector = self.selector;
        let (base, case_sensitive) = (self.base_segments.as_slice(), self.case_sensitive);
        let segments: Vec<&str> = relative.iter().map(String::as_str).collect();

        if selector.is_excluded(base, &segments, case_sensitive) {
            return is_dir && !selector.excludes_subtree(base, &segments, case_sensitive);
        }
        if selector.kind.accepts(is_dir) && selector.is_included(base, &segments, case_sensitive) {
            selected.push(relative.iter().collect());
        }
        is_dir && selector.could_include_below(base, &segments, case_sensitive)
    }
}
