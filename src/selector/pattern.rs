//! Segment-wise path glob patterns.
//!
//! A pattern is split on `/` or `\` into segments. `**` matches zero or more
//! whole segments, `*` matches any run of characters inside one segment and
//! `?` matches exactly one character. Matching never compares raw path
//! strings, so `a/b` cannot match `a/bfoo` or `a/b-suffix`.

use std::fmt;

use crate::error::{BuildError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// `**`
    AnyDepth,
    /// A segment without wildcards.
    Literal(String),
    /// A segment containing `*` or `?`.
    Wild(Vec<char>),
}

impl Segment {
    fn matches(&self, name: &str, case_sensitive: bool) -> bool {
        match self {
            Self::AnyDepth => true,
            Self::Literal(lit) if case_sensitive => lit == name,
            Self::Literal(lit) => lit.to_lowercase() == name.to_lowercase(),
            Self::Wild(glob) => {
                let text: Vec<char> = name.chars().collect();
                wildcard_match(glob, &text, case_sensitive)
            }
        }
    }
}

fn chars_equal(a: char, b: char, case_sensitive: bool) -> bool {
    a == b || (!case_sensitive && a.to_lowercase().eq(b.to_lowercase()))
}

/// Match one segment's glob against a name (greedy `*` with backtracking).
fn wildcard_match(glob: &[char], text: &[char], case_sensitive: bool) -> bool {
    let (mut g, mut t) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        match glob.get(g) {
            Some('*') => {
                star = Some((g, t));
                g += 1;
            }
            Some('?') => {
                g += 1;
                t += 1;
            }
            Some(&c) if text.get(t).is_some_and(|&x| chars_equal(c, x, case_sensitive)) => {
                g += 1;
                t += 1;
            }
            _ => match star {
                Some((star_g, star_t)) => {
                    g = star_g + 1;
                    t = star_t + 1;
                    star = Some((star_g, star_t + 1));
                }
                None => return false,
            },
        }
    }
    glob.get(g..).is_some_and(|rest| rest.iter().all(|&c| c == '*'))
}

fn match_segments(pattern: &[Segment], path: &[&str], case_sensitive: bool) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((Segment::AnyDepth, rest)) => {
            (0..=path.len()).any(|skip| {
                path.get(skip..)
                    .is_some_and(|tail| match_segments(rest, tail, case_sensitive))
            })
        }
        Some((segment, rest)) => match path.split_first() {
            Some((name, tail)) => {
                segment.matches(name, case_sensitive) && match_segments(rest, tail, case_sensitive)
            }
            None => false,
        },
    }
}

/// Whether some path that starts with `path` could still match `pattern`.
fn match_start(pattern: &[Segment], path: &[&str], case_sensitive: bool) -> bool {
    let Some((name, tail)) = path.split_first() else {
        return true;
    };
    match pattern.split_first() {
        None => false,
        Some((Segment::AnyDepth, _)) => true,
        Some((segment, rest)) => {
            segment.matches(name, case_sensitive) && match_start(rest, tail, case_sensitive)
        }
    }
}

/// A parsed include or exclude pattern.
///
/// ```
/// use antler::selector::Pattern;
///
/// let p = Pattern::parse("src/**/*.rs").unwrap();
/// assert!(p.matches_str("src/lib.rs"));
/// assert!(p.matches_str("src/a/b/mod.rs"));
/// assert!(!p.matches_str("srcfoo/lib.rs"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    absolute: bool,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Parse a pattern.
    ///
    /// `\` and `/` both separate segments, and a trailing separator means
    /// everything below (`build/` is `build/**`).
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidSelector`] for an empty pattern, a NUL
    /// byte, a `..` segment, or `**` combined with other characters in one
    /// segment.
    pub fn parse(source: &str) -> Result<Self> {
        let invalid = |reason: &str| BuildError::InvalidSelector {
            pattern: source.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(invalid("pattern is empty"));
        }
        if trimmed.contains('\0') {
            return Err(invalid("pattern contains a NUL byte"));
        }

        let absolute = trimmed.starts_with(['/', '\\']) || has_drive_prefix(trimmed);
        let mut segments = Vec::new();
        for part in trimmed.split(['/', '\\']) {
            match part {
                "" | "." => {}
                ".." => return Err(invalid("`..` segments are not allowed")),
                "**" => {
                    // collapse runs of `**`
                    if segments.last() != Some(&Segment::AnyDepth) {
                        segments.push(Segment::AnyDepth);
                    }
                }
                p if p.contains("**") => {
                    return Err(invalid("`**` must be a whole path segment"));
                }
                p if p.contains(['*', '?']) => segments.push(Segment::Wild(p.chars().collect())),
                p => segments.push(Segment::Literal(p.to_string())),
            }
        }
        if trimmed.ends_with(['/', '\\']) && segments.last() != Some(&Segment::AnyDepth) {
            segments.push(Segment::AnyDepth);
        }
        if segments.is_empty() {
            return Err(invalid("pattern has no segments"));
        }

        Ok(Self {
            source: source.to_string(),
            absolute,
            segments,
        })
    }

    /// The pattern as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the pattern is anchored at the filesystem root.
    #[must_use]
    pub const fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// Match a `/`-separated relative path (case-sensitive, no base).
    #[must_use]
    pub fn matches_str(&self, relative: &str) -> bool {
        let path: Vec<&str> = relative.split(['/', '\\']).filter(|s| !s.is_empty()).collect();
        self.matches(&[], &path, true)
    }

    /// Match the path `relative` below a base directory split into `base` segments.
    pub(crate) fn matches(&self, base: &[String], relative: &[&str], case_sensitive: bool) -> bool {
        if self.absolute {
            let full = anchored(base, relative);
            match_segments(&self.segments, &full, case_sensitive)
        } else {
            match_segments(&self.segments, relative, case_sensitive)
        }
    }

    /// Whether anything below the directory `relative` could match.
    pub(crate) fn could_match_below(
        &self,
        base: &[String],
        relative: &[&str],
        case_sensitive: bool,
    ) -> bool {
        if self.absolute {
            let full = anchored(base, relative);
            match_start(&self.segments, &full, case_sensitive)
        } else {
            match_start(&self.segments, relative, case_sensitive)
        }
    }

    /// Whether the directory `relative` and everything below it match.
    pub(crate) fn covers_subtree(
        &self,
        base: &[String],
        relative: &[&str],
        case_sensitive: bool,
    ) -> bool {
        match self.segments.split_last() {
            Some((Segment::AnyDepth, head)) => {
                let prefix = Self {
                    source: String::new(),
                    absolute: self.absolute,
                    segments: head.to_vec(),
                };
                prefix.matches(base, relative, case_sensitive)
            }
            _ => false,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn has_drive_prefix(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(
        (chars.next(), chars.next(), chars.next()),
        (Some(d), Some(':'), Some('/' | '\\')) if d.is_ascii_alphabetic()
    )
}

fn anchored<'a>(base: &'a [String], relative: &[&'a str]) -> Vec<&'a str> {
    base.iter()
        .map(String::as_str)
        .chain(relative.iter().copied())
        .collect()
}
