//! Filter chains applied to file content while it is read.
//!
//! A [`FilterChain`] is built once from [`FilterSpec`]s (type tag plus
//! parameter map) and validated at that point, so an unknown type or a bad
//! number is a load-time [`BuildError::InvalidFilter`]. Applying the chain
//! folds the stages left to right over the text; each stage is a plain
//! function from one buffer to the next.

mod lines;
mod side_file;
mod tokens;

use std::io::{Cursor, Read};
use std::path::Path;

use indexmap::IndexMap;

use crate::error::{BuildError, Result};
use crate::fs::FileSystem;
use crate::properties::PropertyStore;

pub use side_file::parse_side_file;

const DEFAULT_HEAD_LINES: usize = 10;
const DEFAULT_TOKEN: &str = "@";
const INLINE_TOKEN_PREFIX: &str = "token.";

/// One stage as written in a descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    /// Type tag (`head`, `prefix-lines`, `replace-tokens`, ...).
    pub kind: String,
    /// Stage parameters in declaration order.
    pub params: IndexMap<String, String>,
}

impl FilterSpec {
    /// A spec with no parameters.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: IndexMap::new(),
        }
    }

    /// Add a parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Collaborators a chain needs at read time.
#[derive(Debug, Clone, Copy)]
pub struct FilterEnv<'a> {
    /// Driver used to read side files and sources.
    pub fs: &'a dyn FileSystem,
    /// Store for `expand-properties` and side-file paths.
    pub properties: &'a PropertyStore,
    /// Directory relative side-file paths resolve against.
    pub base_dir: &'a Path,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Stage {
    Head { lines: Option<usize>, skip: usize },
    HeadChars { characters: Option<usize>, skip: usize },
    Tail { lines: Option<usize>, skip: usize },
    PrefixLines { prefix: String, trailing: bool },
    ReplaceTokens {
        file: Option<String>,
        begin: String,
        end: String,
        inline: IndexMap<String, String>,
    },
    ReplaceString { from: String, to: String },
    StripLineComments { prefixes: Vec<String> },
    IgnoreBlank,
    Trim,
    LineContains { needles: Vec<String>, negate: bool },
    ExpandProperties,
}

/// An ordered, validated list of stages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterChain {
    stages: Vec<Stage>,
}

impl FilterChain {
    /// An empty chain (identity).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a chain from specs in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidFilter`] for an unknown type tag, an
    /// unknown parameter, or a parameter that does not parse.
    pub fn from_specs(specs: &[FilterSpec]) -> Result<Self> {
        let mut chain = Self::new();
        for spec in specs {
            chain.push(spec)?;
        }
        Ok(chain)
    }

    /// Append one stage.
    ///
    /// # Errors
    ///
    /// Same as [`FilterChain::from_specs`].
    pub fn push(&mut self, spec: &FilterSpec) -> Result<()> {
        self.stages.push(Stage::parse(spec)?);
        Ok(())
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the chain has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run `input` through every stage.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Filesystem`] if a side file cannot be read and
    /// [`BuildError::CircularPropertyReference`] if property expansion hits a
    /// cycle.
    pub fn apply_str(&self, input: &str, env: &FilterEnv<'_>) -> Result<String> {
        let mut text = input.to_string();
        for stage in &self.stages {
            text = stage.apply(&text, env)?;
        }
        Ok(text)
    }

    /// Drain `source` through the chain into a rewindable reader.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Filesystem`] if `source` fails or is not UTF-8,
    /// plus anything [`FilterChain::apply_str`] returns.
    pub fn reader<R: Read>(&self, mut source: R, env: &FilterEnv<'_>) -> Result<Cursor<Vec<u8>>> {
        let mut input = String::new();
        source
            .read_to_string(&mut input)
            .map_err(|e| BuildError::io("<stream>", e))?;
        Ok(Cursor::new(self.apply_str(&input, env)?.into_bytes()))
    }

    /// Read a file through the chain.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Filesystem`] if the file cannot be read, plus
    /// anything [`FilterChain::apply_str`] returns.
    pub fn read_file(&self, path: &Path, env: &FilterEnv<'_>) -> Result<String> {
        let content = env.fs.read_to_string(path)?;
        self.apply_str(&content, env)
    }
}

impl Stage {
    fn parse(spec: &FilterSpec) -> Result<Self> {
        let params = Params::new(spec);
        let stage = match spec.kind.as_str() {
            "head" => {
                params.allow(&["lines", "skip", "characters"])?;
                let skip = params.count("skip")?.unwrap_or(0);
                if params.has("characters") {
                    Self::HeadChars {
                        characters: params.limit("characters", true)?.flatten(),
                        skip,
                    }
                } else {
                    Self::Head {
                        lines: params
                            .limit("lines", false)?
                            .unwrap_or(Some(DEFAULT_HEAD_LINES)),
                        skip,
                    }
                }
            }
            "tail" => {
                params.allow(&["lines", "skip"])?;
                Self::Tail {
                    lines: params
                        .limit("lines", false)?
                        .unwrap_or(Some(DEFAULT_HEAD_LINES)),
                    skip: params.count("skip")?.unwrap_or(0),
                }
            }
            "prefix-lines" => {
                params.allow(&["prefix", "prefix-trailing"])?;
                Self::PrefixLines {
                    prefix: params.string("prefix").unwrap_or_default(),
                    trailing: params.flag("prefix-trailing")?.unwrap_or(false),
                }
            }
            "replace-tokens" => {
                params.allow_with_prefix(&["file", "begin-token", "end-token"], INLINE_TOKEN_PREFIX)?;
                let inline = spec
                    .params
                    .iter()
                    .filter_map(|(k, v)| {
                        k.strip_prefix(INLINE_TOKEN_PREFIX)
                            .map(|key| (key.to_string(), v.clone()))
                    })
                    .collect();
                Self::ReplaceTokens {
                    file: params.string("file"),
                    begin: params.string("begin-token").unwrap_or_else(|| DEFAULT_TOKEN.into()),
                    end: params.string("end-token").unwrap_or_else(|| DEFAULT_TOKEN.into()),
                    inline,
                }
            }
            "replace-string" => {
                params.allow(&["from", "to"])?;
                let from = params.required("from")?;
                if from.is_empty() {
                    return Err(params.invalid("'from' must not be empty"));
                }
                Self::ReplaceString {
                    from,
                    to: params.string("to").unwrap_or_default(),
                }
            }
            "strip-line-comments" => {
                params.allow(&["comment"])?;
                Self::StripLineComments {
                    prefixes: params.list("comment").unwrap_or_else(|| vec!["#".into()]),
                }
            }
            "ignore-blank" => {
                params.allow(&[])?;
                Self::IgnoreBlank
            }
            "trim" => {
                params.allow(&[])?;
                Self::Trim
            }
            "line-contains" => {
                params.allow(&["contains", "negate"])?;
                Self::LineContains {
                    needles: params
                        .list("contains")
                        .ok_or_else(|| params.invalid("missing parameter 'contains'"))?,
                    negate: params.flag("negate")?.unwrap_or(false),
                }
            }
            "expand-properties" => {
                params.allow(&[])?;
                Self::ExpandProperties
            }
            _ => return Err(params.invalid("unknown filter type")),
        };
        Ok(stage)
    }

    fn apply(&self, input: &str, env: &FilterEnv<'_>) -> Result<String> {
        let out = match self {
            Self::Head { lines, skip } => lines::head(input, *lines, *skip),
            Self::HeadChars { characters, skip } => lines::head_chars(input, *characters, *skip),
            Self::Tail { lines, skip } => lines::tail(input, *lines, *skip),
            Self::PrefixLines { prefix, trailing } => lines::prefix_lines(input, prefix, *trailing),
            Self::ReplaceTokens {
                file,
                begin,
                end,
                inline,
            } => {
                let mut table = inline.clone();
                if let Some(file) = file {
                    let path = env.base_dir.join(env.properties.expand(file)?);
                    let content = env.fs.read_to_string(&path)?;
                    for (key, value) in parse_side_file(&content) {
                        table.entry(key).or_insert(value);
                    }
                }
                tokens::replace_tokens(input, &table, begin, end)
            }
            Self::ReplaceString { from, to } => input.replace(from.as_str(), to),
            Self::StripLineComments { prefixes } => lines::strip_line_comments(input, prefixes),
            Self::IgnoreBlank => lines::ignore_blank(input),
            Self::Trim => lines::trim(input),
            Self::LineContains { needles, negate } => lines::line_contains(input, needles, *negate),
            Self::ExpandProperties => env.properties.expand(input)?,
        };
        Ok(out)
    }
}

/// Typed access to a spec's parameter map.
struct Params<'a> {
    spec: &'a FilterSpec,
}

impl<'a> Params<'a> {
    const fn new(spec: &'a FilterSpec) -> Self {
        Self { spec }
    }

    fn invalid(&self, reason: impl Into<String>) -> BuildError {
        BuildError::InvalidFilter {
            kind: self.spec.kind.clone(),
            reason: reason.into(),
        }
    }

    fn allow(&self, known: &[&str]) -> Result<()> {
        self.allow_with_prefix(known, "")
    }

    fn allow_with_prefix(&self, known: &[&str], prefix: &str) -> Result<()> {
        for key in self.spec.params.keys() {
            let prefixed = !prefix.is_empty() && key.starts_with(prefix);
            if !prefixed && !known.contains(&key.as_str()) {
                return Err(self.invalid(format!("unknown parameter '{key}'")));
            }
        }
        Ok(())
    }

    fn has(&self, key: &str) -> bool {
        self.spec.params.contains_key(key)
    }

    fn string(&self, key: &str) -> Option<String> {
        self.spec.params.get(key).cloned()
    }

    fn required(&self, key: &str) -> Result<String> {
        self.string(key)
            .ok_or_else(|| self.invalid(format!("missing parameter '{key}'")))
    }

    fn list(&self, key: &str) -> Option<Vec<String>> {
        self.spec.params.get(key).map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
    }

    fn integer(&self, key: &str) -> Result<Option<i64>> {
        self.spec
            .params
            .get(key)
            .map(|v| {
                v.trim()
                    .parse::<i64>()
                    .map_err(|_| self.invalid(format!("'{key}' must be an integer, got '{v}'")))
            })
            .transpose()
    }

    /// Non-negative count.
    fn count(&self, key: &str) -> Result<Option<usize>> {
        self.integer(key)?
            .map(|n| {
                usize::try_from(n)
                    .map_err(|_| self.invalid(format!("'{key}' must not be negative, got {n}")))
            })
            .transpose()
    }

    /// A limit where negative means unlimited (`Some(None)`); with
    /// `zero_unlimited` zero does too.
    fn limit(&self, key: &str, zero_unlimited: bool) -> Result<Option<Option<usize>>> {
        Ok(self.integer(key)?.map(|n| {
            if n < 0 || (zero_unlimited && n == 0) {
                None
            } else {
                usize::try_from(n).ok()
            }
        }))
    }

    fn flag(&self, key: &str) -> Result<Option<bool>> {
        self.spec
            .params
            .get(key)
            .map(|v| match v.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" => Ok(true),
                "false" | "no" | "off" => Ok(false),
                _ => Err(self.invalid(format!("'{key}' must be a boolean, got '{v}'"))),
            })
            .transpose()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;
    use std::io::{Seek as _, SeekFrom};

    struct Env {
        fs: MockFileSystem,
        props: PropertyStore,
    }

    impl Env {
        fn new() -> Self {
            Self::with_fs(MockFileSystem::new())
        }

        fn with_fs(fs: MockFileSystem) -> Self {
            Self {
                fs,
                props: PropertyStore::new(),
            }
        }

        fn env(&self) -> FilterEnv<'_> {
            FilterEnv {
                fs: &self.fs,
                properties: &self.props,
                base_dir: Path::new("/project"),
            }
        }
    }

    fn run(specs: &[FilterSpec], input: &str) -> String {
        let env = Env::new();
        FilterChain::from_specs(specs)
            .unwrap()
            .apply_str(input, &env.env())
            .unwrap()
    }

    // -----------------------------------------------------------------------
    // construction
    // -----------------------------------------------------------------------

    #[test]
    fn unknown_type_is_rejected() {
        let err = FilterChain::from_specs(&[FilterSpec::new("rot13")]).unwrap_err();
        assert_eq!(err.to_string(), "Invalid filter 'rot13': unknown filter type");
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let err = FilterChain::from_specs(&[FilterSpec::new("head").param("lines", "two")])
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidFilter { kind, .. } if kind == "head"));
        assert!(
            FilterChain::from_specs(&[FilterSpec::new("tail").param("skip", "-1")]).is_err()
        );
    }

    #[test]
    fn unknown_parameters_are_rejected() {
        let err =
            FilterChain::from_specs(&[FilterSpec::new("trim").param("mode", "x")]).unwrap_err();
        assert!(err.to_string().contains("unknown parameter 'mode'"));
    }

    // -----------------------------------------------------------------------
    // stages
    // -----------------------------------------------------------------------

    #[test]
    fn head_two_of_five() {
        let out = run(&[FilterSpec::new("head").param("lines", "2")], "1\n2\n3\n4\n5\n");
        assert_eq!(out, "1\n2\n");
    }

    #[test]
    fn head_defaults_to_ten_lines() {
        let input: String = (1..=12).map(|n| format!("{n}\n")).collect();
        let out = run(&[FilterSpec::new("head")], &input);
        assert_eq!(out.lines().count(), 10);
    }

    #[test]
    fn head_negative_lines_is_unlimited() {
        let out = run(&[FilterSpec::new("head").param("lines", "-1")], "a\nb\n");
        assert_eq!(out, "a\nb\n");
    }

    #[test]
    fn head_characters_zero_or_negative_is_unlimited() {
        for n in ["0", "-5"] {
            let out = run(&[FilterSpec::new("head").param("characters", n)], "abcdef");
            assert_eq!(out, "abcdef");
        }
        let out = run(&[FilterSpec::new("head").param("characters", "3")], "abcdef");
        assert_eq!(out, "abc");
    }

    #[test]
    fn prefix_lines_foo() {
        let out = run(&[FilterSpec::new("prefix-lines").param("prefix", "Foo")], "a\nb\n");
        assert_eq!(out, "Fooa\nFoob\n");
        let out = run(
            &[FilterSpec::new("prefix-lines")
                .param("prefix", "Foo")
                .param("prefix-trailing", "true")],
            "a\nb\n",
        );
        assert_eq!(out, "Fooa\nFoob\nFoo");
    }

    #[test]
    fn replace_tokens_from_side_file() {
        let env = Env::with_fs(
            MockFileSystem::new().with_file("/project/tokens.ini", "; values\nkey=replaced\n"),
        );
        let chain = FilterChain::from_specs(&[
            FilterSpec::new("replace-tokens").param("file", "tokens.ini")
        ])
        .unwrap();
        assert_eq!(
            chain.apply_str("to replace: @key@", &env.env()).unwrap(),
            "to replace: replaced"
        );
    }

    #[test]
    fn replace_tokens_side_file_path_is_expanded() {
        let env = Env::with_fs(MockFileSystem::new().with_file("/project/etc/t.ini", "v=9\n"));
        env.props.set("conf", "etc");
        let chain = FilterChain::from_specs(&[
            FilterSpec::new("replace-tokens").param("file", "${conf}/t.ini")
        ])
        .unwrap();
        assert_eq!(chain.apply_str("@v@", &env.env()).unwrap(), "9");
    }

    #[test]
    fn replace_tokens_all_malformed_passes_through() {
        let env =
            Env::with_fs(MockFileSystem::new().with_file("/project/bad.ini", "nothing valid\n"));
        let chain =
            FilterChain::from_specs(&[FilterSpec::new("replace-tokens").param("file", "bad.ini")])
                .unwrap();
        assert_eq!(chain.apply_str("@key@", &env.env()).unwrap(), "@key@");
    }

    #[test]
    fn replace_tokens_missing_side_file_is_filesystem_error() {
        let env = Env::new();
        let chain =
            FilterChain::from_specs(&[FilterSpec::new("replace-tokens").param("file", "nope.ini")])
                .unwrap();
        let err = chain.apply_str("@key@", &env.env()).unwrap_err();
        assert!(matches!(err, BuildError::Filesystem { .. }));
    }

    #[test]
    fn replace_tokens_inline_with_custom_delimiters() {
        let out = run(
            &[FilterSpec::new("replace-tokens")
                .param("begin-token", "%")
                .param("end-token", "%")
                .param("token.name", "world")],
            "hello %name% and @name@",
        );
        assert_eq!(out, "hello world and @name@");
    }

    #[test]
    fn stages_compose_left_to_right() {
        let out = run(
            &[
                FilterSpec::new("strip-line-comments"),
                FilterSpec::new("ignore-blank"),
                FilterSpec::new("head").param("lines", "2"),
                FilterSpec::new("prefix-lines").param("prefix", "> "),
            ],
            "# header\n\none\ntwo\nthree\n",
        );
        assert_eq!(out, "> one\n> two\n");
    }

    #[test]
    fn expand_properties_uses_live_store() {
        let env = Env::new();
        let chain = FilterChain::from_specs(&[FilterSpec::new("expand-properties")]).unwrap();
        env.props.set("who", "late");
        assert_eq!(chain.apply_str("hi ${who}", &env.env()).unwrap(), "hi late");
    }

    #[test]
    fn expand_properties_reports_cycles() {
        let env = Env::new();
        env.props.set("a", "${b}");
        env.props.set("b", "${a}");
        let chain = FilterChain::from_specs(&[FilterSpec::new("expand-properties")]).unwrap();
        let err = chain.apply_str("${a}", &env.env()).unwrap_err();
        assert!(matches!(err, BuildError::CircularPropertyReference { .. }));
    }

    #[test]
    fn line_contains_and_replace_string() {
        let out = run(
            &[
                FilterSpec::new("line-contains").param("contains", "keep"),
                FilterSpec::new("replace-string")
                    .param("from", "keep")
                    .param("to", "kept"),
            ],
            "keep a\ndrop b\nkeep c\n",
        );
        assert_eq!(out, "kept a\nkept c\n");
    }

    // -----------------------------------------------------------------------
    // stream surface
    // -----------------------------------------------------------------------

    #[test]
    fn reader_is_rereadable() {
        let env = Env::new();
        let chain =
            FilterChain::from_specs(&[FilterSpec::new("tail").param("lines", "1")]).unwrap();
        let mut reader = chain.reader("a\nb\n".as_bytes(), &env.env()).unwrap();

        let mut first = String::new();
        reader.read_to_string(&mut first).unwrap();
        reader.seek(SeekFrom::Start(0)).unwrap();
        let mut second = String::new();
        reader.read_to_string(&mut second).unwrap();

        assert_eq!(first, "b\n");
        assert_eq!(first, second);
    }

    #[test]
    fn read_file_goes_through_driver() {
        let env = Env::with_fs(MockFileSystem::new().with_file("/project/in.txt", "x\ny\n"));
        let chain = FilterChain::from_specs(&[FilterSpec::new("head").param("lines", "1")]).unwrap();
        assert_eq!(
            chain.read_file(Path::new("/project/in.txt"), &env.env()).unwrap(),
            "x\n"
        );
    }

    #[test]
    fn empty_chain_is_identity() {
        assert_eq!(run(&[], "as is\n"), "as is\n");
    }
}
