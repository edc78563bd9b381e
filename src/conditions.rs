//! Guard conditions for targets and tasks.
//!
//! A [`Condition`] is a tagged tree evaluated by one recursive function.
//! Evaluation has no side effects and may be repeated; operands are
//! property-expanded each time, so a guard sees the store as it is when the
//! guard is reached. `and`/`or` short-circuit.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::{BuildError, Result};
use crate::fs::FileSystem;
use crate::properties::PropertyStore;

/// What [`Condition::Available`] requires the path to be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AvailableKind {
    /// File or directory.
    #[default]
    Any,
    /// Anything but a directory.
    File,
    /// A directory.
    Dir,
}

/// Boolean expression node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// The property is assigned (to anything, even the empty string).
    IsSet(String),
    /// The expanded value is `true`, `yes` or `on` (any case).
    IsTrue(String),
    /// The named property's expanded value equals `value`; unset is false.
    PropertyEquals {
        /// Property name.
        name: String,
        /// Literal to compare with.
        value: String,
    },
    /// Two expanded strings are equal.
    Equals {
        /// Left operand.
        arg1: String,
        /// Right operand.
        arg2: String,
        /// Compare case-sensitively.
        case_sensitive: bool,
        /// Trim surrounding whitespace first.
        trim: bool,
    },
    /// A path (relative to the base directory) exists.
    Available {
        /// Path, property-expanded.
        path: String,
        /// Required entry kind.
        kind: AvailableKind,
    },
    /// Negation.
    Not(Box<Self>),
    /// All of; stops at the first false.
    And(Vec<Self>),
    /// Any of; stops at the first true.
    Or(Vec<Self>),
    /// A predicate registered under this name.
    Custom(String),
}

/// Externally registered condition leaf.
pub trait Predicate: Send + Sync {
    /// Evaluate against the current build state.
    ///
    /// # Errors
    ///
    /// Returns an error if an operand cannot be resolved.
    fn evaluate(&self, ctx: &ConditionContext<'_>) -> Result<bool>;
}

impl<F> Predicate for F
where
    F: Fn(&ConditionContext<'_>) -> Result<bool> + Send + Sync,
{
    fn evaluate(&self, ctx: &ConditionContext<'_>) -> Result<bool> {
        self(ctx)
    }
}

/// Named custom predicates.
#[derive(Clone, Default)]
pub struct PredicateRegistry {
    predicates: BTreeMap<String, Arc<dyn Predicate>>,
}

impl fmt::Debug for PredicateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.predicates.keys()).finish()
    }
}

impl PredicateRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `predicate` under `name`, replacing any earlier one.
    pub fn register(&mut self, name: impl Into<String>, predicate: impl Predicate + 'static) {
        self.predicates.insert(name.into(), Arc::new(predicate));
    }

    /// Register a closure under `name`.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&ConditionContext<'_>) -> Result<bool> + Send + Sync + 'static,
    {
        self.register(name, f);
    }

    /// Look up a predicate.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Predicate>> {
        self.predicates.get(name)
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }
}

/// Everything a condition can look at.
#[derive(Debug, Clone, Copy)]
pub struct ConditionContext<'a> {
    /// Live property store.
    pub properties: &'a PropertyStore,
    /// Filesystem driver for `available`.
    pub fs: &'a dyn FileSystem,
    /// Base directory for relative paths.
    pub base_dir: &'a Path,
    /// Custom predicates.
    pub predicates: &'a PredicateRegistry,
}

impl Condition {
    /// Shorthand for [`Condition::Not`].
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Evaluate the tree.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::CircularPropertyReference`] if expanding an
    /// operand hits a cycle, [`BuildError::UnknownPredicate`] for an
    /// unregistered custom name, or whatever a custom predicate returns.
    pub fn evaluate(&self, ctx: &ConditionContext<'_>) -> Result<bool> {
        match self {
            Self::IsSet(name) => Ok(ctx.properties.contains(name)),
            Self::IsTrue(value) => Ok(is_true(&ctx.properties.expand(value)?)),
            Self::PropertyEquals { name, value } => {
                Ok(ctx.properties.get(name)?.is_some_and(|v| v == *value))
            }
            Self::Equals {
                arg1,
                arg2,
                case_sensitive,
                trim,
            } => {
                let a = ctx.properties.expand(arg1)?;
                let b = ctx.properties.expand(arg2)?;
                let (a, b) = if *trim {
                    (a.trim(), b.trim())
                } else {
                    (a.as_str(), b.as_str())
                };
                Ok(if *case_sensitive {
                    a == b
                } else {
                    a.to_lowercase() == b.to_lowercase()
                })
            }
            Self::Available { path, kind } => {
                let path = ctx.base_dir.join(ctx.properties.expand(path)?);
                Ok(match kind {
                    AvailableKind::Any => ctx.fs.exists(&path),
                    AvailableKind::File => ctx.fs.exists(&path) && !ctx.fs.is_dir(&path),
                    AvailableKind::Dir => ctx.fs.is_dir(&path),
                })
            }
            Self::Not(inner) => Ok(!inner.evaluate(ctx)?),
            Self::And(all) => {
                for c in all {
                    if !c.evaluate(ctx)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Or(any) => {
                for c in any {
                    if c.evaluate(ctx)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::Custom(name) => ctx
                .predicates
                .get(name)
                .ok_or_else(|| BuildError::UnknownPredicate(name.clone()))?
                .evaluate(ctx),
        }
    }

    /// Names of every custom predicate in the tree.
    #[must_use]
    pub fn custom_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_custom(&mut names);
        names
    }

    fn collect_custom<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Custom(name) => out.push(name),
            Self::Not(inner) => inner.collect_custom(out),
            Self::And(cs) | Self::Or(cs) => cs.iter().for_each(|c| c.collect_custom(out)),
            _ => {}
        }
    }
}

fn is_true(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "on"
    )
}
