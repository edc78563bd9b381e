//! `if` / `unless` values as written in a descriptor.
use serde::Deserialize;

use crate::conditions::{AvailableKind, Condition};

/// A guard: a bare property name (is-set) or a condition table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub(super) enum RawGuard {
    Name(String),
    Table(RawCondition),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub(super) enum RawCondition {
    IsSet(String),
    IsTrue(String),
    PropertyEquals {
        name: String,
        value: String,
    },
    Equals {
        arg1: String,
        arg2: String,
        #[serde(rename = "case-sensitive", default = "default_true")]
        case_sensitive: bool,
        #[serde(default)]
        trim: bool,
    },
    Available {
        file: String,
        #[serde(rename = "type", default)]
        kind: RawAvailableKind,
    },
    Not(Box<RawGuard>),
    And(Vec<RawGuard>),
    Or(Vec<RawGuard>),
    Custom(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(super) enum RawAvailableKind {
    #[default]
    Any,
    File,
    Dir,
}

const fn default_true() -> bool {
    true
}

impl From<RawGuard> for Condition {
    fn from(raw: RawGuard) -> Self {
        match raw {
            RawGuard::Name(name) => Self::IsSet(name),
            RawGuard::Table(condition) => condition.into(),
        }
    }
}

impl From<RawCondition> for Condition {
    fn from(raw: RawCondition) -> Self {
        match raw {
            RawCondition::IsSet(name) => Self::IsSet(name),
            RawCondition::IsTrue(value) => Self::IsTrue(value),
            RawCondition::PropertyEquals { name, value } => Self::PropertyEquals { name, value },
            RawCondition::Equals {
                arg1,
                arg2,
                case_sensitive,
                trim,
            } => Self::Equals {
                arg1,
                arg2,
                case_sensitive,
                trim,
            },
            RawCondition::Available { file, kind } => Self::Available {
                path: file,
                kind: match kind {
                    RawAvailableKind::Any => AvailableKind::Any,
                    RawAvailableKind::File => AvailableKind::File,
                    RawAvailableKind::Dir => AvailableKind::Dir,
                },
            },
            RawCondition::Not(inner) => Self::from(*inner).negate(),
            RawCondition::And(items) => Self::And(items.into_iter().map(Into::into).collect()),
            RawCondition::Or(items) => Self::Or(items.into_iter().map(Into::into).collect()),
            RawCondition::Custom(name) => Self::Custom(name),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Holder {
        guard: RawGuard,
    }

    fn guard(src: &str) -> Condition {
        let holder: Holder = toml::from_str(&format!("guard = {src}")).unwrap();
        holder.guard.into()
    }

    #[test]
    fn bare_name_means_is_set() {
        assert_eq!(guard("'skip.tests'"), Condition::IsSet("skip.tests".into()));
    }

    #[test]
    fn leaf_tables() {
        assert_eq!(guard("{ is-true = '${ci}' }"), Condition::IsTrue("${ci}".into()));
        assert_eq!(
            guard("{ property-equals = { name = 'os', value = 'linux' } }"),
            Condition::PropertyEquals {
                name: "os".into(),
                value: "linux".into()
            }
        );
        assert_eq!(
            guard("{ equals = { arg1 = 'a', arg2 = 'A', case-sensitive = false } }"),
            Condition::Equals {
                arg1: "a".into(),
                arg2: "A".into(),
                case_sensitive: false,
                trim: false
            }
        );
        assert_eq!(
            guard("{ available = { file = 'lib', type = 'dir' } }"),
            Condition::Available {
                path: "lib".into(),
                kind: AvailableKind::Dir
            }
        );
        assert_eq!(guard("{ custom = 'online' }"), Condition::Custom("online".into()));
    }

    #[test]
    fn composites_nest() {
        let c = guard("{ and = ['a', { not = { or = ['b', { is-set = 'c' }] } }] }");
        assert_eq!(
            c,
            Condition::And(vec![
                Condition::IsSet("a".into()),
                Condition::Or(vec![
                    Condition::IsSet("b".into()),
                    Condition::IsSet("c".into())
                ])
                .negate(),
            ])
        );
    }

    #[test]
    fn unknown_condition_is_rejected() {
        let result: Result<Holder, _> = toml::from_str("guard = { is-cool = 'x' }");
        assert!(result.is_err());
    }
}
