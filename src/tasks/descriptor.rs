//! Untyped task declaration as read from a project descriptor.
use indexmap::IndexMap;

use crate::error::{BuildError, Result};
use crate::filters::FilterSpec;

/// A task kind plus its raw attributes.
///
/// Constructors in the [`TaskRegistry`](super::TaskRegistry) read attributes
/// through the typed getters, which report [`BuildError::InvalidTask`] so a
/// malformed descriptor fails at load time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDescriptor {
    /// Task kind (`echo`, `copy`, ...).
    pub kind: String,
    /// Attributes other than `kind` and the guards.
    pub attributes: toml::Table,
}

impl TaskDescriptor {
    /// A descriptor with no attributes.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attributes: toml::Table::new(),
        }
    }

    /// Add an attribute.
    #[must_use]
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    fn invalid(&self, reason: impl Into<String>) -> BuildError {
        BuildError::InvalidTask {
            kind: self.kind.clone(),
            reason: reason.into(),
        }
    }

    /// Reject attributes outside `known`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidTask`] naming the first unknown attribute.
    pub fn allow(&self, known: &[&str]) -> Result<()> {
        match self.attributes.keys().find(|k| !known.contains(&k.as_str())) {
            Some(key) => Err(self.invalid(format!("unknown attribute '{key}'"))),
            None => Ok(()),
        }
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// A scalar attribute rendered as text. Numbers and booleans are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidTask`] for arrays and tables.
    pub fn string(&self, key: &str) -> Result<Option<String>> {
        self.attributes
            .get(key)
            .map(|v| scalar(v).ok_or_else(|| self.invalid(format!("'{key}' must be a string"))))
            .transpose()
    }

    /// A scalar attribute that must be present.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidTask`] if missing or not a scalar.
    pub fn required(&self, key: &str) -> Result<String> {
        self.string(key)?
            .ok_or_else(|| self.invalid(format!("missing required attribute '{key}'")))
    }

    /// A boolean attribute. Strings `true`/`yes`/`on` and `false`/`no`/`off`
    /// are accepted as well.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidTask`] for any other value.
    pub fn flag(&self, key: &str) -> Result<Option<bool>> {
        let Some(value) = self.attributes.get(key) else {
            return Ok(None);
        };
        let parsed = match value {
            toml::Value::Boolean(b) => Some(*b),
            toml::Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" => Some(true),
                "false" | "no" | "off" => Some(false),
                _ => None,
            },
            _ => None,
        };
        parsed
            .map(Some)
            .ok_or_else(|| self.invalid(format!("'{key}' must be a boolean")))
    }

    /// A list attribute: an array of scalars, or one comma-separated string.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidTask`] for tables or nested arrays.
    pub fn list(&self, key: &str) -> Result<Vec<String>> {
        match self.attributes.get(key) {
            None => Ok(Vec::new()),
            Some(toml::Value::Array(items)) => items
                .iter()
                .map(|v| {
                    scalar(v).ok_or_else(|| self.invalid(format!("'{key}' entries must be strings")))
                })
                .collect(),
            Some(toml::Value::String(s)) => Ok(s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()),
            Some(_) => Err(self.invalid(format!("'{key}' must be a list"))),
        }
    }

    /// A filter chain attribute: an array of tables, each with a `type` tag.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidTask`] if an entry is not a table, has no
    /// `type`, or carries a non-scalar parameter.
    pub fn filters(&self, key: &str) -> Result<Vec<FilterSpec>> {
        let Some(value) = self.attributes.get(key) else {
            return Ok(Vec::new());
        };
        let toml::Value::Array(entries) = value else {
            return Err(self.invalid(format!("'{key}' must be an array of filter tables")));
        };
        entries
            .iter()
            .map(|entry| {
                let toml::Value::Table(table) = entry else {
                    return Err(self.invalid(format!("'{key}' entries must be tables")));
                };
                let kind = table
                    .get("type")
                    .and_then(toml::Value::as_str)
                    .ok_or_else(|| self.invalid(format!("'{key}' entry without a 'type'")))?;
                let params = table
                    .iter()
                    .filter(|(k, _)| k.as_str() != "type")
                    .map(|(k, v)| {
                        scalar(v)
                            .map(|v| (k.clone(), v))
                            .ok_or_else(|| self.invalid(format!("filter parameter '{k}' must be a scalar")))
                    })
                    .collect::<Result<IndexMap<_, _>>>()?;
                Ok(FilterSpec {
                    kind: kind.to_string(),
                    params,
                })
            })
            .collect()
    }
}

fn scalar(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        toml::Value::Datetime(d) => Some(d.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => None,
    }
}
