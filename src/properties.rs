//! Build properties with first-write-wins assignment and lazy `${name}` expansion.
//!
//! Values are stored raw. Every read re-runs expansion against the current
//! contents, so a property may reference names that are only assigned later
//! in the build. Cycles are caught by tracking the chain of names currently
//! being expanded; there is no iteration limit.
//!
//! ```
//! use antler::properties::PropertyStore;
//!
//! let props = PropertyStore::new();
//! props.set("dist", "${build}/dist");
//! props.set("build", "out");
//! assert_eq!(props.get("dist").unwrap().as_deref(), Some("out/dist"));
//! ```

use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use indexmap::{IndexMap, IndexSet};

use crate::error::{BuildError, Result};

/// Ordered, thread-safe property mapping.
///
/// Assignment is linearised by an internal lock, so "first write wins" holds
/// even when parallel targets race to set the same name.
#[derive(Debug, Default)]
pub struct PropertyStore {
    values: RwLock<IndexMap<String, String>>,
}

impl PropertyStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from `(name, value)` pairs; earlier pairs win.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        for (name, value) in pairs {
            store.set(name, value);
        }
        store
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexMap<String, String>> {
        self.values.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `name` unless it is already set.
    ///
    /// Returns `true` if the value was stored, `false` if an earlier value
    /// was kept.
    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        match values.entry(name.into()) {
            indexmap::map::Entry::Occupied(_) => false,
            indexmap::map::Entry::Vacant(slot) => {
                slot.insert(value.into());
                true
            }
        }
    }

    /// Whether `name` has been assigned.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// The stored value of `name` without expansion.
    #[must_use]
    pub fn get_raw(&self, name: &str) -> Option<String> {
        self.read().get(name).cloned()
    }

    /// The expanded value of `name`, or `None` if it was never set.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::CircularPropertyReference`] if expanding the
    /// value leads back to a name already being expanded.
    pub fn get(&self, name: &str) -> Result<Option<String>> {
        let values = self.read();
        let Some(raw) = values.get(name) else {
            return Ok(None);
        };
        let mut expander = Expander::new(&values);
        expander.chain.insert(name.to_string());
        expander.expand(raw).map(Some)
    }

    /// The expanded value of `name`, failing if it was never set.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UndefinedProperty`] if `name` is unset, or
    /// [`BuildError::CircularPropertyReference`] on a reference cycle.
    pub fn require(&self, name: &str) -> Result<String> {
        self.get(name)?
            .ok_or_else(|| BuildError::UndefinedProperty(name.to_string()))
    }

    /// Replace every `${name}` in `text` with its expanded value.
    ///
    /// References to unset names are left as written; `$$` yields `$`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::CircularPropertyReference`] on a reference cycle.
    pub fn expand(&self, text: &str) -> Result<String> {
        let values = self.read();
        Expander::new(&values).expand(text)
    }

    /// Snapshot of all raw values in assignment order.
    #[must_use]
    pub fn get_all(&self) -> IndexMap<String, String> {
        self.read().clone()
    }

    /// Snapshot of all values, expanded, in assignment order.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::CircularPropertyReference`] if any value is cyclic.
    pub fn expanded_all(&self) -> Result<IndexMap<String, String>> {
        let values = self.read();
        values
            .iter()
            .map(|(name, raw)| {
                let mut expander = Expander::new(&values);
                expander.chain.insert(name.clone());
                expander.expand(raw).map(|v| (name.clone(), v))
            })
            .collect()
    }

    /// Number of assigned properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no property has been assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

/// One expansion pass over a locked snapshot of the store.
struct Expander<'a> {
    values: &'a IndexMap<String, String>,
    /// Names currently being expanded, outermost first.
    chain: IndexSet<String>,
}

impl<'a> Expander<'a> {
    fn new(values: &'a IndexMap<String, String>) -> Self {
        Self {
            values,
            chain: IndexSet::new(),
        }
    }

    fn expand(&mut self, text: &str) -> Result<String> {
        let mut out = String::with_capacity(text.len());
        self.expand_into(text, &mut out)?;
        Ok(out)
    }

    fn expand_into(&mut self, text: &str, out: &mut String) -> Result<()> {
        let mut rest = text;
        while let Some((before, after)) = rest.split_once('$') {
            out.push_str(before);
            if let Some(tail) = after.strip_prefix('$') {
                out.push('$');
                rest = tail;
            } else if let Some(body) = after.strip_prefix('{') {
                let Some((name, tail)) = body.split_once('}') else {
                    // unterminated reference
                    out.push('$');
                    out.push_str(after);
                    return Ok(());
                };
                self.expand_reference(name, out)?;
                rest = tail;
            } else {
                out.push('$');
                rest = after;
            }
        }
        out.push_str(rest);
        Ok(())
    }

    fn expand_reference(&mut self, name: &str, out: &mut String) -> Result<()> {
        if self.chain.contains(name) {
            let mut chain: Vec<String> = self.chain.iter().cloned().collect();
            chain.push(name.to_string());
            return Err(BuildError::CircularPropertyReference { chain });
        }
        let values = self.values;
        let Some(raw) = values.get(name) else {
            out.push_str("${");
            out.push_str(name);
            out.push('}');
            return Ok(());
        };
        self.chain.insert(name.to_string());
        let result = self.expand_into(raw, out);
        self.chain.pop();
        result
    }
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn cycle_of(err: BuildError) -> Vec<String> {
        match err {
            BuildError::CircularPropertyReference { chain } => chain,
            other => panic!("expected a circular reference, got {other}"),
        }
    }

    // -----------------------------------------------------------------------
    // assignment
    // -----------------------------------------------------------------------

    #[test]
    fn first_write_wins() {
        let props = PropertyStore::new();
        assert!(props.set("x", "1"));
        assert!(!props.set("x", "2"));
        assert_eq!(props.get("x").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn from_pairs_keeps_earliest() {
        let props = PropertyStore::from_pairs([("a", "cli"), ("a", "file"), ("b", "2")]);
        assert_eq!(props.get_raw("a").as_deref(), Some("cli"));
        assert_eq!(props.len(), 2);
    }

    #[test]
    fn get_all_preserves_assignment_order() {
        let props = PropertyStore::from_pairs([("z", "1"), ("a", "2"), ("m", "${a}")]);
        let names: Vec<String> = props.get_all().into_keys().collect();
        assert_eq!(names, ["z", "a", "m"]);
        assert_eq!(props.get_all()["m"], "${a}");
        assert_eq!(props.expanded_all().unwrap()["m"], "2");
    }

    #[test]
    fn concurrent_first_write_has_one_winner() {
        let props = Arc::new(PropertyStore::new());
        let winners: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let props = Arc::clone(&props);
                    s.spawn(move || usize::from(props.set("shared", i.to_string())))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });
        assert_eq!(winners, 1);
        assert_eq!(props.len(), 1);
    }

    // -----------------------------------------------------------------------
    // expansion
    // -----------------------------------------------------------------------

    #[test]
    fn expands_nested_references() {
        let props = PropertyStore::from_pairs([
            ("root", "/src"),
            ("lib", "${root}/lib"),
            ("jar", "${lib}/app-${version}.jar"),
            ("version", "1.2"),
        ]);
        assert_eq!(props.require("jar").unwrap(), "/src/lib/app-1.2.jar");
    }

    #[test]
    fn undefined_reference_stays_literal() {
        let props = PropertyStore::from_pairs([("a", "x-${missing}-y")]);
        assert_eq!(props.require("a").unwrap(), "x-${missing}-y");
        assert_eq!(props.expand("${nope}").unwrap(), "${nope}");
    }

    #[test]
    fn late_expansion_sees_later_assignments() {
        let props = PropertyStore::new();
        props.set("greeting", "hello ${who}");
        assert_eq!(props.require("greeting").unwrap(), "hello ${who}");
        props.set("who", "world");
        assert_eq!(props.require("greeting").unwrap(), "hello world");
    }

    #[test]
    fn dollar_escapes() {
        let props = PropertyStore::from_pairs([("a", "1")]);
        assert_eq!(props.expand("$${a} = ${a}").unwrap(), "${a} = 1");
        assert_eq!(props.expand("cost: $5 $$").unwrap(), "cost: $5 $");
        assert_eq!(props.expand("é$${a}→${a}$").unwrap(), "é${a}→1$");
    }

    #[test]
    fn unterminated_reference_passes_through() {
        let props = PropertyStore::from_pairs([("a", "1")]);
        assert_eq!(props.expand("${a} ${a").unwrap(), "1 ${a");
    }

    #[test]
    fn long_acyclic_chain_terminates() {
        let props = PropertyStore::new();
        for i in 0..200 {
            props.set(format!("p{i}"), format!("${{p{}}}", i + 1));
        }
        props.set("p200", "end");
        assert_eq!(props.require("p0").unwrap(), "end");
    }

    #[test]
    fn repeated_sibling_reference_is_not_a_cycle() {
        let props = PropertyStore::from_pairs([("a", "x"), ("b", "${a}${a}${a}")]);
        assert_eq!(props.require("b").unwrap(), "xxx");
    }

    #[test]
    fn require_undefined_fails() {
        let props = PropertyStore::new();
        assert!(matches!(
            props.require("nope"),
            Err(BuildError::UndefinedProperty(name)) if name == "nope"
        ));
        assert!(props.get("nope").unwrap().is_none());
    }

    // -----------------------------------------------------------------------
    // cycles
    // -----------------------------------------------------------------------

    #[test]
    fn self_reference_is_circular() {
        let props = PropertyStore::from_pairs([("a", "${a}")]);
        assert_eq!(cycle_of(props.get("a").unwrap_err()), ["a", "a"]);
    }

    #[test]
    fn two_node_cycle_names_chain() {
        let props = PropertyStore::from_pairs([("a", "${b}"), ("b", "${a}")]);
        assert_eq!(cycle_of(props.get("a").unwrap_err()), ["a", "b", "a"]);
        assert_eq!(cycle_of(props.expand("${b}").unwrap_err()), ["b", "a", "b"]);
    }

    #[test]
    fn long_cycle_is_detected() {
        let props = PropertyStore::new();
        for i in 0..50 {
            props.set(format!("c{i}"), format!("pre-${{c{}}}", (i + 1) % 50));
        }
        let chain = cycle_of(props.require("c0").unwrap_err());
        assert_eq!(chain.len(), 51);
        assert_eq!(chain.first(), chain.last());
    }

    #[test]
    fn cycle_through_entry_chain_is_reported_in_full() {
        let props = PropertyStore::from_pairs([("x", "${a}"), ("a", "${b}"), ("b", "${a}")]);
        assert_eq!(cycle_of(props.get("x").unwrap_err()), ["x", "a", "b", "a"]);
    }

    #[test]
    fn cycle_is_only_detected_when_expanded() {
        let props = PropertyStore::new();
        assert!(props.set("a", "${b}"));
        assert!(props.set("b", "${a}"));
        assert!(props.set("c", "fine"));
        assert_eq!(props.require("c").unwrap(), "fine");
        assert!(props.expanded_all().is_err());
    }
}
