//! Dependency planning over the target table.

use std::collections::HashSet;

use indexmap::IndexMap;

use super::Target;
use crate::error::{BuildError, Result};

/// Order the dependency closure of `roots` for execution.
///
/// Depth-first in declaration order: every dependency precedes the target
/// naming it, and each target appears once even when several roots or
/// dependents share it. Revisiting a target on the current path is a
/// [`BuildError::CyclicDependency`] naming the cycle.
///
/// # Errors
///
/// Returns [`BuildError::UnknownTarget`] for a root or dependency that is not
/// in `targets`, and [`BuildError::CyclicDependency`] for a cycle.
pub(crate) fn plan<'a, S: AsRef<str>>(
    targets: &'a IndexMap<String, Target>,
    roots: &[S],
) -> Result<Vec<&'a Target>> {
    let mut planner = Planner {
        targets,
        done: HashSet::new(),
        path: Vec::new(),
        order: Vec::new(),
    };
    for root in roots {
        planner.visit(root.as_ref(), None)?;
    }
    Ok(planner.order)
}

struct Planner<'a> {
    targets: &'a IndexMap<String, Target>,
    done: HashSet<&'a str>,
    path: Vec<&'a str>,
    order: Vec<&'a Target>,
}

impl<'a> Planner<'a> {
    fn visit(&mut self, name: &str, required_by: Option<&str>) -> Result<()> {
        let targets = self.targets;
        let Some(target) = targets.get(name) else {
            return Err(BuildError::UnknownTarget {
                name: name.to_string(),
                required_by: required_by.map(String::from),
            });
        };
        let name = target.name.as_str();
        if self.done.contains(name) {
            return Ok(());
        }
        if let Some(pos) = self.path.iter().position(|n| *n == name) {
            let mut cycle: Vec<String> = self
                .path
                .get(pos..)
                .unwrap_or_default()
                .iter()
                .map(|n| (*n).to_string())
                .collect();
            cycle.push(name.to_string());
            return Err(BuildError::CyclicDependency { cycle });
        }

        self.path.push(name);
        for dep in &target.depends {
            self.visit(dep, Some(name))?;
        }
        self.path.pop();

        self.done.insert(name);
        self.order.push(target);
        Ok(())
    }
}
