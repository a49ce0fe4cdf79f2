// src/transaction/closure.rs

//! Reverse-dependency closure of a package being removed

use crate::error::{Error, Result};
use std::collections::HashSet;

struct Frame {
    name: String,
    dependents: Vec<String>,
    next: usize,
}

/// Order in which `root` and everything depending on it must be removed
///
/// Dependents come before their dependencies: the deepest dependents first,
/// `root` last. Each package appears once even when reachable over several
/// paths. `dependents_of` is queried once per visited package.
///
/// Walks with an explicit stack. Reaching a package that is still on the
/// current path fails with `Error::DependencyCycle`.
pub fn removal_order<F>(root: &str, mut dependents_of: F) -> Result<Vec<String>>
where
    F: FnMut(&str) -> Result<Vec<String>>,
{
    let mut order = Vec::new();
    let mut done: HashSet<String> = HashSet::new();
    let mut on_path: HashSet<String> = HashSet::new();

    on_path.insert(root.to_string());
    let mut stack = vec![Frame {
        name: root.to_string(),
        dependents: dependents_of(root)?,
        next: 0,
    }];

    while let Some(top) = stack.last_mut() {
        if top.next < top.dependents.len() {
            let child = top.dependents[top.next].clone();
            top.next += 1;

            if done.contains(&child) {
                continue;
            }
            if on_path.contains(&child) {
                let mut cycle: Vec<String> = stack.iter().map(|f| f.name.clone()).collect();
                let start = cycle.iter().position(|n| *n == child).unwrap_or(0);
                cycle.drain(..start);
                cycle.push(child);
                return Err(Error::DependencyCycle(cycle));
            }

            let dependents = dependents_of(&child)?;
            on_path.insert(child.clone());
            stack.push(Frame {
                name: child,
                dependents,
                next: 0,
            });
        } else if let Some(frame) = stack.pop() {
            on_path.remove(&frame.name);
            done.insert(frame.name.clone());
            order.push(frame.name);
        }
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn graph(edges: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
        edges
            .iter()
            .map(|(name, deps)| {
                (
                    name.to_string(),
                    deps.iter().map(|d| d.to_string()).collect(),
                )
            })
            .collect()
    }

    fn order(graph: &HashMap<String, Vec<String>>, root: &str) -> Result<Vec<String>> {
        removal_order(root, |name| Ok(graph.get(name).cloned().unwrap_or_default()))
    }

    #[test]
    fn test_single_package() {
        let g = graph(&[]);
        assert_eq!(order(&g, "a").unwrap(), vec!["a"]);
    }

    #[test]
    fn test_dependent_before_dependency() {
        // b depends on a
        let g = graph(&[("a", &["b"])]);
        assert_eq!(order(&g, "a").unwrap(), vec!["b", "a"]);
    }

    #[test]
    fn test_leaves_first() {
        // c depends on b, b depends on a, d depends on a
        let g = graph(&[("a", &["b", "d"]), ("b", &["c"])]);
        assert_eq!(order(&g, "a").unwrap(), vec!["c", "b", "d", "a"]);
    }

    #[test]
    fn test_diamond_visits_once() {
        // b and c depend on a, d depends on both
        let g = graph(&[("a", &["b", "c"]), ("b", &["d"]), ("c", &["d"])]);
        let result = order(&g, "a").unwrap();
        assert_eq!(result, vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn test_cycle_is_reported() {
        let g = graph(&[("a", &["b"]), ("b", &["c"]), ("c", &["b"])]);
        match order(&g, "a") {
            Err(Error::DependencyCycle(path)) => assert_eq!(path, vec!["b", "c", "b"]),
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_lookup_error_propagates() {
        let result = removal_order("a", |_| Err(Error::NotFoundError("a".into())));
        assert!(matches!(result, Err(Error::NotFoundError(_))));
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        let mut g = HashMap::new();
        for i in 0..10_000 {
            g.insert(format!("p{}", i), vec![format!("p{}", i + 1)]);
        }
        let result = order(&g, "p0").unwrap();
        assert_eq!(result.len(), 10_001);
        assert_eq!(result.first().map(String::as_str), Some("p10000"));
        assert_eq!(result.last().map(String::as_str), Some("p0"));
    }
}
