//! Dependency cycle detection over pending tasks.
//!
//! Completed tasks are terminal and never wait on anything, so only edges
//! between pending tasks can form a cycle. Edges point from a dependency to
//! the task that waits on it; dependencies outside the pending set (completed
//! or not yet enqueued) are ignored.

use std::collections::{HashMap, HashSet};

use petgraph::algo::{kosaraju_scc, toposort};
use petgraph::graphmap::DiGraphMap;

use crate::task::Task;

fn build_graph<'a, I>(tasks: I) -> DiGraphMap<&'a str, ()>
where
    I: IntoIterator<Item = &'a Task> + Clone,
{
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    let ids: HashSet<&str> = tasks.clone().into_iter().map(|t| t.id.as_str()).collect();

    for task in tasks.clone() {
        graph.add_node(task.id.as_str());
    }
    for task in tasks {
        for dep in &task.depends_on {
            if ids.contains(dep.as_str()) {
                graph.add_edge(dep.as_str(), task.id.as_str(), ());
            }
        }
    }
    graph
}

/// Find a cycle that `candidate` would close among `pending`.
///
/// Returns the cycle as a path of ids starting and ending at `candidate`
/// (`a -> b -> a` reads "a waits on b, b waits on a").
pub fn cycle_with(pending: &[Task], candidate: &Task) -> Option<Vec<String>> {
    let all: Vec<&Task> = pending
        .iter()
        .filter(|t| t.id != candidate.id)
        .chain(std::iter::once(candidate))
        .collect();
    let graph = build_graph(all.iter().copied());
    if toposort(&graph, None).is_ok() {
        return None;
    }

    // Walk dependency edges from the candidate back to itself.
    let deps_of: HashMap<&str, &Vec<String>> =
        all.iter().map(|t| (t.id.as_str(), &t.depends_on)).collect();
    let mut path = vec![candidate.id.clone()];
    let mut visited = HashSet::new();
    if walk(candidate.id.as_str(), candidate.id.as_str(), &deps_of, &mut visited, &mut path) {
        return Some(path);
    }
    None
}

fn walk<'a>(
    current: &'a str,
    target: &str,
    deps_of: &HashMap<&'a str, &'a Vec<String>>,
    visited: &mut HashSet<&'a str>,
    path: &mut Vec<String>,
) -> bool {
    if !visited.insert(current) {
        return false;
    }
    let Some(&deps) = deps_of.get(current) else {
        return false;
    };
    for dep in deps {
        if dep == target {
            path.push(dep.clone());
            return true;
        }
        if deps_of.contains_key(dep.as_str()) {
            path.push(dep.clone());
            if walk(dep.as_str(), target, deps_of, visited, path) {
                return true;
            }
            path.pop();
        }
    }
    false
}

/// Groups of pending tasks that wait on each other, each sorted by id.
pub fn find_cycles(pending: &[Task]) -> Vec<Vec<String>> {
    let graph = build_graph(pending.iter());
    let mut cycles: Vec<Vec<String>> = kosaraju_scc(&graph)
        .into_iter()
        .filter(|component| {
            component.len() > 1
                || component
                    .first()
                    .map(|id| graph.contains_edge(*id, *id))
                    .unwrap_or(false)
        })
        .map(|component| {
            let mut ids: Vec<String> = component.into_iter().map(str::to_string).collect();
            ids.sort();
            ids
        })
        .collect();
    cycles.sort();
    cycles
}
