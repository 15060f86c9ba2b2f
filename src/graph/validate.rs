//! Graph validation: cycles, unknown dependencies, duplicate ids.
//!
//! Cycle detection is a depth-first traversal over `depends_on` edges that
//! tracks the current recursion stack; an edge into a node still on the stack
//! closes a cycle. The traversal uses an explicit stack so deep plans cannot
//! overflow the call stack.

use std::collections::{HashMap, VecDeque};

use super::model::{Dependents, TaskGraph};
use crate::error::{DispatchError, Result, ValidationIssue};

/// How to treat a dependency on an id outside the task set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DanglingPolicy {
    /// Report as a validation error
    #[default]
    Reject,
    /// Report as a warning; schedulers treat the dependency as satisfied
    Allow,
}

/// Successful validation result
#[derive(Debug, Clone)]
pub struct ValidatedGraph {
    pub dependents: Dependents,
    /// Dangling dependencies tolerated under [`DanglingPolicy::Allow`]
    pub warnings: Vec<ValidationIssue>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Every cycle closed by a back edge, as `[start, .., start]` id paths.
pub fn find_cycles(graph: &TaskGraph) -> Vec<Vec<String>> {
    let tasks = graph.tasks();
    let index: HashMap<&str, usize> = tasks.iter().enumerate().map(|(i, t)| (t.id.as_str(), i)).collect();
    let mut marks = vec![Mark::Unvisited; tasks.len()];
    let mut cycles = Vec::new();

    for root in 0..tasks.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }

        // (node, next dependency position)
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        marks[root] = Mark::OnStack;

        while let Some(top) = stack.last_mut() {
            let (node, pos) = *top;
            let deps = &tasks[node].depends_on;
            if pos >= deps.len() {
                marks[node] = Mark::Done;
                stack.pop();
                continue;
            }
            top.1 += 1;
            let dep = &deps[pos];

            let Some(&next) = index.get(dep.as_str()) else {
                continue;
            };
            match marks[next] {
                Mark::Unvisited => {
                    marks[next] = Mark::OnStack;
                    stack.push((next, 0));
                }
                Mark::OnStack => {
                    let start = stack.iter().position(|&(n, _)| n == next).unwrap_or(0);
                    let mut path: Vec<String> = stack[start..].iter().map(|&(n, _)| tasks[n].id.clone()).collect();
                    path.push(tasks[next].id.clone());
                    cycles.push(path);
                }
                Mark::Done => {}
            }
        }
    }

    cycles
}

/// Validate the graph for a planning pass.
///
/// Returns every issue found, not just the first. On success the reverse
/// adjacency map is returned for callers that need dependents.
pub fn validate_graph(graph: &TaskGraph, policy: DanglingPolicy) -> Result<ValidatedGraph> {
    let mut errors: Vec<ValidationIssue> = graph
        .duplicates()
        .iter()
        .map(|id| ValidationIssue::DuplicateId(id.clone()))
        .collect();
    let mut warnings = Vec::new();

    for (task, dependency) in graph.dangling_dependencies() {
        let issue = ValidationIssue::UnknownDependency { task, dependency };
        match policy {
            DanglingPolicy::Reject => errors.push(issue),
            DanglingPolicy::Allow => {
                log::warn!("{} (treated as satisfied)", issue);
                warnings.push(issue);
            }
        }
    }

    errors.extend(find_cycles(graph).into_iter().map(|path| ValidationIssue::Cycle { path }));

    if !errors.is_empty() {
        return Err(DispatchError::Validation(errors));
    }

    Ok(ValidatedGraph {
        dependents: graph.dependents(),
        warnings,
    })
}

/// Dependency-respecting order (Kahn's algorithm, ties in authored order).
///
/// Returns `None` if the graph has a cycle. Dangling dependencies are ignored.
pub fn topological_order(graph: &TaskGraph) -> Option<Vec<String>> {
    let dependents = graph.dependents();
    let mut in_degree: HashMap<&str, usize> = graph
        .tasks()
        .iter()
        .map(|t| {
            let known = t.depends_on.iter().filter(|d| graph.contains(d)).count();
            (t.id.as_str(), known)
        })
        .collect();

    let mut queue: VecDeque<&str> = graph.ids().filter(|id| in_degree[id] == 0).collect();
    let mut order = Vec::with_capacity(graph.len());

    while let Some(id) = queue.pop_front() {
        order.push(id.to_string());
        for child in &dependents[id] {
            if let Some(degree) = in_degree.get_mut(child.as_str()) {
                // duplicate edges are collapsed in `dependents`, count them once here too
                let edges = graph
                    .get(child)
                    .map(|t| t.depends_on.iter().filter(|d| d.as_str() == id).count())
                    .unwrap_or(1);
                *degree = degree.saturating_sub(edges);
                if *degree == 0 {
                    queue.push_back(child.as_str());
                }
            }
        }
    }

    (order.len() == graph.len()).then_some(order)
}
