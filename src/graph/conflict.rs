//! Resource conflict detection over declared write sets.
//!
//! Read-only tasks are exempt: their `touches` are treated as empty no matter
//! what they declare.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::model::TaskGraph;
use crate::domain::Task;

/// Resources currently held by running tasks
pub type LockSet = BTreeSet<String>;

/// True if the two tasks would write a common resource.
pub fn conflicts(a: &Task, b: &Task) -> bool {
    let held: HashSet<&str> = a.lock_touches().iter().map(String::as_str).collect();
    b.lock_touches().iter().any(|t| held.contains(t.as_str()))
}

/// True if any two members of the set write a common resource.
///
/// A task repeating a resource in its own `touches` does not conflict with itself.
pub fn has_conflict<'a, I>(tasks: I) -> bool
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut seen: HashSet<&str> = HashSet::new();
    for task in tasks {
        let own: HashSet<&str> = task.lock_touches().iter().map(String::as_str).collect();
        if own.iter().any(|t| seen.contains(t)) {
            return true;
        }
        seen.extend(own);
    }
    false
}

/// True if the task needs a resource already in `locks`.
pub fn conflicts_with_locks(task: &Task, locks: &LockSet) -> bool {
    task.lock_touches().iter().any(|t| locks.contains(t))
}

/// Union of the resources locked by the given tasks.
pub fn lock_set<'a, I>(tasks: I) -> LockSet
where
    I: IntoIterator<Item = &'a Task>,
{
    tasks
        .into_iter()
        .flat_map(|t| t.lock_touches().iter().cloned())
        .collect()
}

/// Resources written by more than one task, with the writers in authored order.
/// Those tasks can never run at the same time.
pub fn lock_plan(graph: &TaskGraph) -> BTreeMap<String, Vec<String>> {
    let mut writers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for task in graph.tasks() {
        let own: BTreeSet<&String> = task.lock_touches().iter().collect();
        for touch in own {
            writers.entry(touch.clone()).or_default().push(task.id.clone());
        }
    }
    writers.retain(|_, ids| ids.len() > 1);
    writers
}
