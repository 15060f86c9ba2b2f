//! Critical path analysis.
//!
//! For each task, the longest effort-weighted chain of dependencies ending at
//! it (memoized). The global critical path is the longest of those.
//!
//! Ties keep the first path found: dependencies are compared in declared
//! order and tasks in authored order, and a later candidate replaces the
//! current best only if strictly longer.

use std::collections::{HashMap, HashSet};

use super::model::TaskGraph;

/// The winning dependency chain, ordered from first to last task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CriticalPath {
    pub tasks: Vec<String>,
    pub total_minutes: u64,
}

/// Longest path per task plus the global critical path
#[derive(Debug, Clone, Default)]
pub struct PathAnalysis {
    per_task: HashMap<String, CriticalPath>,
    pub critical: CriticalPath,
}

impl PathAnalysis {
    /// Longest chain ending at `task_id`.
    pub fn path_to(&self, task_id: &str) -> Option<&CriticalPath> {
        self.per_task.get(task_id)
    }
}

/// Compute longest paths without touching the graph.
pub fn analyze(graph: &TaskGraph) -> PathAnalysis {
    let mut memo: HashMap<String, CriticalPath> = HashMap::new();
    let mut visiting: HashSet<String> = HashSet::new();
    let mut critical = CriticalPath::default();

    for task in graph.tasks() {
        let path = longest_to(graph, &task.id, &mut memo, &mut visiting);
        if critical.tasks.is_empty() || path.total_minutes > critical.total_minutes {
            critical = path;
        }
    }

    PathAnalysis { per_task: memo, critical }
}

/// Compute the critical path and flag its tasks on the graph.
pub fn mark_critical_path(graph: &mut TaskGraph) -> CriticalPath {
    let critical = analyze(graph).critical;
    graph.mark_critical_path(&critical.tasks);
    log::debug!(
        "Critical path: {} ({} min)",
        critical.tasks.join(" -> "),
        critical.total_minutes
    );
    critical
}

fn longest_to(
    graph: &TaskGraph,
    id: &str,
    memo: &mut HashMap<String, CriticalPath>,
    visiting: &mut HashSet<String>,
) -> CriticalPath {
    if let Some(done) = memo.get(id) {
        return done.clone();
    }
    let Some(task) = graph.get(id) else {
        return CriticalPath::default();
    };

    visiting.insert(id.to_string());
    let mut best = CriticalPath::default();
    for dep in &task.depends_on {
        // Unknown ids contribute nothing; an edge back onto the stack would be a
        // cycle, which validation rejects, so it is skipped here.
        if !graph.contains(dep) || visiting.contains(dep) {
            continue;
        }
        let sub = longest_to(graph, dep, memo, visiting);
        if sub.total_minutes > best.total_minutes {
            best = sub;
        }
    }
    visiting.remove(id);

    best.tasks.push(id.to_string());
    best.total_minutes += task.duration_minutes() as u64;
    memo.insert(id.to_string(), best.clone());
    best
}
