//! In-memory task graph.
//!
//! Tasks keep their authored order; every order-sensitive algorithm (wave
//! packing, critical path tie-breaks, priority ties) relies on it.

use std::collections::{HashMap, HashSet};

use crate::domain::Task;

/// Task id -> ids of tasks that directly depend on it
pub type Dependents = HashMap<String, Vec<String>>;

#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    tasks: Vec<Task>,
    index: HashMap<String, usize>,
    /// Ids seen more than once during construction; later copies are dropped
    duplicates: Vec<String>,
}

impl TaskGraph {
    /// Build a graph from authored tasks. The first task with a given id wins.
    pub fn new(tasks: Vec<Task>) -> Self {
        let mut graph = Self::default();
        for task in tasks {
            if graph.index.contains_key(&task.id) {
                log::warn!("Dropping duplicate task id {}", task.id);
                graph.duplicates.push(task.id);
                continue;
            }
            graph.index.insert(task.id.clone(), graph.tasks.len());
            graph.tasks.push(task);
        }
        graph
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.index.get(id).map(|&i| &self.tasks[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|t| t.id.as_str())
    }

    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    /// Reverse adjacency over known ids. Every task has an entry.
    pub fn dependents(&self) -> Dependents {
        let mut map: Dependents = self.tasks.iter().map(|t| (t.id.clone(), Vec::new())).collect();
        for task in &self.tasks {
            for dep in &task.depends_on {
                if let Some(children) = map.get_mut(dep)
                    && !children.contains(&task.id)
                {
                    children.push(task.id.clone());
                }
            }
        }
        map
    }

    /// `(task, missing dependency)` pairs, in authored order.
    pub fn dangling_dependencies(&self) -> Vec<(String, String)> {
        self.tasks
            .iter()
            .flat_map(|t| {
                t.depends_on
                    .iter()
                    .filter(|dep| !self.contains(dep))
                    .map(move |dep| (t.id.clone(), dep.clone()))
            })
            .collect()
    }

    /// True when every dependency is completed. A dependency on an id outside
    /// the graph counts as satisfied so partial plans stay schedulable.
    pub fn deps_satisfied(&self, task: &Task, completed: &HashSet<&str>) -> bool {
        task.depends_on
            .iter()
            .all(|dep| completed.contains(dep.as_str()) || !self.contains(dep))
    }

    /// Tasks not completed or running whose dependencies are satisfied, in
    /// authored order.
    pub fn ready_tasks(&self, completed: &HashSet<&str>, running: &HashSet<&str>) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| !completed.contains(t.id.as_str()) && !running.contains(t.id.as_str()))
            .filter(|t| self.deps_satisfied(t, completed))
            .collect()
    }

    /// Set `is_on_critical_path` for exactly the given ids.
    pub fn mark_critical_path(&mut self, path: &[String]) {
        let on_path: HashSet<&str> = path.iter().map(String::as_str).collect();
        for task in &mut self.tasks {
            task.is_on_critical_path = on_path.contains(task.id.as_str());
        }
    }

    /// Sum of every task's duration.
    pub fn serial_minutes(&self) -> u64 {
        self.tasks.iter().map(|t| t.duration_minutes() as u64).sum()
    }
}
