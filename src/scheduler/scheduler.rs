use std::sync::atomic::{AtomicUsize, Ordering};

use super::types::{SchedulerError, SchedulerResult};
use crate::{node::Node, tasks::types::Task};

/// Placement policy: picks the worker a task should run on.
pub trait Scheduler: Send + Sync {
    /// Nodes with enough free memory and disk for `task`.
    fn select_candidate_nodes<'a>(&self, task: &Task, nodes: &'a [Node]) -> Vec<&'a Node> {
        nodes
            .iter()
            .filter(|node| node.memory_free() >= task.memory && node.disk_free() >= task.disk)
            .collect()
    }

    fn pick(&self, task: &Task, candidates: &[&Node]) -> Option<String>;

    /// Name of the worker `task` should be sent to.
    fn select_worker(&self, task: &Task, nodes: &[Node]) -> SchedulerResult<String> {
        if nodes.is_empty() {
            return Err(SchedulerError::NoWorkersAvailable);
        }

        let candidates = self.select_candidate_nodes(task, nodes);
        if candidates.is_empty() {
            return Err(SchedulerError::NoCapacity(task.id));
        }

        self.pick(task, &candidates)
            .ok_or(SchedulerError::NoWorkersAvailable)
    }
}

/// Hands tasks to candidate workers in turn.
#[derive(Debug, Default)]
pub struct RoundRobin {
    next: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for RoundRobin {
    fn pick(&self, _task: &Task, candidates: &[&Node]) -> Option<String> {
        if candidates.is_empty() {
            return None;
        }
        let turn = self.next.fetch_add(1, Ordering::Relaxed);
        Some(candidates[turn % candidates.len()].name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::types::State;

    fn node(name: &str, memory: u64) -> Node {
        Node {
            name: name.to_string(),
            ip: "127.0.0.1".to_string(),
            cores: 2,
            memory,
            disk: 1 << 30,
            role: "worker".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn rotates_through_workers() {
        let scheduler = RoundRobin::new();
        let nodes = vec![node("a", 1 << 30), node("b", 1 << 30), node("c", 1 << 30)];
        let task = Task::new("t", "alpine", State::Pending);

        let picks: Vec<String> = (0..4)
            .map(|_| scheduler.select_worker(&task, &nodes).unwrap())
            .collect();
        assert_eq!(picks, vec!["a", "b", "c", "a"]);
    }

    #[test]
    fn skips_workers_without_memory() {
        let scheduler = RoundRobin::new();
        let nodes = vec![node("small", 1024), node("big", 1 << 30)];
        let mut task = Task::new("t", "alpine", State::Pending);
        task.memory = 1 << 20;

        assert_eq!(scheduler.select_worker(&task, &nodes).unwrap(), "big");
        assert_eq!(scheduler.select_worker(&task, &nodes).unwrap(), "big");
    }

    #[test]
    fn empty_pool_is_an_error() {
        let scheduler = RoundRobin::new();
        let task = Task::new("t", "alpine", State::Pending);
        assert_eq!(
            scheduler.select_worker(&task, &[]),
            Err(SchedulerError::NoWorkersAvailable)
        );

        let mut hungry = task.clone();
        hungry.memory = u64::MAX;
        assert_eq!(
            scheduler.select_worker(&hungry, &[node("a", 10)]),
            Err(SchedulerError::NoCapacity(hungry.id))
        );
    }
}
