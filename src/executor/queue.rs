//! Backlog of admitted tasks and the registry of tasks bound to workers.

use super::task::{Pending, Task};
use super::worker::WorkerId;
use crate::protocol::TaskId;
use std::collections::{HashMap, VecDeque};

/// FIFO backlog. No priorities, no reordering.
#[derive(Debug, Default)]
pub(crate) struct TaskQueue {
    tasks: VecDeque<Task>,
}

impl TaskQueue {
    pub fn push(&mut self, task: Task) {
        self.tasks.push_back(task);
    }

    pub fn pop(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Task> + '_ {
        self.tasks.drain(..)
    }
}

/// Two-way mapping between running tasks and the workers executing them.
#[derive(Debug, Default)]
pub(crate) struct ActiveTasks {
    tasks: HashMap<TaskId, Pending>,
    by_worker: HashMap<WorkerId, TaskId>,
}

impl ActiveTasks {
    pub fn bind(&mut self, id: TaskId, pending: Pending) {
        debug_assert!(
            !self.by_worker.contains_key(&pending.worker),
            "worker already bound to a task"
        );
        self.by_worker.insert(pending.worker, id.clone());
        self.tasks.insert(id, pending);
    }

    /// Unbind `id`, but only if `worker` is the one executing it.
    pub fn take_if_bound(&mut self, id: &TaskId, worker: WorkerId) -> Option<Pending> {
        match self.tasks.get(id) {
            Some(pending) if pending.worker == worker => {}
            _ => return None,
        }
        self.by_worker.remove(&worker);
        self.tasks.remove(id)
    }

    pub fn take_for_worker(&mut self, worker: WorkerId) -> Option<(TaskId, Pending)> {
        let id = self.by_worker.remove(&worker)?;
        let pending = self.tasks.remove(&id)?;
        Some((id, pending))
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = (TaskId, Pending)> + '_ {
        self.by_worker.clear();
        self.tasks.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn task(kind: &str) -> Task {
        Task::new(kind.to_string(), Value::Null, Vec::new()).0
    }

    #[test]
    fn test_queue_is_fifo() {
        let mut queue = TaskQueue::default();
        queue.push(task("a"));
        queue.push(task("b"));
        queue.push(task("c"));

        let order: Vec<String> = std::iter::from_fn(|| queue.pop()).map(|t| t.kind).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_bind_and_take() {
        let mut active = ActiveTasks::default();
        let worker = WorkerId::new(7);
        let t = task("a");
        let id = t.id.clone();
        let (_, pending) = t.dispatch(worker);

        active.bind(id.clone(), pending);
        assert_eq!(active.len(), 1);

        assert!(active.take_if_bound(&id, WorkerId::new(8)).is_none());
        assert_eq!(active.len(), 1);

        assert!(active.take_if_bound(&id, worker).is_some());
        assert_eq!(active.len(), 0);
        assert!(active.take_for_worker(worker).is_none());
    }

    #[test]
    fn test_take_for_worker() {
        let mut active = ActiveTasks::default();
        let worker = WorkerId::new(3);
        let t = task("a");
        let id = t.id.clone();
        active.bind(id.clone(), t.dispatch(worker).1);

        let (taken, _) = active.take_for_worker(worker).unwrap();
        assert_eq!(taken, id);
        assert!(active.take_for_worker(worker).is_none());
    }

    #[test]
    fn test_unknown_ids_ignored() {
        let mut active = ActiveTasks::default();
        assert!(active
            .take_if_bound(&TaskId::from("missing"), WorkerId::new(0))
            .is_none());
        assert!(active.take_for_worker(WorkerId::new(0)).is_none());
    }
}
