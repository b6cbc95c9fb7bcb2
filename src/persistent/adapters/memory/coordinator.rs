//! In-memory coordinator for agent tests and local runs.

use crate::persistent::{
    domain::{
        AllocationId, LocalTaskId, NodeId, PersistentTaskId, PersistentTasks, TaskDescriptor,
        TaskFailure, TaskKey, TaskRequest,
    },
    ports::{CoordinatorClient, CoordinatorError, CoordinatorResult},
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Completion report accepted by the in-memory coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRecord {
    /// Allocation that reported.
    pub key: TaskKey,
    /// Failure carried by the report.
    pub failure: Option<TaskFailure>,
}

/// Thread-safe coordinator that keeps the task record in memory.
///
/// Completion of the current allocation removes the task, which is how
/// the coordinator acknowledges a report.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCoordinator {
    state: Arc<RwLock<CoordinatorState>>,
}

#[derive(Debug, Default)]
struct CoordinatorState {
    tasks: BTreeMap<PersistentTaskId, TaskDescriptor>,
    last_task_id: i64,
    last_allocation_id: i64,
    failing_notifications: usize,
    completions: Vec<CompletionRecord>,
    cancellations: Vec<LocalTaskId>,
}

impl CoordinatorState {
    fn next_allocation(&mut self) -> AllocationId {
        self.last_allocation_id += 1;
        AllocationId::new(self.last_allocation_id)
    }
}

fn lock_error(err: &impl std::fmt::Display) -> CoordinatorError {
    CoordinatorError::transport(std::io::Error::other(err.to_string()))
}

impl InMemoryCoordinator {
    /// Creates an empty coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new task assigned to `node`.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Transport`] for an empty task name or
    /// when lock acquisition fails.
    pub fn create_task(
        &self,
        task_name: &str,
        request: TaskRequest,
        node: NodeId,
    ) -> CoordinatorResult<TaskKey> {
        let mut state = self.state.write().map_err(|err| lock_error(&err))?;
        state.last_task_id += 1;
        let id = PersistentTaskId::new(state.last_task_id);
        let key = TaskKey::new(id, state.next_allocation());
        let descriptor = TaskDescriptor::new(key, task_name, request)
            .map_err(CoordinatorError::transport)?
            .assigned_to(node);
        state.tasks.insert(id, descriptor);
        Ok(key)
    }

    /// Moves a task to a fresh allocation on `node`.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::TaskNotFound`] for unknown tasks.
    pub fn reassign(&self, id: PersistentTaskId, node: NodeId) -> CoordinatorResult<TaskKey> {
        let mut state = self.state.write().map_err(|err| lock_error(&err))?;
        let descriptor = state
            .tasks
            .remove(&id)
            .ok_or(CoordinatorError::TaskNotFound(id))?;
        let allocation_id = state.next_allocation();
        let moved = descriptor.reallocated(allocation_id, node);
        let key = moved.key();
        state.tasks.insert(id, moved);
        Ok(key)
    }

    /// Drops a task from the record.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::TaskNotFound`] for unknown tasks.
    pub fn remove_task(&self, id: PersistentTaskId) -> CoordinatorResult<TaskDescriptor> {
        let mut state = self.state.write().map_err(|err| lock_error(&err))?;
        state
            .tasks
            .remove(&id)
            .ok_or(CoordinatorError::TaskNotFound(id))
    }

    /// Returns the current task record.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Transport`] when lock acquisition fails.
    pub fn snapshot(&self) -> CoordinatorResult<PersistentTasks> {
        let state = self.state.read().map_err(|err| lock_error(&err))?;
        Ok(state.tasks.values().cloned().collect())
    }

    /// Makes the next `count` completion reports fail in transport.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Transport`] when lock acquisition fails.
    pub fn fail_next_notifications(&self, count: usize) -> CoordinatorResult<()> {
        let mut state = self.state.write().map_err(|err| lock_error(&err))?;
        state.failing_notifications = count;
        Ok(())
    }

    /// Returns every accepted completion report, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Transport`] when lock acquisition fails.
    pub fn completions(&self) -> CoordinatorResult<Vec<CompletionRecord>> {
        let state = self.state.read().map_err(|err| lock_error(&err))?;
        Ok(state.completions.clone())
    }

    /// Returns every local task cancellation received, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Transport`] when lock acquisition fails.
    pub fn cancellations(&self) -> CoordinatorResult<Vec<LocalTaskId>> {
        let state = self.state.read().map_err(|err| lock_error(&err))?;
        Ok(state.cancellations.clone())
    }
}

#[async_trait]
impl CoordinatorClient for InMemoryCoordinator {
    async fn send_completion_notification(
        &self,
        key: TaskKey,
        failure: Option<TaskFailure>,
    ) -> CoordinatorResult<PersistentTaskId> {
        let mut state = self.state.write().map_err(|err| lock_error(&err))?;
        if state.failing_notifications > 0 {
            state.failing_notifications -= 1;
            return Err(CoordinatorError::transport(std::io::Error::other(
                "injected notification failure",
            )));
        }

        let current = state
            .tasks
            .get(&key.id())
            .map(TaskDescriptor::allocation_id)
            .ok_or(CoordinatorError::TaskNotFound(key.id()))?;
        if current != key.allocation_id() {
            return Err(CoordinatorError::AllocationMismatch { key, current });
        }

        state.tasks.remove(&key.id());
        state.completions.push(CompletionRecord { key, failure });
        Ok(key.id())
    }

    async fn send_cancellation(&self, local_id: LocalTaskId) -> CoordinatorResult<LocalTaskId> {
        let mut state = self.state.write().map_err(|err| lock_error(&err))?;
        state.cancellations.push(local_id);
        Ok(local_id)
    }
}
