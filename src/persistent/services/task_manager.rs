//! Node-local task bookkeeping used for registration and operator listing.

use crate::persistent::domain::{
    AllocatedTask, DEFAULT_CANCEL_REASON, LocalTaskId, Status, TaskKey,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors returned by the local task manager.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskManagerError {
    /// No task is registered under this id.
    #[error("local task {0} not found")]
    NotFound(LocalTaskId),
}

/// Serializable description of a registered task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    /// Node-local task id.
    pub local_id: LocalTaskId,
    /// Local task type.
    pub task_type: String,
    /// Local action name.
    pub action: String,
    /// Allocation identity.
    pub key: TaskKey,
    /// Registration timestamp.
    pub started_at: DateTime<Utc>,
    /// Whether cancellation has been requested.
    pub cancelled: bool,
    /// Reason given with the cancellation request.
    pub reason_cancelled: Option<String>,
    /// Current lifecycle status.
    pub status: Status,
}

impl From<&AllocatedTask> for TaskInfo {
    fn from(task: &AllocatedTask) -> Self {
        Self {
            local_id: task.local_id(),
            task_type: task.task_type().to_owned(),
            action: task.action().to_owned(),
            key: task.key(),
            started_at: task.started_at(),
            cancelled: task.is_cancelled(),
            reason_cancelled: task.reason_cancelled().map(str::to_owned),
            status: task.status(),
        }
    }
}

/// Registers allocated tasks so operators can list and cancel them.
#[derive(Debug)]
pub struct LocalTaskManager<K>
where
    K: Clock + Send + Sync,
{
    clock: Arc<K>,
    tasks: RwLock<HashMap<LocalTaskId, Arc<AllocatedTask>>>,
}

impl<K> LocalTaskManager<K>
where
    K: Clock + Send + Sync,
{
    /// Creates an empty task manager.
    #[must_use]
    pub fn new(clock: Arc<K>) -> Self {
        Self {
            clock,
            tasks: RwLock::new(HashMap::new()),
        }
    }

    /// Creates and registers a task for the allocation `key`.
    #[must_use]
    pub fn register(
        &self,
        key: TaskKey,
        task_type: impl Into<String>,
        action: impl Into<String>,
    ) -> Arc<AllocatedTask> {
        let task = Arc::new(AllocatedTask::new(
            key,
            task_type,
            action,
            self.clock.utc(),
        ));
        self.tasks.write().insert(task.local_id(), Arc::clone(&task));
        tracing::trace!(
            local_id = %task.local_id(),
            task = %key,
            action = task.action(),
            "registered local task"
        );
        task
    }

    /// Unregisters a task. Unknown tasks are ignored.
    pub fn unregister(&self, task: &AllocatedTask) {
        if self.tasks.write().remove(&task.local_id()).is_some() {
            tracing::trace!(
                local_id = %task.local_id(),
                task = %task.key(),
                state = %task.state(),
                "unregistered local task"
            );
        }
    }

    /// Returns whether a task is registered.
    #[must_use]
    pub fn contains(&self, local_id: LocalTaskId) -> bool {
        self.tasks.read().contains_key(&local_id)
    }

    /// Returns the registered task with this id.
    #[must_use]
    pub fn get(&self, local_id: LocalTaskId) -> Option<TaskInfo> {
        self.tasks
            .read()
            .get(&local_id)
            .map(|task| TaskInfo::from(task.as_ref()))
    }

    /// Lists every registered task, oldest first.
    #[must_use]
    pub fn list(&self) -> Vec<TaskInfo> {
        let mut infos: Vec<TaskInfo> = self
            .tasks
            .read()
            .values()
            .map(|task| TaskInfo::from(task.as_ref()))
            .collect();
        infos.sort_by(|left, right| {
            left.started_at
                .cmp(&right.started_at)
                .then_with(|| left.key.cmp(&right.key))
        });
        infos
    }

    /// Returns the number of registered tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    /// Returns whether no task is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }

    /// Requests cooperative cancellation of a registered task.
    ///
    /// Uses [`DEFAULT_CANCEL_REASON`] when `reason` is `None`. Returns
    /// `Ok(false)` when the task was already cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`TaskManagerError::NotFound`] when no task has this id.
    pub fn cancel(
        &self,
        local_id: LocalTaskId,
        reason: Option<&str>,
    ) -> Result<bool, TaskManagerError> {
        let task = self
            .tasks
            .read()
            .get(&local_id)
            .cloned()
            .ok_or(TaskManagerError::NotFound(local_id))?;
        let effective_reason = reason.unwrap_or(DEFAULT_CANCEL_REASON);
        let accepted = task.cancel(effective_reason);
        tracing::debug!(
            local_id = %local_id,
            task = %task.key(),
            reason = effective_reason,
            accepted,
            "cancellation requested"
        );
        Ok(accepted)
    }
}
