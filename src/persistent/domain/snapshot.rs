//! Coordinator-side view of persistent tasks as delivered to a node.

use super::{AllocationId, NodeId, PersistentTaskId, TaskDomainError, TaskKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Opaque task parameters handed to the business logic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskRequest(Value);

impl TaskRequest {
    /// Wraps a JSON request payload.
    #[must_use]
    pub const fn new(value: Value) -> Self {
        Self(value)
    }

    /// Returns the payload.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consumes the request and returns the payload.
    #[must_use]
    pub fn into_inner(self) -> Value {
        self.0
    }
}

/// One persistent task as recorded by the coordinator.
///
/// Deserialization applies the same validation as [`TaskDescriptor::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTaskDescriptor")]
pub struct TaskDescriptor {
    id: PersistentTaskId,
    allocation_id: AllocationId,
    task_name: String,
    request: TaskRequest,
    executor_node: Option<NodeId>,
}

#[derive(Deserialize)]
struct RawTaskDescriptor {
    id: PersistentTaskId,
    allocation_id: AllocationId,
    task_name: String,
    request: TaskRequest,
    executor_node: Option<NodeId>,
}

impl TryFrom<RawTaskDescriptor> for TaskDescriptor {
    type Error = TaskDomainError;

    fn try_from(raw: RawTaskDescriptor) -> Result<Self, Self::Error> {
        let descriptor =
            Self::new(TaskKey::new(raw.id, raw.allocation_id), raw.task_name, raw.request)?;
        Ok(Self {
            executor_node: raw.executor_node,
            ..descriptor
        })
    }
}

impl TaskDescriptor {
    /// Creates a descriptor for an allocation that has no executor node yet.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyTaskName`] when the task name is empty
    /// after trimming.
    pub fn new(
        key: TaskKey,
        task_name: impl Into<String>,
        request: TaskRequest,
    ) -> Result<Self, TaskDomainError> {
        let raw = task_name.into();
        let normalized = raw.trim();
        if normalized.is_empty() {
            return Err(TaskDomainError::EmptyTaskName);
        }
        Ok(Self {
            id: key.id(),
            allocation_id: key.allocation_id(),
            task_name: normalized.to_owned(),
            request,
            executor_node: None,
        })
    }

    /// Assigns the allocation to an executor node.
    #[must_use]
    pub fn assigned_to(mut self, node: NodeId) -> Self {
        self.executor_node = Some(node);
        self
    }

    /// Moves the task to a fresh allocation on `node`.
    #[must_use]
    pub fn reallocated(mut self, allocation_id: AllocationId, node: NodeId) -> Self {
        self.allocation_id = allocation_id;
        self.executor_node = Some(node);
        self
    }

    /// Returns the persistent task id.
    #[must_use]
    pub const fn id(&self) -> PersistentTaskId {
        self.id
    }

    /// Returns the allocation id.
    #[must_use]
    pub const fn allocation_id(&self) -> AllocationId {
        self.allocation_id
    }

    /// Returns the identity of this allocation.
    #[must_use]
    pub const fn key(&self) -> TaskKey {
        TaskKey::new(self.id, self.allocation_id)
    }

    /// Returns the name used to resolve the task executor.
    #[must_use]
    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    /// Returns the task parameters.
    #[must_use]
    pub const fn request(&self) -> &TaskRequest {
        &self.request
    }

    /// Returns the node the coordinator assigned this allocation to.
    #[must_use]
    pub const fn executor_node(&self) -> Option<&NodeId> {
        self.executor_node.as_ref()
    }

    /// Returns whether this allocation is assigned to `node`.
    #[must_use]
    pub fn is_assigned_to(&self, node: &NodeId) -> bool {
        self.executor_node.as_ref() == Some(node)
    }
}

/// Snapshot of every persistent task known to the coordinator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistentTasks {
    tasks: BTreeMap<PersistentTaskId, TaskDescriptor>,
}

impl PersistentTasks {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a task, keyed by its persistent task id.
    #[must_use]
    pub fn with_task(mut self, descriptor: TaskDescriptor) -> Self {
        self.tasks.insert(descriptor.id(), descriptor);
        self
    }

    /// Returns the descriptor recorded for a task id.
    #[must_use]
    pub fn get(&self, id: PersistentTaskId) -> Option<&TaskDescriptor> {
        self.tasks.get(&id)
    }

    /// Iterates over all recorded descriptors in task id order.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskDescriptor> {
        self.tasks.values()
    }

    /// Returns the number of recorded tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns whether the snapshot holds no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl FromIterator<TaskDescriptor> for PersistentTasks {
    fn from_iter<I: IntoIterator<Item = TaskDescriptor>>(iter: I) -> Self {
        Self {
            tasks: iter
                .into_iter()
                .map(|descriptor| (descriptor.id(), descriptor))
                .collect(),
        }
    }
}

/// Coordinator state change as observed by one node.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterChangedEvent {
    previous: Option<PersistentTasks>,
    current: Option<PersistentTasks>,
    local_node_id: NodeId,
    nodes_changed: bool,
}

impl ClusterChangedEvent {
    /// Creates an event for the transition `previous -> current`.
    #[must_use]
    pub const fn new(
        previous: Option<PersistentTasks>,
        current: Option<PersistentTasks>,
        local_node_id: NodeId,
    ) -> Self {
        Self {
            previous,
            current,
            local_node_id,
            nodes_changed: false,
        }
    }

    /// Marks the event as carrying a node membership change.
    #[must_use]
    pub const fn with_nodes_changed(mut self, nodes_changed: bool) -> Self {
        self.nodes_changed = nodes_changed;
        self
    }

    /// Returns the snapshot before the change.
    #[must_use]
    pub const fn previous(&self) -> Option<&PersistentTasks> {
        self.previous.as_ref()
    }

    /// Returns the snapshot after the change.
    #[must_use]
    pub const fn current(&self) -> Option<&PersistentTasks> {
        self.current.as_ref()
    }

    /// Returns the identity of the receiving node.
    #[must_use]
    pub const fn local_node_id(&self) -> &NodeId {
        &self.local_node_id
    }

    /// Returns whether node membership changed.
    #[must_use]
    pub const fn nodes_changed(&self) -> bool {
        self.nodes_changed
    }

    /// Returns whether the event can affect local task bookkeeping.
    #[must_use]
    pub fn tasks_or_nodes_changed(&self) -> bool {
        self.nodes_changed || self.previous != self.current
    }
}
