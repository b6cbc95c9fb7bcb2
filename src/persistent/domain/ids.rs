//! Identifier and validated scalar types for the persistent task domain.

use super::TaskDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Coordinator-assigned identifier of a logical persistent task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersistentTaskId(i64);

impl PersistentTaskId {
    /// Wraps a coordinator task identifier.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the underlying numeric value.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for PersistentTaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one assignment of a persistent task to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllocationId(i64);

impl AllocationId {
    /// Wraps a coordinator allocation identifier.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the underlying numeric value.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for AllocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one allocated instance of a persistent task.
///
/// Two keys with the same task id but different allocation ids name
/// different instances. Local bookkeeping is always keyed by the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskKey {
    id: PersistentTaskId,
    allocation_id: AllocationId,
}

impl TaskKey {
    /// Creates a key from its two components.
    #[must_use]
    pub const fn new(id: PersistentTaskId, allocation_id: AllocationId) -> Self {
        Self { id, allocation_id }
    }

    /// Creates a key from raw coordinator values.
    #[must_use]
    pub const fn from_parts(id: i64, allocation_id: i64) -> Self {
        Self::new(PersistentTaskId::new(id), AllocationId::new(allocation_id))
    }

    /// Returns the persistent task id.
    #[must_use]
    pub const fn id(self) -> PersistentTaskId {
        self.id
    }

    /// Returns the allocation id.
    #[must_use]
    pub const fn allocation_id(self) -> AllocationId {
        self.allocation_id
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.allocation_id)
    }
}

/// Cluster-wide identity of a node.
///
/// Deserialization applies the same validation as [`NodeId::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    /// Creates a validated node identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyNodeId`] when the value is empty after
    /// trimming.
    pub fn new(value: impl Into<String>) -> Result<Self, TaskDomainError> {
        let raw = value.into();
        let normalized = raw.trim();
        if normalized.is_empty() {
            return Err(TaskDomainError::EmptyNodeId);
        }
        Ok(Self(normalized.to_owned()))
    }

    /// Returns the node id as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NodeId {
    type Error = TaskDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NodeId> for String {
    fn from(value: NodeId) -> Self {
        value.0
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Node-local identifier of a registered task, used by operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalTaskId(Uuid);

impl LocalTaskId {
    /// Creates a new random local task identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for LocalTaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LocalTaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
