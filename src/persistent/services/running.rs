//! Registry of allocations the agent currently tracks on this node.

use crate::persistent::domain::{AllocatedTask, TaskKey};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

/// Errors returned by the local task registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The key is already tracked.
    #[error("persistent task {0} is already tracked on this node")]
    AlreadyTracked(TaskKey),
}

/// Map from allocation key to the locally running task.
///
/// Only the reconciliation pass inserts and removes entries. Notification
/// callbacks read it to learn whether a key is still tracked.
#[derive(Debug, Default)]
pub struct LocalTaskRegistry {
    tasks: RwLock<HashMap<TaskKey, Arc<AllocatedTask>>>,
}

impl LocalTaskRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `task` under its key.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyTracked`] when the key is present; the
    /// existing entry is left in place.
    pub fn insert(&self, task: Arc<AllocatedTask>) -> Result<(), RegistryError> {
        let key = task.key();
        let mut tasks = self.tasks.write();
        if tasks.contains_key(&key) {
            return Err(RegistryError::AlreadyTracked(key));
        }
        tasks.insert(key, task);
        Ok(())
    }

    /// Returns the task tracked under `key`.
    #[must_use]
    pub fn get(&self, key: TaskKey) -> Option<Arc<AllocatedTask>> {
        self.tasks.read().get(&key).cloned()
    }

    /// Stops tracking `key`, returning the task that was tracked.
    #[must_use]
    pub fn remove(&self, key: TaskKey) -> Option<Arc<AllocatedTask>> {
        self.tasks.write().remove(&key)
    }

    /// Returns whether `key` is tracked.
    #[must_use]
    pub fn contains(&self, key: TaskKey) -> bool {
        self.tasks.read().contains_key(&key)
    }

    /// Returns a copy of every tracked key.
    #[must_use]
    pub fn keys(&self) -> HashSet<TaskKey> {
        self.tasks.read().keys().copied().collect()
    }

    /// Returns the number of tracked tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    /// Returns whether nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }

    /// Removes and returns every tracked task.
    #[must_use]
    pub fn drain(&self) -> Vec<Arc<AllocatedTask>> {
        self.tasks.write().drain().map(|(_, task)| task).collect()
    }
}
