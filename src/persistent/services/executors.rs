//! Registry resolving persistent task names to their business logic.

use crate::persistent::ports::PersistentTaskExecutor;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors returned by the executor registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutorRegistryError {
    /// No executor is registered under this task name.
    #[error("no persistent task executor registered for task name [{0}]")]
    UnknownExecutor(String),

    /// An executor is already registered under this task name.
    #[error("duplicate persistent task executor for task name [{0}]")]
    DuplicateExecutor(String),
}

/// Result type for executor registry operations.
pub type ExecutorRegistryResult<T> = Result<T, ExecutorRegistryError>;

/// Immutable-after-construction mapping of task names to executors.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn PersistentTaskExecutor>>,
}

impl ExecutorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from a set of executors.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorRegistryError::DuplicateExecutor`] when two
    /// executors share a task name.
    pub fn from_executors(
        executors: impl IntoIterator<Item = Arc<dyn PersistentTaskExecutor>>,
    ) -> ExecutorRegistryResult<Self> {
        let mut registry = Self::new();
        for executor in executors {
            registry.register(executor)?;
        }
        Ok(registry)
    }

    /// Adds an executor under its own task name.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorRegistryError::DuplicateExecutor`] when the name is
    /// already taken.
    pub fn register(
        &mut self,
        executor: Arc<dyn PersistentTaskExecutor>,
    ) -> ExecutorRegistryResult<()> {
        let name = executor.task_name().to_owned();
        if self.executors.contains_key(&name) {
            return Err(ExecutorRegistryError::DuplicateExecutor(name));
        }
        self.executors.insert(name, executor);
        Ok(())
    }

    /// Resolves the executor for a task name.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorRegistryError::UnknownExecutor`] when nothing is
    /// registered under `task_name`.
    pub fn resolve(&self, task_name: &str) -> ExecutorRegistryResult<Arc<dyn PersistentTaskExecutor>> {
        self.executors
            .get(task_name)
            .cloned()
            .ok_or_else(|| ExecutorRegistryError::UnknownExecutor(task_name.to_owned()))
    }

    /// Returns whether an executor is registered for `task_name`.
    #[must_use]
    pub fn contains(&self, task_name: &str) -> bool {
        self.executors.contains_key(task_name)
    }
}

impl fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.executors.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ExecutorRegistry")
            .field("task_names", &names)
            .finish()
    }
}
