//! Coordinator-facing port used to report task outcomes.

use crate::persistent::domain::{AllocationId, LocalTaskId, PersistentTaskId, TaskFailure, TaskKey};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for coordinator operations.
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Calls a node makes against the coordinator's task record.
///
/// Each call is a single delivery attempt. Retrying is the caller's
/// business.
#[async_trait]
pub trait CoordinatorClient: Send + Sync {
    /// Reports that the allocation identified by `key` finished, carrying
    /// the failure if it did not succeed.
    ///
    /// Returns the id of the task the coordinator updated.
    async fn send_completion_notification(
        &self,
        key: TaskKey,
        failure: Option<TaskFailure>,
    ) -> CoordinatorResult<PersistentTaskId>;

    /// Asks the cluster to cancel the node-local task `local_id`.
    ///
    /// The persistent task record is left alone; only the local execution
    /// and anything it spawned are cancelled. Returns the cancelled id.
    async fn send_cancellation(&self, local_id: LocalTaskId) -> CoordinatorResult<LocalTaskId>;
}

/// Errors returned by coordinator adapters.
#[derive(Debug, Clone, Error)]
pub enum CoordinatorError {
    /// The coordinator holds no task with this id.
    #[error("persistent task {0} not found on the coordinator")]
    TaskNotFound(PersistentTaskId),

    /// The coordinator has moved the task to a different allocation.
    #[error("persistent task {key} is now allocated as {current}")]
    AllocationMismatch {
        /// Key named in the request.
        key: TaskKey,
        /// Allocation the coordinator currently records.
        current: AllocationId,
    },

    /// The request could not be delivered.
    #[error("coordinator transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl CoordinatorError {
    /// Wraps a transport-level error.
    #[must_use]
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }
}
