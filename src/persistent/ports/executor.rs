//! Business-logic port implemented once per persistent task type.

use crate::persistent::domain::{AllocatedTask, TaskFailure, TaskRequest};
use async_trait::async_trait;
use std::sync::Arc;

/// Executes the business logic of one persistent task type.
#[async_trait]
pub trait PersistentTaskExecutor: Send + Sync {
    /// Name under which the coordinator records tasks of this type.
    fn task_name(&self) -> &str;

    /// Runs one allocation to completion.
    ///
    /// Implementations should observe [`AllocatedTask::is_cancelled`] or
    /// await [`AllocatedTask::cancelled`] and return
    /// [`TaskFailure::cancelled`] once they stop because of it.
    async fn node_operation(
        &self,
        task: Arc<AllocatedTask>,
        request: TaskRequest,
    ) -> Result<(), TaskFailure>;
}
