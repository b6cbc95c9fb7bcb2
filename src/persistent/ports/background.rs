//! Submission port for work that must leave the event-delivery thread.

use futures::future::BoxFuture;
use std::sync::Arc;
use thiserror::Error;

/// Unit of background work.
pub type BackgroundJob = BoxFuture<'static, ()>;

/// Result type for background submissions.
pub type BackgroundExecutorResult<T> = Result<T, BackgroundExecutorError>;

/// General-purpose pool that runs business logic and coordinator calls.
///
/// `submit` never blocks and never runs the job inline.
pub trait BackgroundExecutor: Send + Sync {
    /// Queues a job for execution.
    ///
    /// # Errors
    ///
    /// Returns [`BackgroundExecutorError::Shutdown`] once the executor has
    /// been closed, or [`BackgroundExecutorError::Unavailable`] when no
    /// runtime can accept the job. The job is dropped in both cases.
    fn submit(&self, job: BackgroundJob) -> BackgroundExecutorResult<()>;

    /// Stops accepting new jobs. Already queued jobs keep running.
    fn close(&self);
}

/// Errors returned by background executor adapters.
#[derive(Debug, Clone, Error)]
pub enum BackgroundExecutorError {
    /// The executor has been closed.
    #[error("background executor is shut down")]
    Shutdown,

    /// No runtime is available to run the job.
    #[error("background executor unavailable: {0}")]
    Unavailable(Arc<dyn std::error::Error + Send + Sync>),
}

impl BackgroundExecutorError {
    /// Wraps a runtime availability error.
    #[must_use]
    pub fn unavailable(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unavailable(Arc::new(err))
    }
}
