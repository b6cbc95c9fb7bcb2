//! Tokio-backed background executor.

use crate::persistent::ports::{
    BackgroundExecutor, BackgroundExecutorError, BackgroundExecutorResult, BackgroundJob,
};
use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;

/// Background pool that spawns jobs on a Tokio runtime.
///
/// Jobs are tracked so shutdown can wait for in-flight business logic and
/// coordinator calls to drain.
#[derive(Debug, Clone)]
pub struct TokioBackgroundExecutor {
    handle: Handle,
    tracker: TaskTracker,
}

impl TokioBackgroundExecutor {
    /// Creates an executor that spawns on `handle`.
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            tracker: TaskTracker::new(),
        }
    }

    /// Creates an executor bound to the runtime of the calling thread.
    ///
    /// # Errors
    ///
    /// Returns [`BackgroundExecutorError::Unavailable`] outside a Tokio
    /// runtime.
    pub fn current() -> BackgroundExecutorResult<Self> {
        let handle = Handle::try_current().map_err(BackgroundExecutorError::unavailable)?;
        Ok(Self::new(handle))
    }

    /// Returns the number of jobs that have not finished yet.
    #[must_use]
    pub fn pending_jobs(&self) -> usize {
        self.tracker.len()
    }

    /// Returns whether the executor has stopped accepting jobs.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tracker.is_closed()
    }

    /// Waits until the executor is closed and every tracked job finished.
    pub async fn wait(&self) {
        self.tracker.wait().await;
    }
}

impl BackgroundExecutor for TokioBackgroundExecutor {
    fn submit(&self, job: BackgroundJob) -> BackgroundExecutorResult<()> {
        if self.tracker.is_closed() {
            return Err(BackgroundExecutorError::Shutdown);
        }
        drop(self.tracker.spawn_on(job, &self.handle));
        Ok(())
    }

    fn close(&self) {
        self.tracker.close();
    }
}
