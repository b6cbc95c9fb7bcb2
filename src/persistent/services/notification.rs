//! Delivery of completion and cancellation reports to the coordinator.
//!
//! Every coordinator call is submitted to the background executor; nothing
//! here waits on the thread that delivers coordinator state changes. A
//! failed completion report parks the task in
//! [`TaskState::FailedNotification`] and the next reconciliation pass
//! retries it.

use super::{LocalTaskManager, LocalTaskRegistry};
use crate::persistent::{
    domain::{AllocatedTask, DEFAULT_CANCEL_REASON, PersistentTaskId, TaskFailure, TaskState},
    ports::{BackgroundExecutor, CompletionHandler, CoordinatorClient, CoordinatorError},
};
use mockable::Clock;
use std::sync::Arc;

/// Sends completion and cancellation reports for local tasks.
pub struct CompletionNotifier<C, K>
where
    C: CoordinatorClient + 'static,
    K: Clock + Send + Sync + 'static,
{
    coordinator: Arc<C>,
    background: Arc<dyn BackgroundExecutor>,
    task_manager: Arc<LocalTaskManager<K>>,
    running: Arc<LocalTaskRegistry>,
}

impl<C, K> Clone for CompletionNotifier<C, K>
where
    C: CoordinatorClient + 'static,
    K: Clock + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
            background: Arc::clone(&self.background),
            task_manager: Arc::clone(&self.task_manager),
            running: Arc::clone(&self.running),
        }
    }
}

impl<C, K> CompletionNotifier<C, K>
where
    C: CoordinatorClient + 'static,
    K: Clock + Send + Sync + 'static,
{
    /// Creates a notifier sharing the agent's bookkeeping.
    #[must_use]
    pub const fn new(
        coordinator: Arc<C>,
        background: Arc<dyn BackgroundExecutor>,
        task_manager: Arc<LocalTaskManager<K>>,
        running: Arc<LocalTaskRegistry>,
    ) -> Self {
        Self {
            coordinator,
            background,
            task_manager,
            running,
        }
    }

    /// Starts the first completion report for a finished task.
    ///
    /// A task cancelled by the agent is only unregistered; the coordinator
    /// already dropped it. The same holds for a user-cancelled task the
    /// agent stopped tracking.
    pub fn start_completion_notification(
        &self,
        task: &Arc<AllocatedTask>,
        failure: Option<TaskFailure>,
    ) {
        if task.state() == TaskState::Cancelled
            || (task.is_cancelled() && !self.running.contains(task.key()))
        {
            self.task_manager.unregister(task);
            return;
        }
        tracing::trace!(
            task = %task.key(),
            failed = failure.is_some(),
            "sending completion notification"
        );
        if task.start_notification(failure) {
            self.dispatch(task);
        } else {
            tracing::warn!(
                task = %task.key(),
                state = %task.state(),
                "attempt to send completion notification from an unexpected state"
            );
        }
    }

    /// Resends the completion report of a task whose last attempt failed.
    ///
    /// Returns whether a new attempt was submitted.
    #[must_use]
    pub fn restart_completion_notification(&self, task: &Arc<AllocatedTask>) -> bool {
        tracing::trace!(task = %task.key(), "resending completion notification");
        if task.state() == TaskState::Cancelled {
            self.task_manager.unregister(task);
            return false;
        }
        if !task.restart_completion_notification() {
            tracing::warn!(
                task = %task.key(),
                state = %task.state(),
                "attempt to resend completion notification from an unexpected state"
            );
            return false;
        }
        self.dispatch(task);
        true
    }

    /// Tells the coordinator a task was cancelled locally.
    ///
    /// Fire-and-forget: failures are logged and never retried.
    pub fn send_cancellation(&self, task: &Arc<AllocatedTask>) {
        let coordinator = Arc::clone(&self.coordinator);
        let key = task.key();
        let local_id = task.local_id();
        let job = Box::pin(async move {
            match coordinator.send_cancellation(local_id).await {
                Ok(id) => tracing::trace!(local_id = %id, task = %key, "persistent task was cancelled"),
                Err(err) => tracing::warn!(task = %key, error = %err, "failed to cancel task"),
            }
        });
        if let Err(err) = self.background.submit(job) {
            tracing::warn!(task = %key, error = %err, "failed to cancel task");
        }
    }

    fn dispatch(&self, task: &Arc<AllocatedTask>) {
        let in_flight = InFlightNotification {
            notifier: self.clone(),
            task: Arc::clone(task),
            settled: false,
        };
        let job = Box::pin(async move {
            let result = in_flight
                .notifier
                .coordinator
                .send_completion_notification(
                    in_flight.task.key(),
                    in_flight.task.failure().cloned(),
                )
                .await;
            in_flight.settle(result);
        });
        // A refused job is dropped here and its guard records the failure.
        if let Err(err) = self.background.submit(job) {
            tracing::warn!(
                task = %task.key(),
                error = %err,
                "completion notification could not be submitted"
            );
        }
    }

    fn on_notification_result(
        &self,
        task: &Arc<AllocatedTask>,
        result: Result<PersistentTaskId, CoordinatorError>,
    ) {
        match result {
            Ok(_) => {
                tracing::trace!(task = %task.key(), "completion notification was successful");
                if !task.mark_as_notified() {
                    tracing::warn!(
                        task = %task.key(),
                        state = %task.state(),
                        "attempt to mark task as notified from an unexpected state"
                    );
                }
                self.task_manager.unregister(task);
            }
            Err(err) => {
                tracing::warn!(
                    task = %task.key(),
                    error = %err,
                    "completion notification failed, retrying on next cluster change"
                );
                if !task.notification_failed() {
                    tracing::warn!(
                        task = %task.key(),
                        state = %task.state(),
                        "attempt to mark completion notification as failed from an unexpected state"
                    );
                }
                if !self.running.contains(task.key()) {
                    // No later pass will see this key again.
                    self.task_manager.unregister(task);
                }
            }
        }
    }
}

/// Completion report travelling through the background executor.
///
/// Dropping it unsettled, because the executor refused or discarded the
/// job, counts as a failed attempt so the task stays eligible for a resend.
struct InFlightNotification<C, K>
where
    C: CoordinatorClient + 'static,
    K: Clock + Send + Sync + 'static,
{
    notifier: CompletionNotifier<C, K>,
    task: Arc<AllocatedTask>,
    settled: bool,
}

impl<C, K> InFlightNotification<C, K>
where
    C: CoordinatorClient + 'static,
    K: Clock + Send + Sync + 'static,
{
    fn settle(mut self, result: Result<PersistentTaskId, CoordinatorError>) {
        self.settled = true;
        self.notifier.on_notification_result(&self.task, result);
    }
}

impl<C, K> Drop for InFlightNotification<C, K>
where
    C: CoordinatorClient + 'static,
    K: Clock + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let dropped = std::io::Error::other("completion notification job was dropped");
        self.notifier
            .on_notification_result(&self.task, Err(CoordinatorError::transport(dropped)));
    }
}

impl<C, K> CompletionHandler for CompletionNotifier<C, K>
where
    C: CoordinatorClient + 'static,
    K: Clock + Send + Sync + 'static,
{
    fn on_completion(&self, task: &Arc<AllocatedTask>, outcome: Result<(), TaskFailure>) {
        if !task.mark_completed(&outcome) {
            tracing::debug!(
                task = %task.key(),
                state = %task.state(),
                "task finished outside the started state"
            );
        }
        let report = match outcome {
            Ok(()) => None,
            Err(failure) if task.is_cancelled() => {
                if !failure.is_cancellation() {
                    tracing::warn!(
                        task = %task.key(),
                        reason = task.reason_cancelled().unwrap_or_default(),
                        error = %failure,
                        "cancelled task failed with an error"
                    );
                }
                if task.reason_cancelled() == Some(DEFAULT_CANCEL_REASON) {
                    None
                } else {
                    Some(failure)
                }
            }
            Err(failure) => Some(failure),
        };
        self.start_completion_notification(task, report);
    }
}
