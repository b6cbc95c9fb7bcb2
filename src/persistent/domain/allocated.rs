//! Node-local persistent task instance and its lifecycle state machine.
//!
//! ```text
//! Created -> Started -> Completed | FailedLocal -> Notifying -> Notified
//!                                                      ^   |
//!                                                      |   v
//!                                              FailedNotification
//! Created | Started -> Cancelled
//! ```
//!
//! Every transition is a compare-and-set on the current state. A rejected
//! transition returns `false` and leaves the task untouched, because the
//! reconciliation pass races with completion and notification callbacks.

use super::{LocalTaskId, ParseTaskStateError, Status, TaskFailure, TaskKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Cancellation reason applied when a cancel request carries none.
///
/// A task cancelled with exactly this reason reports success to the
/// coordinator even if its business logic failed.
pub const DEFAULT_CANCEL_REASON: &str = "by user request";

/// Lifecycle state of an allocated task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Registered locally; business logic not yet invoked.
    Created,
    /// Business logic is running.
    Started,
    /// Business logic finished successfully; report not yet sent.
    Completed,
    /// Business logic failed; report not yet sent.
    FailedLocal,
    /// Completion report is in flight to the coordinator.
    Notifying,
    /// The completion report could not be delivered.
    FailedNotification,
    /// The coordinator accepted the completion report.
    Notified,
    /// Cancelled locally because the coordinator no longer assigns it here.
    Cancelled,
}

impl TaskState {
    const ALL: [Self; 8] = [
        Self::Created,
        Self::Started,
        Self::Completed,
        Self::FailedLocal,
        Self::Notifying,
        Self::FailedNotification,
        Self::Notified,
        Self::Cancelled,
    ];

    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Started => "started",
            Self::Completed => "completed",
            Self::FailedLocal => "failed_local",
            Self::Notifying => "notifying",
            Self::FailedNotification => "failed_notification",
            Self::Notified => "notified",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns whether the business logic has finished running.
    #[must_use]
    pub const fn is_execution_finished(self) -> bool {
        !matches!(self, Self::Created | Self::Started)
    }

    const fn encode(self) -> u8 {
        self as u8
    }

    fn decode(value: u8) -> Self {
        // Only values produced by `encode` are ever stored.
        Self::ALL
            .into_iter()
            .find(|state| state.encode() == value)
            .unwrap_or(Self::Cancelled)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskState {
    type Error = ParseTaskStateError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == normalized)
            .ok_or_else(|| ParseTaskStateError(value.to_owned()))
    }
}

/// One allocation of a persistent task running on this node.
///
/// Instances are shared between the reconciliation pass, the business logic
/// and notification callbacks. Only the agent drives state transitions.
#[derive(Debug)]
pub struct AllocatedTask {
    local_id: LocalTaskId,
    key: TaskKey,
    task_type: String,
    action: String,
    started_at: DateTime<Utc>,
    state: AtomicU8,
    cancellation: CancellationToken,
    reason_cancelled: OnceLock<String>,
    failure: OnceLock<TaskFailure>,
}

impl AllocatedTask {
    /// Creates a task in the [`TaskState::Created`] state.
    #[must_use]
    pub fn new(
        key: TaskKey,
        task_type: impl Into<String>,
        action: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            local_id: LocalTaskId::new(),
            key,
            task_type: task_type.into(),
            action: action.into(),
            started_at,
            state: AtomicU8::new(TaskState::Created.encode()),
            cancellation: CancellationToken::new(),
            reason_cancelled: OnceLock::new(),
            failure: OnceLock::new(),
        }
    }

    /// Returns the node-local task id.
    #[must_use]
    pub const fn local_id(&self) -> LocalTaskId {
        self.local_id
    }

    /// Returns the allocation identity.
    #[must_use]
    pub const fn key(&self) -> TaskKey {
        self.key
    }

    /// Returns the local task type.
    #[must_use]
    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    /// Returns the local action name.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Returns the registration timestamp.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TaskState {
        TaskState::decode(self.state.load(Ordering::Acquire))
    }

    /// Returns a serializable snapshot of the current state.
    #[must_use]
    pub fn status(&self) -> Status {
        Status::new(self.state())
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Returns the reason given with the cancellation request, if any.
    #[must_use]
    pub fn reason_cancelled(&self) -> Option<&str> {
        self.reason_cancelled.get().map(String::as_str)
    }

    /// Returns the failure carried by the completion report, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&TaskFailure> {
        self.failure.get()
    }

    /// Returns a token the business logic can poll or await.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Resolves once cancellation has been requested.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancellation.cancelled()
    }

    /// Requests cooperative cancellation without changing the state.
    ///
    /// Returns `false` when the task was already cancelled; the first reason
    /// wins.
    #[must_use]
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        if self.reason_cancelled.set(reason.into()).is_err() {
            return false;
        }
        self.cancellation.cancel();
        true
    }

    /// `Created -> Started`.
    #[must_use]
    pub fn mark_started(&self) -> bool {
        self.transition(&[TaskState::Created], TaskState::Started)
    }

    /// `Started -> Completed` on success, `Started -> FailedLocal` on failure.
    #[must_use]
    pub fn mark_completed(&self, outcome: &Result<(), TaskFailure>) -> bool {
        let target = if outcome.is_ok() {
            TaskState::Completed
        } else {
            TaskState::FailedLocal
        };
        self.transition(&[TaskState::Started], target)
    }

    /// `Completed | FailedLocal -> Notifying`, recording the reported failure.
    #[must_use]
    pub fn start_notification(&self, failure: Option<TaskFailure>) -> bool {
        if !self.transition(
            &[TaskState::Completed, TaskState::FailedLocal],
            TaskState::Notifying,
        ) {
            return false;
        }
        if let Some(failure) = failure {
            if let Err(rejected) = self.failure.set(failure) {
                tracing::warn!(
                    task = %self.key,
                    failure = %rejected,
                    "completion failure already recorded"
                );
            }
        }
        true
    }

    /// `Notifying -> FailedNotification`.
    #[must_use]
    pub fn notification_failed(&self) -> bool {
        self.transition(&[TaskState::Notifying], TaskState::FailedNotification)
    }

    /// `FailedNotification -> Notifying`.
    #[must_use]
    pub fn restart_completion_notification(&self) -> bool {
        self.transition(&[TaskState::FailedNotification], TaskState::Notifying)
    }

    /// `Notifying -> Notified`.
    #[must_use]
    pub fn mark_as_notified(&self) -> bool {
        self.transition(&[TaskState::Notifying], TaskState::Notified)
    }

    /// `Created | Started -> Cancelled`, then requests cancellation.
    ///
    /// Returns `false` when cancellation was already requested, including
    /// by a user through [`Self::cancel`], or when the task has finished
    /// running.
    #[must_use]
    pub fn mark_as_cancelled(&self, reason: impl Into<String>) -> bool {
        if self.reason_cancelled.get().is_some() {
            return false;
        }
        if !self.transition(
            &[TaskState::Created, TaskState::Started],
            TaskState::Cancelled,
        ) {
            return false;
        }
        self.cancel(reason)
    }

    fn transition(&self, from: &[TaskState], to: TaskState) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if !from.contains(&TaskState::decode(current)) {
                return false;
            }
            match self.state.compare_exchange_weak(
                current,
                to.encode(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}
