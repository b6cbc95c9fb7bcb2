//! Failure reported by, or on behalf of, task business logic.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Category of a task failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskFailureKind {
    /// The business logic returned an error.
    Execution,
    /// The business logic stopped because it observed a cancellation.
    Cancelled,
    /// The task could not be handed to the runner.
    Rejected,
    /// The business logic panicked.
    Panicked,
}

impl TaskFailureKind {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Execution => "execution",
            Self::Cancelled => "cancelled",
            Self::Rejected => "rejected",
            Self::Panicked => "panicked",
        }
    }
}

impl fmt::Display for TaskFailureKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Failure of one task execution, as carried in a completion report.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind} failure: {message}")]
pub struct TaskFailure {
    kind: TaskFailureKind,
    message: String,
}

impl TaskFailure {
    /// Creates a failure of the given kind.
    #[must_use]
    pub fn new(kind: TaskFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a business-logic execution failure.
    #[must_use]
    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(TaskFailureKind::Execution, message)
    }

    /// Creates the failure a task reports after observing cancellation.
    #[must_use]
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::new(TaskFailureKind::Cancelled, reason)
    }

    /// Creates a failure for a task that never reached its business logic.
    #[must_use]
    pub fn rejected(err: &(dyn std::error::Error + 'static)) -> Self {
        Self::new(TaskFailureKind::Rejected, err.to_string())
    }

    /// Returns the failure category.
    #[must_use]
    pub const fn kind(&self) -> TaskFailureKind {
        self.kind
    }

    /// Returns the failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns whether this failure is the task acknowledging cancellation.
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self.kind, TaskFailureKind::Cancelled)
    }
}
