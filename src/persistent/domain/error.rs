//! Error types for persistent task domain validation and parsing.

use thiserror::Error;

/// Errors returned while constructing persistent task domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The node identifier is empty after trimming.
    #[error("node id must not be empty")]
    EmptyNodeId,

    /// The task name is empty after trimming.
    #[error("persistent task name must not be empty")]
    EmptyTaskName,
}

/// Error returned while parsing a task state from its string form.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown allocated task state: {0}")]
pub struct ParseTaskStateError(pub String);
