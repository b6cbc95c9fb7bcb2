//! Introspection status of a locally running persistent task.

use super::{ParseTaskStateError, TaskState};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Point-in-time status of an allocated task, exposed to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Status {
    state: TaskState,
}

impl Status {
    /// Name under which this status type is published.
    pub const NAME: &'static str = "persistent_executor";

    /// Creates a status for the given state.
    #[must_use]
    pub const fn new(state: TaskState) -> Self {
        Self { state }
    }

    /// Returns the captured state.
    #[must_use]
    pub const fn state(self) -> TaskState {
        self.state
    }
}

impl fmt::Display for Status {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{{\"state\":\"{}\"}}", self.state)
    }
}

impl TryFrom<&str> for Status {
    type Error = ParseTaskStateError;

    /// Accepts the rendered form `{"state":"started"}` or a bare state name.
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        serde_json::from_str::<Self>(value).or_else(|_| TaskState::try_from(value).map(Self::new))
    }
}
