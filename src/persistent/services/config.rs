//! Configuration for the node task agent.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned while loading agent configuration.
#[derive(Debug, Error)]
pub enum AgentConfigError {
    /// The document is not valid configuration JSON.
    #[error("invalid agent configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A required setting is empty after trimming.
    #[error("agent setting '{0}' must not be empty")]
    EmptySetting(&'static str),
}

/// Settings that shape how local tasks are registered and cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    /// Task type under which allocations are registered locally.
    pub task_type: String,
    /// Suffix appended to the task name to form the local action name.
    pub action_suffix: String,
    /// Reason recorded when the coordinator stops assigning a task here.
    pub orphan_cancellation_reason: String,
    /// Reason recorded for every task still running at shutdown.
    pub shutdown_cancellation_reason: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            task_type: "persistent".to_owned(),
            action_suffix: "[c]".to_owned(),
            orphan_cancellation_reason: "persistent task is no longer assigned to this node"
                .to_owned(),
            shutdown_cancellation_reason: "node is shutting down".to_owned(),
        }
    }
}

impl AgentConfig {
    /// Parses and validates configuration from a JSON document.
    ///
    /// Missing fields fall back to [`AgentConfig::default`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentConfigError::Parse`] for malformed JSON or unknown
    /// fields, and [`AgentConfigError::EmptySetting`] for blank values.
    pub fn from_json_str(document: &str) -> Result<Self, AgentConfigError> {
        let config: Self = serde_json::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every setting is non-blank.
    ///
    /// # Errors
    ///
    /// Returns [`AgentConfigError::EmptySetting`] naming the first blank
    /// setting.
    pub fn validate(&self) -> Result<(), AgentConfigError> {
        let settings = [
            ("task_type", &self.task_type),
            ("orphan_cancellation_reason", &self.orphan_cancellation_reason),
            (
                "shutdown_cancellation_reason",
                &self.shutdown_cancellation_reason,
            ),
        ];
        for (name, value) in settings {
            if value.trim().is_empty() {
                return Err(AgentConfigError::EmptySetting(name));
            }
        }
        Ok(())
    }

    /// Returns the local action name for a persistent task name.
    #[must_use]
    pub fn action_for(&self, task_name: &str) -> String {
        format!("{task_name}{}", self.action_suffix)
    }
}
