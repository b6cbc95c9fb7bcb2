//! Application services that drive node-local persistent task execution.

mod config;
mod executors;
mod node;
mod notification;
mod running;
mod task_manager;

pub use config::{AgentConfig, AgentConfigError};
pub use executors::{ExecutorRegistry, ExecutorRegistryError, ExecutorRegistryResult};
pub use node::{NodeTaskService, ReconciliationReport, StartTaskError};
pub use notification::CompletionNotifier;
pub use running::{LocalTaskRegistry, RegistryError};
pub use task_manager::{LocalTaskManager, TaskInfo, TaskManagerError};
