//! Port contracts for node-local persistent task execution.

mod background;
mod coordinator;
mod executor;
mod runner;

pub use background::{
    BackgroundExecutor, BackgroundExecutorError, BackgroundExecutorResult, BackgroundJob,
};
pub use coordinator::{CoordinatorClient, CoordinatorError, CoordinatorResult};
pub use executor::PersistentTaskExecutor;
pub use runner::{
    CompletionHandler, CompletionListener, TaskRunner, TaskRunnerError, TaskRunnerResult,
};
