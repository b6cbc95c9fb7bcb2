//! Adapter implementations for the node task agent ports.

pub mod memory;

mod runner;
mod runtime;

pub use runner::NodeTaskRunner;
pub use runtime::TokioBackgroundExecutor;
