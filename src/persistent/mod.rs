//! Node-side execution of coordinator-assigned persistent tasks.
//!
//! A cluster coordinator records long-running tasks and assigns each one to
//! a node. [`services::NodeTaskService`] watches those assignments, starts
//! local execution for new allocations, reports outcomes back and cancels
//! work the coordinator has withdrawn.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
