//! Persistent tasks: the node-side agent for coordinator-assigned work.
//!
//! A cluster coordinator records long-running tasks and assigns each
//! allocation to a node. This crate implements what runs on every node:
//! it reconciles the coordinator's snapshot with local execution, drives
//! each local task through its lifecycle state machine, and reports
//! completion or failure back to the coordinator.
//!
//! # Architecture
//!
//! The crate follows hexagonal architecture principles:
//!
//! - **Domain**: allocation identity, snapshots and the task state machine
//! - **Ports**: coordinator, runner, executor and background-pool traits
//! - **Adapters**: Tokio-backed pool and runner, in-memory coordinator
//! - **Services**: reconciliation, notification and local bookkeeping
//!
//! # Modules
//!
//! - [`persistent`]: node-local persistent task execution

pub mod persistent;
