//! Domain model for node-local persistent task execution.
//!
//! The domain covers allocation identity, the coordinator snapshot a node
//! receives, and the lifecycle state machine of each locally allocated
//! task. Scheduling, transport and business logic stay outside this
//! boundary.

mod allocated;
mod error;
mod failure;
mod ids;
mod snapshot;
mod status;

pub use allocated::{AllocatedTask, DEFAULT_CANCEL_REASON, TaskState};
pub use error::{ParseTaskStateError, TaskDomainError};
pub use failure::{TaskFailure, TaskFailureKind};
pub use ids::{AllocationId, LocalTaskId, NodeId, PersistentTaskId, TaskKey};
pub use snapshot::{ClusterChangedEvent, PersistentTasks, TaskDescriptor, TaskRequest};
pub use status::Status;
