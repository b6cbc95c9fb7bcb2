//! In-memory adapters.

mod coordinator;

pub use coordinator::{CompletionRecord, InMemoryCoordinator};
