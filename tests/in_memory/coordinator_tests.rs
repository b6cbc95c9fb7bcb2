//! Acknowledgement rules of the in-memory coordinator record.

use super::helpers::{GATED_TASK, coordinator};
use eyre::{Result, WrapErr, ensure};
use persistent_tasks::persistent::{
    adapters::memory::InMemoryCoordinator,
    domain::{NodeId, TaskKey, TaskRequest},
    ports::{CoordinatorClient, CoordinatorError},
};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn report_from_a_superseded_allocation_is_refused(
    coordinator: InMemoryCoordinator,
) -> Result<()> {
    let first = NodeId::new("node-a").wrap_err("node name")?;
    let second = NodeId::new("node-b").wrap_err("node name")?;
    let old = coordinator.create_task(GATED_TASK, TaskRequest::default(), first)?;
    let new = coordinator.reassign(old.id(), second)?;

    let result = coordinator.send_completion_notification(old, None).await;

    ensure!(
        matches!(
            result,
            Err(CoordinatorError::AllocationMismatch { key, current })
                if key == old && current == new.allocation_id()
        ),
        "stale allocation is refused: {result:?}"
    );
    ensure!(coordinator.completions()?.is_empty(), "nothing is acknowledged");
    ensure!(
        coordinator.snapshot()?.get(old.id()).is_some(),
        "task stays on the record"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn report_for_an_unknown_task_is_refused(coordinator: InMemoryCoordinator) -> Result<()> {
    let missing = TaskKey::from_parts(41, 1);

    let result = coordinator.send_completion_notification(missing, None).await;

    ensure!(
        matches!(result, Err(CoordinatorError::TaskNotFound(id)) if id == missing.id()),
        "unknown task is refused: {result:?}"
    );
    Ok(())
}
