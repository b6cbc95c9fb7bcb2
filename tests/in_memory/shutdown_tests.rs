//! Draining local tasks when the agent stops.

use super::helpers::{GATED_TASK, Node, coordinator, eventually};
use eyre::{Result, WrapErr, ensure};
use persistent_tasks::persistent::{
    adapters::memory::InMemoryCoordinator,
    domain::{NodeId, TaskRequest, TaskState},
};
use rstest::rstest;
use std::time::Duration;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shutdown_cancels_running_work_and_closes_the_pool(
    coordinator: InMemoryCoordinator,
) -> Result<()> {
    let mut node = Node::start(&coordinator, "node-a")?;
    let local = NodeId::new("node-a").wrap_err("node name")?;
    let first = coordinator.create_task(GATED_TASK, TaskRequest::default(), local.clone())?;
    let second = coordinator.create_task(GATED_TASK, TaskRequest::default(), local)?;
    node.sync()?;
    let tasks = [node.task(first)?, node.task(second)?];

    let cancelled = node.service.shutdown();

    ensure!(cancelled == vec![first, second], "both tasks are cancelled: {cancelled:?}");
    ensure!(node.service.running().is_empty(), "registry is drained");
    ensure!(node.background.is_closed(), "pool refuses new work");
    ensure!(
        tasks.iter().all(|task| task.state() == TaskState::Cancelled),
        "every task ends cancelled"
    );
    tokio::time::timeout(Duration::from_secs(2), node.background.wait())
        .await
        .wrap_err("business logic should stop after cancellation")?;
    ensure!(node.background.pending_jobs() == 0, "no background job is left");
    eventually("local registrations are released", || {
        node.service.task_manager().is_empty()
    })
    .await?;
    ensure!(coordinator.completions()?.is_empty(), "no completion is reported");
    ensure!(coordinator.cancellations()?.is_empty(), "no cancellation is sent");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shutdown_releases_tasks_that_already_reported(
    coordinator: InMemoryCoordinator,
) -> Result<()> {
    let mut node = Node::start(&coordinator, "node-a")?;
    let local = NodeId::new("node-a").wrap_err("node name")?;
    let key = coordinator.create_task(GATED_TASK, TaskRequest::default(), local)?;
    node.sync()?;
    let task = node.task(key)?;
    node.gate.release(key, Ok(()));
    eventually("the task reports completion", || {
        task.state() == TaskState::Notified
    })
    .await?;

    let cancelled = node.service.shutdown();

    ensure!(cancelled.is_empty(), "finished work is not cancelled: {cancelled:?}");
    ensure!(task.state() == TaskState::Notified, "state is left as reported");
    ensure!(node.service.task_manager().is_empty(), "registration is released");
    Ok(())
}
