//! Assignment, reassignment and withdrawal flows across nodes.

use super::helpers::{GATED_TASK, Node, coordinator, eventually};
use eyre::{Result, WrapErr, ensure};
use persistent_tasks::persistent::{
    adapters::memory::InMemoryCoordinator,
    domain::{NodeId, TaskRequest, TaskState},
};
use rstest::rstest;
use serde_json::json;

fn node_id(name: &str) -> Result<NodeId> {
    NodeId::new(name).wrap_err("node name")
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn task_follows_its_assignment_across_three_nodes(
    coordinator: InMemoryCoordinator,
) -> Result<()> {
    let mut node_a = Node::start(&coordinator, "node-a")?;
    let mut node_b = Node::start(&coordinator, "node-b")?;
    let mut node_c = Node::start(&coordinator, "node-c")?;

    let on_a = coordinator.create_task(
        GATED_TASK,
        TaskRequest::new(json!({"index": "logs"})),
        node_id("node-a")?,
    )?;
    ensure!(node_a.sync()?.started == vec![on_a], "node-a should start {on_a}");
    ensure!(node_b.sync()?.is_empty(), "node-b has nothing assigned yet");
    ensure!(node_c.sync()?.is_empty(), "node-c has nothing assigned yet");
    let task_a = node_a.task(on_a)?;
    ensure!(task_a.state() == TaskState::Started, "node-a task is running");

    let on_b = coordinator.reassign(on_a.id(), node_id("node-b")?)?;
    ensure!(node_a.sync()?.cancelled == vec![on_a], "node-a should cancel {on_a}");
    ensure!(node_b.sync()?.started == vec![on_b], "node-b should start {on_b}");
    let node_b_local_id = node_b.task(on_b)?.local_id();
    node_c.sync()?;
    ensure!(task_a.state() == TaskState::Cancelled, "node-a task is cancelled");
    eventually("node-a releases its bookkeeping", || {
        node_a.service.task_manager().is_empty()
    })
    .await?;

    let on_c = coordinator.reassign(on_b.id(), node_id("node-c")?)?;
    node_a.sync()?;
    ensure!(node_b.sync()?.cancelled == vec![on_b], "node-b should cancel {on_b}");
    ensure!(node_c.sync()?.started == vec![on_c], "node-c should start {on_c}");

    node_c.gate.release(on_c, Ok(()));
    let task_c = node_c.task(on_c)?;
    eventually("node-c reports completion", || {
        task_c.state() == TaskState::Notified
    })
    .await?;
    let completions = coordinator.completions()?;
    ensure!(completions.len() == 1, "one completion expected, got {completions:?}");
    ensure!(
        completions.iter().all(|record| record.key == on_c && record.failure.is_none()),
        "completion should come from {on_c} without failure: {completions:?}"
    );
    ensure!(coordinator.snapshot()?.is_empty(), "coordinator dropped the task");

    ensure!(node_c.sync()?.finished == vec![on_c], "node-c should retire {on_c}");
    for node in [&node_a, &node_b, &node_c] {
        ensure!(node.service.running().is_empty(), "{} still tracks tasks", node.id.as_str());
    }
    eventually("node-a and node-b request local cancellation", || {
        coordinator
            .cancellations()
            .is_ok_and(|ids| {
                ids.len() == 2
                    && ids.contains(&task_a.local_id())
                    && ids.contains(&node_b_local_id)
            })
    })
    .await?;
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn repeated_events_start_business_logic_once(coordinator: InMemoryCoordinator) -> Result<()> {
    let mut node = Node::start(&coordinator, "node-a")?;
    let key = coordinator.create_task(GATED_TASK, TaskRequest::default(), node_id("node-a")?)?;

    let first = node.sync()?;
    let repeated = node.sync()?;
    let membership = node.sync_nodes_changed()?;

    ensure!(first.started == vec![key], "first event starts the task");
    ensure!(repeated.is_empty(), "unchanged record is ignored: {repeated:?}");
    ensure!(membership.is_empty(), "membership change finds nothing new: {membership:?}");
    ensure!(node.service.task_manager().len() == 1, "exactly one local registration");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn withdrawn_task_is_cancelled_locally_without_completion(
    coordinator: InMemoryCoordinator,
) -> Result<()> {
    let mut node = Node::start(&coordinator, "node-a")?;
    let key = coordinator.create_task(GATED_TASK, TaskRequest::default(), node_id("node-a")?)?;
    node.sync()?;
    let task = node.task(key)?;

    coordinator.remove_task(key.id())?;
    let report = node.sync()?;

    ensure!(report.cancelled == vec![key], "withdrawn task is cancelled: {report:?}");
    eventually("cancellation reaches the coordinator", || {
        coordinator
            .cancellations()
            .is_ok_and(|ids| ids == vec![task.local_id()])
    })
    .await?;
    eventually("bookkeeping is released", || {
        node.service.task_manager().is_empty()
    })
    .await?;
    ensure!(coordinator.completions()?.is_empty(), "no completion for withdrawn work");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_task_name_is_reported_and_skipped(coordinator: InMemoryCoordinator) -> Result<()> {
    let mut node = Node::start(&coordinator, "node-a")?;
    let key = coordinator.create_task("snapshot", TaskRequest::default(), node_id("node-a")?)?;

    let report = node.sync()?;

    ensure!(
        report.start_failures.iter().map(|(failed, _)| *failed).eq([key]),
        "start failure expected for {key}: {report:?}"
    );
    ensure!(node.service.running().is_empty(), "nothing is tracked");
    ensure!(node.service.task_manager().is_empty(), "nothing is registered");
    Ok(())
}
