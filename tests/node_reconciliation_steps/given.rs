//! Given steps for node reconciliation BDD scenarios.

use super::helpers::Node;
use super::world::ReconciliationWorld;
use eyre::WrapErr;
use persistent_tasks::persistent::domain::{NodeId, TaskRequest};
use rstest_bdd_macros::given;
use serde_json::json;

#[given(r#"a node named "{name}""#)]
fn node_named(world: &mut ReconciliationWorld, name: String) -> Result<(), eyre::Report> {
    let node = Node::start(&world.coordinator, &name)?;
    world.nodes.insert(name, node);
    Ok(())
}

#[given(r#"a "{task_name}" task assigned to "{node}""#)]
fn task_assigned_to(
    world: &mut ReconciliationWorld,
    task_name: String,
    node: String,
) -> Result<(), eyre::Report> {
    let executor_node = NodeId::new(node).wrap_err("executor node")?;
    let key = world
        .coordinator
        .create_task(
            &task_name,
            TaskRequest::new(json!({"index": "logs"})),
            executor_node,
        )
        .wrap_err("create task on the coordinator")?;
    world.current_key = Some(key);
    Ok(())
}

#[given("the coordinator rejects the next report")]
fn coordinator_rejects_next_report(world: &mut ReconciliationWorld) -> Result<(), eyre::Report> {
    world
        .coordinator
        .fail_next_notifications(1)
        .wrap_err("inject notification failure")
}
