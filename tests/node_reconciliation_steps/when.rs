//! When steps for node reconciliation BDD scenarios.

use super::world::ReconciliationWorld;
use eyre::WrapErr;
use persistent_tasks::persistent::domain::NodeId;
use rstest_bdd_macros::when;

#[when("every node observes the cluster state")]
fn every_node_observes(world: &mut ReconciliationWorld) -> Result<(), eyre::Report> {
    world.observe(false)
}

#[when("the cluster membership changes")]
fn membership_changes(world: &mut ReconciliationWorld) -> Result<(), eyre::Report> {
    world.observe(true)
}

#[when(r#"the task is reassigned to "{node}""#)]
fn task_reassigned(world: &mut ReconciliationWorld, node: String) -> Result<(), eyre::Report> {
    let key = world.key()?;
    let target = NodeId::new(node).wrap_err("target node")?;
    let reassigned = world
        .coordinator
        .reassign(key.id(), target)
        .wrap_err("reassign task")?;
    world.current_key = Some(reassigned);
    Ok(())
}

#[when("the task is withdrawn from the cluster")]
fn task_withdrawn(world: &mut ReconciliationWorld) -> Result<(), eyre::Report> {
    let key = world.key()?;
    world
        .coordinator
        .remove_task(key.id())
        .wrap_err("remove task")?;
    Ok(())
}

#[when(r#"the task on "{node}" succeeds"#)]
fn task_succeeds(world: &mut ReconciliationWorld, node: String) -> Result<(), eyre::Report> {
    let key = world.key()?;
    world.node(&node)?.gate.release(key, Ok(()));
    Ok(())
}
