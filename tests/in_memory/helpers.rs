//! Shared test helpers for in-memory agent integration tests.

use eyre::{Result, WrapErr, eyre};
use mockable::DefaultClock;
use parking_lot::Mutex;
use persistent_tasks::persistent::{
    adapters::{NodeTaskRunner, TokioBackgroundExecutor, memory::InMemoryCoordinator},
    domain::{
        AllocatedTask, ClusterChangedEvent, NodeId, PersistentTasks, TaskFailure, TaskKey,
        TaskRequest,
    },
    ports::{BackgroundExecutor, PersistentTaskExecutor},
    services::{ExecutorRegistry, NodeTaskService, ReconciliationReport},
};
use rstest::fixture;
use std::collections::HashMap;
use std::sync::{Arc, Once};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Task name handled by [`GatedExecutor`].
pub const GATED_TASK: &str = "reindex";

/// Task name handled by [`PanickingExecutor`].
pub const PANICKING_TASK: &str = "explode";

/// Agent type exercised by the integration tests.
pub type NodeService = NodeTaskService<InMemoryCoordinator, NodeTaskRunner, DefaultClock>;

static TRACING: Once = Once::new();

/// Installs a test-writer subscriber honouring `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

/// Provides a fresh coordinator record for each test.
#[fixture]
pub fn coordinator() -> InMemoryCoordinator {
    init_tracing();
    InMemoryCoordinator::new()
}

/// Outcomes the test releases to running business logic, by allocation.
#[derive(Debug, Default)]
pub struct OutcomeGate {
    outcomes: Mutex<HashMap<TaskKey, Result<(), TaskFailure>>>,
}

impl OutcomeGate {
    /// Lets the business logic of `key` finish with `outcome`.
    pub fn release(&self, key: TaskKey, outcome: Result<(), TaskFailure>) {
        self.outcomes.lock().insert(key, outcome);
    }

    async fn wait(&self, key: TaskKey) -> Result<(), TaskFailure> {
        loop {
            if let Some(outcome) = self.outcomes.lock().remove(&key) {
                return outcome;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

/// Business logic that runs until released or cancelled.
pub struct GatedExecutor {
    gate: Arc<OutcomeGate>,
}

#[async_trait::async_trait]
impl PersistentTaskExecutor for GatedExecutor {
    fn task_name(&self) -> &str {
        GATED_TASK
    }

    async fn node_operation(
        &self,
        task: Arc<AllocatedTask>,
        _request: TaskRequest,
    ) -> Result<(), TaskFailure> {
        tokio::select! {
            () = task.cancelled() => Err(TaskFailure::cancelled(
                task.reason_cancelled().unwrap_or_default(),
            )),
            outcome = self.gate.wait(task.key()) => outcome,
        }
    }
}

/// Business logic that always panics.
pub struct PanickingExecutor;

#[async_trait::async_trait]
impl PersistentTaskExecutor for PanickingExecutor {
    fn task_name(&self) -> &str {
        PANICKING_TASK
    }

    async fn node_operation(
        &self,
        _task: Arc<AllocatedTask>,
        _request: TaskRequest,
    ) -> Result<(), TaskFailure> {
        panic!("shard map is corrupted");
    }
}

/// One cluster node running the agent against a shared coordinator.
pub struct Node {
    /// Identity of this node.
    pub id: NodeId,
    /// Agent under test.
    pub service: NodeService,
    /// Pool running business logic and coordinator calls.
    pub background: TokioBackgroundExecutor,
    /// Release valve for gated business logic.
    pub gate: Arc<OutcomeGate>,
    coordinator: InMemoryCoordinator,
    previous: Option<PersistentTasks>,
}

impl Node {
    /// Starts an agent for `name` on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error outside a Tokio runtime or for an invalid name.
    pub fn start(coordinator: &InMemoryCoordinator, name: &str) -> Result<Self> {
        let id = NodeId::new(name).wrap_err("node name")?;
        let background = TokioBackgroundExecutor::current().wrap_err("tokio runtime")?;
        let pool: Arc<dyn BackgroundExecutor> = Arc::new(background.clone());
        let gate = Arc::new(OutcomeGate::default());
        let gated: Arc<dyn PersistentTaskExecutor> = Arc::new(GatedExecutor {
            gate: Arc::clone(&gate),
        });
        let panicking: Arc<dyn PersistentTaskExecutor> = Arc::new(PanickingExecutor);
        let executors =
            ExecutorRegistry::from_executors([gated, panicking]).wrap_err("executor registry")?;
        let service = NodeTaskService::new(
            Arc::new(coordinator.clone()),
            Arc::new(NodeTaskRunner::new(Arc::clone(&pool))),
            executors,
            pool,
            Arc::new(DefaultClock),
        );
        Ok(Self {
            id,
            service,
            background,
            gate,
            coordinator: coordinator.clone(),
            previous: None,
        })
    }

    /// Delivers the coordinator's current record to the agent.
    ///
    /// # Errors
    ///
    /// Returns an error when the coordinator record cannot be read.
    pub fn sync(&mut self) -> Result<ReconciliationReport> {
        self.deliver(false)
    }

    /// Delivers the current record flagged as a node membership change.
    ///
    /// # Errors
    ///
    /// Returns an error when the coordinator record cannot be read.
    pub fn sync_nodes_changed(&mut self) -> Result<ReconciliationReport> {
        self.deliver(true)
    }

    fn deliver(&mut self, nodes_changed: bool) -> Result<ReconciliationReport> {
        let current = self.coordinator.snapshot().wrap_err("read coordinator record")?;
        let previous = self.previous.replace(current.clone());
        let event = ClusterChangedEvent::new(previous, Some(current), self.id.clone())
            .with_nodes_changed(nodes_changed);
        Ok(self.service.cluster_changed(&event))
    }

    /// Returns the locally tracked task for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error when the key is not tracked.
    pub fn task(&self, key: TaskKey) -> Result<Arc<AllocatedTask>> {
        self.service
            .running()
            .get(key)
            .ok_or_else(|| eyre!("{key} is not tracked on {}", self.id.as_str()))
    }
}

/// Polls `condition` until it holds or two seconds elapse.
///
/// # Errors
///
/// Returns an error naming `description` on timeout.
pub async fn eventually(description: &str, mut condition: impl FnMut() -> bool) -> Result<()> {
    for _ in 0..400 {
        if condition() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    Err(eyre!("timed out waiting until {description}"))
}
