//! Reconciliation of coordinator snapshots against local execution.
//!
//! [`NodeTaskService::cluster_changed`] runs on the thread that delivers
//! coordinator state changes. It never awaits: business logic goes through
//! the [`TaskRunner`] and every coordinator call through the background
//! executor.

use super::{
    AgentConfig, CompletionNotifier, ExecutorRegistry, ExecutorRegistryError, LocalTaskManager,
    LocalTaskRegistry, RegistryError,
};
use crate::persistent::{
    domain::{ClusterChangedEvent, TaskDescriptor, TaskFailure, TaskKey, TaskState},
    ports::{BackgroundExecutor, CompletionHandler, CompletionListener, CoordinatorClient, TaskRunner},
};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;

/// Reasons a newly assigned allocation could not be started.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StartTaskError {
    /// No executor handles the task name.
    #[error(transparent)]
    Executor(#[from] ExecutorRegistryError),

    /// The allocation is already tracked locally.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// What a single reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    /// Allocations handed to the runner.
    pub started: Vec<TaskKey>,
    /// Acknowledged allocations retired from the registry.
    pub finished: Vec<TaskKey>,
    /// Orphaned allocations cancelled locally.
    pub cancelled: Vec<TaskKey>,
    /// Allocations whose completion report was resent.
    pub resent: Vec<TaskKey>,
    /// Allocations that could not be started.
    pub start_failures: Vec<(TaskKey, StartTaskError)>,
}

impl ReconciliationReport {
    /// Returns whether the pass changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.started.is_empty()
            && self.finished.is_empty()
            && self.cancelled.is_empty()
            && self.resent.is_empty()
            && self.start_failures.is_empty()
    }
}

/// Per-node agent that keeps local execution in line with coordinator
/// assignments.
pub struct NodeTaskService<C, R, K>
where
    C: CoordinatorClient + 'static,
    R: TaskRunner,
    K: Clock + Send + Sync + 'static,
{
    running: Arc<LocalTaskRegistry>,
    executors: Arc<ExecutorRegistry>,
    task_manager: Arc<LocalTaskManager<K>>,
    runner: Arc<R>,
    notifier: Arc<CompletionNotifier<C, K>>,
    background: Arc<dyn BackgroundExecutor>,
    config: AgentConfig,
}

impl<C, R, K> NodeTaskService<C, R, K>
where
    C: CoordinatorClient + 'static,
    R: TaskRunner,
    K: Clock + Send + Sync + 'static,
{
    /// Creates an agent with the default [`AgentConfig`].
    #[must_use]
    pub fn new(
        coordinator: Arc<C>,
        runner: Arc<R>,
        executors: ExecutorRegistry,
        background: Arc<dyn BackgroundExecutor>,
        clock: Arc<K>,
    ) -> Self {
        let running = Arc::new(LocalTaskRegistry::new());
        let task_manager = Arc::new(LocalTaskManager::new(clock));
        let notifier = Arc::new(CompletionNotifier::new(
            coordinator,
            Arc::clone(&background),
            Arc::clone(&task_manager),
            Arc::clone(&running),
        ));
        Self {
            running,
            executors: Arc::new(executors),
            task_manager,
            runner,
            notifier,
            background,
            config: AgentConfig::default(),
        }
    }

    /// Replaces the agent configuration.
    #[must_use]
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the agent configuration.
    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Returns the registry of locally tracked allocations.
    #[must_use]
    pub const fn running(&self) -> &Arc<LocalTaskRegistry> {
        &self.running
    }

    /// Returns the node-local task bookkeeping.
    #[must_use]
    pub const fn task_manager(&self) -> &Arc<LocalTaskManager<K>> {
        &self.task_manager
    }

    /// Returns the executor registry.
    #[must_use]
    pub const fn executors(&self) -> &Arc<ExecutorRegistry> {
        &self.executors
    }

    /// Reconciles local execution with the snapshot carried by `event`.
    ///
    /// Starts allocations newly assigned to this node, resends failed
    /// completion reports, retires acknowledged allocations and cancels
    /// the ones the coordinator no longer assigns here. Nothing is returned
    /// as an error; start failures are listed in the report.
    #[must_use]
    pub fn cluster_changed(&self, event: &ClusterChangedEvent) -> ReconciliationReport {
        let mut report = ReconciliationReport::default();
        if !event.tasks_or_nodes_changed() {
            return report;
        }

        let mut not_visited = self.running.keys();
        let local_node = event.local_node_id();
        let assigned = event
            .current()
            .into_iter()
            .flat_map(|tasks| tasks.tasks())
            .filter(|descriptor| descriptor.is_assigned_to(local_node));

        for descriptor in assigned {
            let key = descriptor.key();
            if let Some(task) = self.running.get(key) {
                not_visited.remove(&key);
                if task.state() == TaskState::FailedNotification
                    && self.notifier.restart_completion_notification(&task)
                {
                    report.resent.push(key);
                }
                continue;
            }
            match self.start_task(descriptor) {
                Ok(()) => report.started.push(key),
                Err(err) => {
                    tracing::warn!(
                        task_id = %key.id(),
                        allocation_id = %key.allocation_id(),
                        task_name = descriptor.task_name(),
                        error = %err,
                        "failed to start persistent task"
                    );
                    report.start_failures.push((key, err));
                }
            }
        }

        let mut orphaned: Vec<TaskKey> = not_visited.into_iter().collect();
        orphaned.sort_unstable();
        for key in orphaned {
            let Some(task) = self.running.get(key) else {
                continue;
            };
            match task.state() {
                TaskState::Notified | TaskState::Notifying => {
                    self.finish_task(key);
                    report.finished.push(key);
                }
                TaskState::FailedNotification => {
                    tracing::warn!(
                        task_id = %key.id(),
                        allocation_id = %key.allocation_id(),
                        "completion notification failed but the coordinator no longer lists the task"
                    );
                    self.finish_task(key);
                    report.finished.push(key);
                }
                _ => {
                    tracing::debug!(
                        task_id = %key.id(),
                        allocation_id = %key.allocation_id(),
                        state = %task.state(),
                        "task is no longer assigned to this node, cancelling"
                    );
                    self.cancel_task(key);
                    report.cancelled.push(key);
                }
            }
        }

        if !report.is_empty() {
            tracing::debug!(
                started = report.started.len(),
                finished = report.finished.len(),
                cancelled = report.cancelled.len(),
                resent = report.resent.len(),
                start_failures = report.start_failures.len(),
                "reconciled persistent tasks"
            );
        }
        report
    }

    /// Cancels every local task and stops accepting background work.
    ///
    /// Returns the keys that were still running and got cancelled.
    #[must_use]
    pub fn shutdown(&self) -> Vec<TaskKey> {
        let mut cancelled = Vec::new();
        for task in self.running.drain() {
            if task.mark_as_cancelled(self.config.shutdown_cancellation_reason.as_str()) {
                cancelled.push(task.key());
            } else if matches!(
                task.state(),
                TaskState::FailedNotification | TaskState::Notified
            ) {
                self.task_manager.unregister(&task);
            }
        }
        self.background.close();
        cancelled.sort_unstable();
        tracing::debug!(cancelled = cancelled.len(), "node task agent shut down");
        cancelled
    }

    fn start_task(&self, descriptor: &TaskDescriptor) -> Result<(), StartTaskError> {
        let executor = self.executors.resolve(descriptor.task_name())?;
        let task = self.task_manager.register(
            descriptor.key(),
            self.config.task_type.as_str(),
            self.config.action_for(descriptor.task_name()),
        );
        if let Err(err) = self.running.insert(Arc::clone(&task)) {
            self.task_manager.unregister(&task);
            return Err(err.into());
        }

        if !task.mark_started() {
            tracing::debug!(
                task = %task.key(),
                state = %task.state(),
                "task left the created state before it was started"
            );
        }
        let handler: Arc<dyn CompletionHandler> = self.notifier.clone();
        let listener = CompletionListener::new(Arc::clone(&task), handler);
        if let Err(err) = self.runner.execute(
            descriptor.request().clone(),
            Arc::clone(&task),
            executor,
            listener.clone(),
        ) {
            tracing::warn!(
                task = %task.key(),
                error = %err,
                "task runner rejected persistent task"
            );
            if !listener.on_failure(TaskFailure::rejected(&err)) {
                tracing::debug!(task = %task.key(), "runner already reported an outcome");
            }
        }
        Ok(())
    }

    fn finish_task(&self, key: TaskKey) {
        if let Some(task) = self.running.remove(key) {
            self.task_manager.unregister(&task);
        }
    }

    fn cancel_task(&self, key: TaskKey) {
        let Some(task) = self.running.remove(key) else {
            return;
        };
        if task.mark_as_cancelled(self.config.orphan_cancellation_reason.as_str()) {
            self.notifier.send_cancellation(&task);
        }
    }
}
