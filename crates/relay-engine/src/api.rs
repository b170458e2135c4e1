//! The in-process execution facade (§6.1): `Engine` is what an embedder
//! actually holds on to. It owns the shared connector registry, the
//! persistence and event-bus collaborators, and the table of currently
//! running executions that `cancelExecution`/`getExecutionStatus` act on
//! while `execute_workflow` may still be in flight on another task.
//!
//! Grounded on `crates/engine/src/engine.rs`'s top-level `Engine` struct:
//! same collaborator shape, but `running` holds `Arc<ExecutionContext>`
//! instead of raw `JoinHandle`s, since execution here runs cooperatively
//! inside the `execute_workflow` call rather than as a spawned task.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use relay_action::{ConnectorDefinition, ConnectorRegistry, ConnectorStatsSnapshot, HttpPort};
use relay_config::EngineConfig;
use relay_core::{ExecutionId, WorkflowId};
use relay_error::{CancelReason, RelayError};
use relay_eventbus::{ConnectionId, EventBus, EventKind, Subscription, HEARTBEAT_INTERVAL};
use relay_execution::ExecutionContext;
use relay_expression::{evaluate_template, test_expression, validate_expression, EvaluationContext};
use relay_workflow::WorkflowDefinition;
use serde_json::Value;

use crate::dispatcher::NodeDispatcher;
use crate::persistence::{ExecutionRecord, PersistencePort};
use crate::result::{ExecutionOutcome, ExecutionSnapshot, ExecutionStatus};
use crate::scheduler;

pub const DEFAULT_MAX_CONCURRENT_EXECUTIONS: usize = 100;

/// Per-call overrides (§6.1): a dry run skips side-effecting adapters (each
/// adapter is responsible for honoring `ctx.is_dry_run` itself), and a
/// `parent_execution_id` marks this as a sub-workflow invocation driven from
/// outside the dispatcher's own `subworkflow` node handling.
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    pub dry_run: bool,
    /// When `false`, lifecycle events are not published to the event bus —
    /// useful for callers that only want the blocking result and don't hold
    /// a subscriber. Node/variable/log events still accumulate on the
    /// context and remain visible through `execution_status`.
    pub real_time_monitoring: bool,
    pub parent_execution_id: Option<ExecutionId>,
    pub timeout: Option<Duration>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            real_time_monitoring: true,
            parent_execution_id: None,
            timeout: None,
        }
    }
}

struct RunningExecution {
    ctx: Arc<ExecutionContext>,
    workflow_id: WorkflowId,
    final_status: RwLock<Option<ExecutionStatus>>,
}

/// The engine facade (§6.1). Cheap to clone the `Arc`s it owns internally,
/// but the type itself is meant to be held behind a single shared `Arc<Engine>`
/// by the embedder rather than cloned.
pub struct Engine {
    connectors: Arc<ConnectorRegistry>,
    persistence: Arc<dyn PersistencePort>,
    events: Arc<EventBus>,
    dispatcher: NodeDispatcher,
    parallelism_cap: usize,
    max_concurrent_executions: usize,
    in_flight_executions: AtomicUsize,
    running: RwLock<HashMap<ExecutionId, RunningExecution>>,
}

impl Engine {
    /// Builds an engine with defaults loaded from `RELAY_*` environment
    /// variables (falling back to [`EngineConfig::default`] if the
    /// environment can't be parsed — an embedder that wants to fail hard on
    /// a bad environment should call [`Self::with_config`] with
    /// `EngineConfig::from_env()?` itself instead).
    #[must_use]
    pub fn new(persistence: Arc<dyn PersistencePort>, http: Arc<dyn HttpPort>) -> Self {
        let config = EngineConfig::from_env().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default engine config");
            EngineConfig::default()
        });
        Self::with_config(persistence, http, config)
    }

    /// Builds an engine from an explicit [`EngineConfig`] (§4.3, §4.5,
    /// §6.1), bypassing environment loading entirely.
    #[must_use]
    pub fn with_config(persistence: Arc<dyn PersistencePort>, http: Arc<dyn HttpPort>, config: EngineConfig) -> Self {
        let connectors = Arc::new(ConnectorRegistry::new());
        let events = Arc::new(EventBus::new());
        Self {
            dispatcher: NodeDispatcher::new(
                Arc::clone(&connectors),
                http,
                Arc::clone(&persistence),
                Arc::clone(&events),
                config,
            ),
            connectors,
            persistence,
            events,
            parallelism_cap: config.max_parallel_branches,
            max_concurrent_executions: config.max_concurrent_executions,
            in_flight_executions: AtomicUsize::new(0),
            running: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_parallelism_cap(mut self, cap: usize) -> Self {
        self.parallelism_cap = cap.max(1);
        self
    }

    #[must_use]
    pub fn with_max_concurrent_executions(mut self, limit: usize) -> Self {
        self.max_concurrent_executions = limit.max(1);
        self
    }

    /// Runs `def` to completion (§6.1). Validates structurally first and
    /// fails fast without starting any node if that fails. Blocks until the
    /// execution reaches a terminal state; concurrent callers can still
    /// cancel it or poll its status via the execution id returned inside
    /// the outcome once node execution has begun.
    pub async fn execute_workflow(
        &self,
        def: WorkflowDefinition,
        input: Value,
        options: ExecuteOptions,
    ) -> Result<ExecutionOutcome, RelayError> {
        let report = relay_workflow::validate(&def);
        if !report.ok {
            return Err(RelayError::validation(report.errors.join("; ")));
        }

        if self.in_flight_executions.fetch_add(1, Ordering::SeqCst) >= self.max_concurrent_executions {
            self.in_flight_executions.fetch_sub(1, Ordering::SeqCst);
            return Err(RelayError::capacity_exceeded(
                self.max_concurrent_executions,
                self.max_concurrent_executions,
            ));
        }

        let execution_id = ExecutionId::v4();
        let mut ctx = ExecutionContext::new(execution_id, def.id);
        if options.dry_run {
            ctx = ctx.dry_run();
        }
        let ctx = Arc::new(ctx);

        self.running.write().insert(
            execution_id,
            RunningExecution {
                ctx: Arc::clone(&ctx),
                workflow_id: def.id,
                final_status: RwLock::new(None),
            },
        );

        self.persistence
            .create_execution(ExecutionRecord {
                execution_id,
                workflow_id: def.id,
                status: ExecutionStatus::Running,
                output: None,
                error: None,
                metrics: ctx.counters(),
            })
            .await?;
        if options.real_time_monitoring {
            self.events.publish(execution_id, EventKind::ExecutionStarted, None, None);
        }

        // Idle subscribers need a heartbeat even while no node event fires
        // (§4.7); ticked from its own task so a slow node doesn't delay it,
        // stopped as soon as the run below returns.
        let heartbeat_stop = Arc::new(tokio::sync::Notify::new());
        let heartbeat_task = options.real_time_monitoring.then(|| {
            let events = Arc::clone(&self.events);
            let stop = Arc::clone(&heartbeat_stop);
            let interval = HEARTBEAT_INTERVAL.to_std().unwrap_or(Duration::from_secs(30));
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        () = stop.notified() => break,
                        () = tokio::time::sleep(interval) => {
                            events.heartbeat_tick(execution_id);
                        }
                    }
                }
            })
        });

        // A deadline doesn't abort `run_workflow` by dropping it (that would skip the
        // scheduler's own cooperative-drain-on-cancel path); instead it marks the
        // context cancelled and keeps polling the same future so it exits the way a
        // user cancellation would.
        let run_fut = scheduler::run_workflow(&def, &ctx, &input, &self.dispatcher, self.parallelism_cap);
        let run_result = if let Some(timeout) = options.timeout {
            tokio::pin!(run_fut);
            tokio::select! {
                res = &mut run_fut => res,
                () = tokio::time::sleep(timeout) => {
                    ctx.cancel(CancelReason::ExecutionTimeout);
                    run_fut.await
                }
            }
        } else {
            run_fut.await
        };

        heartbeat_stop.notify_one();
        if let Some(task) = heartbeat_task {
            let _ = task.await;
        }

        self.in_flight_executions.fetch_sub(1, Ordering::SeqCst);

        let outcome = match run_result {
            Ok(node_results) => {
                let output = scheduler_merge(&def, &node_results);
                self.finish(
                    execution_id,
                    ExecutionStatus::Completed,
                    Some(output.clone()),
                    None,
                    &ctx,
                    options.real_time_monitoring,
                )
                .await;
                ExecutionOutcome {
                    execution_id,
                    status: ExecutionStatus::Completed,
                    result: Some(output),
                    error: None,
                    metrics: ctx.counters(),
                }
            }
            Err((_node_id, err)) => {
                let public = err.to_public();
                let status = if ctx.cancel_reason() == Some(CancelReason::UserCancelled) {
                    ExecutionStatus::Cancelled
                } else {
                    ExecutionStatus::Failed
                };
                self.finish(
                    execution_id,
                    status,
                    None,
                    Some(public.clone()),
                    &ctx,
                    options.real_time_monitoring,
                )
                .await;
                ExecutionOutcome {
                    execution_id,
                    status,
                    result: None,
                    error: Some(public),
                    metrics: ctx.counters(),
                }
            }
        };

        if let Some(running) = self.running.read().get(&execution_id) {
            *running.final_status.write() = Some(outcome.status);
        }

        Ok(outcome)
    }

    async fn finish(
        &self,
        execution_id: ExecutionId,
        status: ExecutionStatus,
        output: Option<Value>,
        error: Option<relay_error::PublicError>,
        ctx: &ExecutionContext,
        real_time_monitoring: bool,
    ) {
        let kind = match status {
            ExecutionStatus::Completed => EventKind::ExecutionCompleted,
            ExecutionStatus::Failed => EventKind::ExecutionFailed,
            ExecutionStatus::Cancelled => EventKind::ExecutionCancelled,
            ExecutionStatus::Running => return,
        };
        let _ = self
            .persistence
            .complete_execution(execution_id, status, output.clone(), error.clone(), ctx.counters())
            .await;
        let _ = self
            .persistence
            .append_execution_log(execution_id, ctx.logs_snapshot())
            .await;
        if real_time_monitoring {
            self.events.publish(
                execution_id,
                kind,
                None,
                Some(serde_json::json!({"output": output, "error": error})),
            );
        }
    }

    /// Requests cooperative cancellation of a running execution (§6.1).
    /// Errors if the execution id isn't currently tracked.
    pub fn cancel_execution(&self, execution_id: ExecutionId) -> Result<(), RelayError> {
        let running = self.running.read();
        let entry = running
            .get(&execution_id)
            .ok_or_else(|| RelayError::validation(format!("no running execution '{execution_id}'")))?;
        entry.ctx.cancel(CancelReason::UserCancelled);
        Ok(())
    }

    /// A point-in-time snapshot of an execution's node states and results
    /// (§4.6). Available for as long as the engine keeps the execution in
    /// its `running` table, which today is for the process's lifetime.
    pub fn execution_status(&self, execution_id: ExecutionId) -> Result<ExecutionSnapshot, RelayError> {
        let running = self.running.read();
        let entry = running
            .get(&execution_id)
            .ok_or_else(|| RelayError::validation(format!("no execution '{execution_id}'")))?;

        let status = (*entry.final_status.read()).unwrap_or(ExecutionStatus::Running);
        Ok(ExecutionSnapshot {
            execution_id,
            workflow_id: entry.workflow_id,
            status,
            node_states: entry.ctx.node_states_snapshot(),
            node_results: entry.ctx.node_results_snapshot(),
            started_at: entry.ctx.started_at,
            duration_ms: entry.ctx.duration().num_milliseconds(),
            metrics: entry.ctx.counters(),
        })
    }

    pub fn subscribe(&self, execution_id: ExecutionId, connection_id: ConnectionId, since_sequence: u64) -> Subscription {
        self.events.subscribe(execution_id, connection_id, since_sequence)
    }

    pub fn unsubscribe(&self, execution_id: ExecutionId, connection_id: &ConnectionId) {
        self.events.unsubscribe(execution_id, connection_id);
    }

    pub fn register_connector(&self, definition: ConnectorDefinition) -> Result<(), RelayError> {
        self.connectors.register(definition)
    }

    pub fn connector(&self, connector_type: &str) -> Option<Arc<ConnectorDefinition>> {
        self.connectors.get(connector_type)
    }

    pub fn list_connectors(&self) -> Vec<String> {
        self.connectors.list()
    }

    pub fn connector_statistics(&self, connector_type: &str) -> Option<ConnectorStatsSnapshot> {
        self.connectors.statistics(connector_type)
    }

    pub fn validate_expression(&self, source: &str) -> relay_expression::ValidationResult {
        validate_expression(source)
    }

    pub fn test_expression(&self, source: &str, vars: HashMap<String, Value>) -> relay_expression::ValidationResult {
        let mut ctx = EvaluationContext::default();
        for (name, value) in vars {
            ctx.set_execution_var(name, value);
        }
        test_expression(source, &ctx)
    }

    pub fn evaluate_template(&self, template: &str, vars: HashMap<String, Value>) -> String {
        let mut ctx = EvaluationContext::default();
        for (name, value) in vars {
            ctx.set_execution_var(name, value);
        }
        evaluate_template(template, &ctx)
    }
}

fn scheduler_merge(
    def: &WorkflowDefinition,
    node_results: &HashMap<relay_core::NodeId, Value>,
) -> Value {
    crate::scheduler::merge_exit_outputs(def, node_results)
}
