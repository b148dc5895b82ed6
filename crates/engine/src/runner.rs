// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner core: orchestrates a run from dispatch to finalization.
//!
//! The runner owns the completion judgment. Executors report what they
//! did; only verified files, recorded evidence and the sentinel's gates
//! decide what COMPLETE means. Every task is sealed with exactly one
//! terminal log record — success and failure alike.

use crate::clarify::{triage, ClarificationReason, ClarificationSignal};
use crate::config::{load_project_config, ConfigError, RunnerOptions};
use crate::lifecycle::{LifecycleController, LifecycleError};
use crate::mediation::{
    DeterministicMediator, FollowUpAction, LlmMediator, MediationError, Mediator,
};
use crate::pool::{L1Pool, L2Pool, PoolError};
use crate::prompt::{assemble_prompt, PromptParts};
use chrono::{DateTime, Utc};
use pmo_core::{
    mask, ErrorKind, EventId, ExecutorMeta, Limits, LlmCallId, OverallStatus, Phase, RunId,
    SessionId, SessionRecord, SessionStatus, TaskEntry, TaskEventType, TaskId, TaskSpec,
    TaskStatus, TaskType, ThreadId, ThreadType,
};
use pmo_core::{Clock, Event, EventSource, SystemClock};
use pmo_evidence::{CallOutcome, EvidenceError, EvidenceManager, Sentinel, SentinelReason};
use pmo_executor::{
    select_executor, ExecStatus, Executor, ExecutorError, ExecutorKind, ExecutorResult,
    ExecutorTask, LlmClient, SelectError, Selection,
};
use pmo_storage::{
    AtomicWriter, Dal, EventStore, EventStoreConfig, EventStoreError, RunnerState, SessionRow,
    StateError, StateStore, TaskCompletion, TaskLogError, TaskLogManager,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Errors surfaced by the runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("target project is not a directory: {0}")]
    ProjectPathInvalid(PathBuf),
    #[error("runner has no active session")]
    NotInitialized,
    #[error("runner already has an active session")]
    AlreadyInitialized,
    #[error("session cancelled; dispatch refused")]
    SessionCancelled,
    #[error("task {0} is not awaiting a response")]
    NotAwaiting(TaskId),
    #[error("no user response handler configured")]
    NoResponseHandler,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Select(#[from] SelectError),
    #[error(transparent)]
    TaskLog(#[from] TaskLogError),
    #[error(transparent)]
    Events(#[from] EventStoreError),
    #[error(transparent)]
    Evidence(#[from] EvidenceError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    #[error(transparent)]
    Mediation(#[from] MediationError),
}

impl RunnerError {
    /// Classification for callers that branch on kind, not type.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RunnerError::ProjectPathInvalid(_)
            | RunnerError::NotInitialized
            | RunnerError::AlreadyInitialized
            | RunnerError::NotAwaiting(_)
            | RunnerError::NoResponseHandler
            | RunnerError::Config(_)
            | RunnerError::Select(_)
            | RunnerError::Lifecycle(_) => ErrorKind::Configuration,
            RunnerError::SessionCancelled => ErrorKind::ExecutorFault,
            RunnerError::TaskLog(e) => e.kind(),
            RunnerError::Events(_) | RunnerError::State(_) => ErrorKind::Persistence,
            RunnerError::Evidence(_) => ErrorKind::EvidenceGap,
            RunnerError::Pool(PoolError::Lock(_)) => ErrorKind::LockConflict,
            RunnerError::Pool(_) => ErrorKind::ResourceLimit,
            RunnerError::Executor(_) => ErrorKind::ExecutorFault,
            RunnerError::Mediation(_) => ErrorKind::ExecutorFault,
        }
    }
}

/// Terminal (or parked) outcome of one task dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutcome {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub response_summary: Option<String>,
    pub error_message: Option<String>,
    pub clarification: Option<ClarificationSignal>,
    pub evidence_ref: Option<String>,
}

/// Aggregate result of an `execute` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteReport {
    pub overall: OverallStatus,
    pub outcomes: Vec<TaskOutcome>,
}

struct SessionCtx {
    session_id: SessionId,
    target_project: PathBuf,
    thread_id: ThreadId,
    run_id: RunId,
    task_logs: TaskLogManager,
    events: EventStore,
    evidence: EvidenceManager,
    dal: Dal,
    state_store: StateStore,
    executor: Arc<dyn Executor>,
    executor_kind: ExecutorKind,
    lifecycle: LifecycleController,
    l1: L1Pool,
    l2: L2Pool,
    limits: Limits,
    evidence_refs: Vec<LlmCallId>,
    awaiting: HashMap<TaskId, ClarificationSignal>,
    asserted: Option<OverallStatus>,
    cancelled: bool,
    halted: bool,
}

/// A prepared dispatch: either already settled, or ready to invoke.
struct Prepared {
    spec: TaskSpec,
    task_id: TaskId,
    exec_task: Option<ExecutorTask>,
    settled: Option<TaskOutcome>,
}

/// The runner. One active session at a time; a single orchestrator task
/// drives it, which is what serializes session mutation.
pub struct Runner<C: Clock + 'static = SystemClock> {
    options: RunnerOptions,
    clock: C,
    writer: AtomicWriter,
    ctx: Option<SessionCtx>,
}

impl Runner<SystemClock> {
    pub fn new(options: RunnerOptions) -> Self {
        Self::with_clock(options, SystemClock)
    }
}

impl<C: Clock + 'static> Runner<C> {
    pub fn with_clock(options: RunnerOptions, clock: C) -> Self {
        Self {
            options,
            clock,
            writer: AtomicWriter::new(),
            ctx: None,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.timestamp()
    }

    fn ctx(&self) -> Result<&SessionCtx, RunnerError> {
        self.ctx.as_ref().ok_or(RunnerError::NotInitialized)
    }

    fn ctx_mut(&mut self) -> Result<&mut SessionCtx, RunnerError> {
        self.ctx.as_mut().ok_or(RunnerError::NotInitialized)
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.ctx.as_ref().map(|ctx| &ctx.session_id)
    }

    pub fn executor_name(&self) -> Option<String> {
        self.ctx.as_ref().map(|ctx| ctx.executor.name().to_string())
    }

    // --- session lifecycle ---

    /// Verify the project, create the session tree, select an executor
    /// and open the main thread and first run.
    pub async fn initialize(&mut self, target_project: &Path) -> Result<SessionId, RunnerError> {
        if self.ctx.is_some() {
            return Err(RunnerError::AlreadyInitialized);
        }
        if !target_project.is_dir() {
            return Err(RunnerError::ProjectPathInvalid(target_project.to_path_buf()));
        }
        let target_project = target_project
            .canonicalize()
            .unwrap_or_else(|_| target_project.to_path_buf());

        let project_config = load_project_config(&target_project)?;
        let limits = project_config.limits;
        let at = self.now();

        let session_id = SessionId::generate(&self.clock);
        let mut session = SessionRecord::new(session_id.clone(), target_project.clone(), at);
        session.config = self.options.snapshot();
        session.current_phase = Some(Phase::RequirementAnalysis);

        let task_logs = TaskLogManager::new(&target_project, self.writer.clone());
        task_logs.initialize_session(&session)?;

        let thread = task_logs.create_thread(&session_id, ThreadType::Main, at)?;
        let run = task_logs.create_run(&session_id, &thread.thread_id, at)?;

        let evidence_dir = self
            .options
            .evidence_dir
            .clone()
            .unwrap_or_else(|| target_project.join(".claude").join("evidence"));
        std::fs::create_dir_all(&evidence_dir).map_err(TaskLogError::from)?;
        let evidence = EvidenceManager::new(evidence_dir, self.writer.clone());

        // Admission-time clamp of the executor wall clock.
        let max_ms = limits.max_seconds * 1_000;
        let timeout_ms = match self.options.claude_code_timeout_ms {
            Some(ms) if ms > max_ms => {
                let violation = limits
                    .check_seconds(ms / 1_000, at)
                    .unwrap_or_else(|| pmo_core::LimitViolation {
                        limit: "max_seconds".to_string(),
                        actual: ms / 1_000,
                        max: limits.max_seconds,
                        at,
                    });
                task_logs.update_session(&session_id, |s| s.record_violation(violation))?;
                Some(max_ms)
            }
            Some(ms) => Some(ms),
            None => Some(max_ms),
        };

        let requested = (std::env::var(pmo_executor::select::RECOVERY_MODE_ENV).as_deref()
            == Ok("recovery-stub"))
        .then_some(ExecutorKind::RecoveryStub);
        let (executor, executor_kind) = select_executor(
            Selection {
                use_claude_code: self.options.use_claude_code,
                claude_command: self.options.claude_command.clone(),
                claude_timeout_ms: timeout_ms,
                provider: self.options.auto_resolve_llm_provider,
                model: self.options.model.clone(),
                requested,
                injected: self.options.executor.clone(),
            },
            &evidence,
            self.clock.clone(),
        )?;
        info!(session = %session_id, executor = %executor_kind, "session initialized");

        let events = EventStore::new(EventStoreConfig {
            dir: target_project.join(".claude").join("logs").join("events"),
            cache_capacity: self.options.event_cache_capacity,
        });
        let dal = Dal::new(&target_project, self.writer.clone());
        dal.upsert_session(&SessionRow {
            session_id: session_id.as_str().to_string(),
            project_id: target_project.display().to_string(),
            status: SessionStatus::Initialized,
            started_at: at,
            overall: None,
        })
        .ok();

        let ctx = SessionCtx {
            session_id: session_id.clone(),
            target_project: target_project.clone(),
            thread_id: thread.thread_id,
            run_id: run.run_id,
            task_logs,
            events,
            evidence,
            dal,
            state_store: StateStore::new(&target_project, self.writer.clone()),
            executor,
            executor_kind,
            lifecycle: LifecycleController::new(),
            l1: L1Pool::new(self.options.pool.l1_capacity, self.options.pool.l1_queueing),
            l2: L2Pool::new(&self.options.pool),
            limits,
            evidence_refs: Vec::new(),
            awaiting: HashMap::new(),
            asserted: None,
            cancelled: false,
            halted: false,
        };
        self.ctx = Some(ctx);
        self.record_session_event("session initialized", json!({"executor": executor_kind.to_string()}))?;
        Ok(session_id)
    }

    /// Rebuild a session from its on-disk record and saved state.
    /// Returns the tasks that were pending when the state was saved.
    pub async fn resume(
        &mut self,
        project_root: &Path,
        session_id: &SessionId,
    ) -> Result<Vec<TaskSpec>, RunnerError> {
        if self.ctx.is_some() {
            return Err(RunnerError::AlreadyInitialized);
        }
        // The project's session registry must know this session.
        let probe = TaskLogManager::new(project_root, self.writer.clone());
        let target_project = probe
            .list_sessions()
            .into_iter()
            .find(|entry| &entry.session_id == session_id)
            .map(|entry| entry.target_project)
            .ok_or_else(|| RunnerError::TaskLog(TaskLogError::UnknownSession(session_id.clone())))?;

        let task_logs = TaskLogManager::new(&target_project, self.writer.clone());
        let state_store = StateStore::new(&target_project, self.writer.clone());
        let state = state_store.load(session_id)?;
        let session = task_logs.load_session(session_id)?;
        let limits = load_project_config(&target_project)?.limits;

        let at = self.now();
        let thread_id = session
            .threads
            .first()
            .map(|t| t.thread_id.clone())
            .ok_or_else(|| RunnerError::TaskLog(TaskLogError::UnknownSession(session_id.clone())))?;
        // A resumed session continues in a fresh run.
        let run = task_logs.create_run(session_id, &thread_id, at)?;

        let evidence_dir = self
            .options
            .evidence_dir
            .clone()
            .unwrap_or_else(|| target_project.join(".claude").join("evidence"));
        let evidence = EvidenceManager::new(evidence_dir, self.writer.clone());
        let (executor, executor_kind) = select_executor(
            Selection {
                use_claude_code: self.options.use_claude_code,
                claude_command: self.options.claude_command.clone(),
                claude_timeout_ms: self.options.claude_code_timeout_ms,
                provider: self.options.auto_resolve_llm_provider,
                model: self.options.model.clone(),
                requested: None,
                injected: self.options.executor.clone(),
            },
            &evidence,
            self.clock.clone(),
        )?;

        task_logs.update_session(session_id, |s| s.status = SessionStatus::Running)?;
        info!(session = %session_id, executor = %state.executor, "session resumed");

        self.ctx = Some(SessionCtx {
            session_id: session_id.clone(),
            target_project: target_project.clone(),
            thread_id,
            run_id: run.run_id,
            task_logs,
            events: EventStore::new(EventStoreConfig {
                dir: target_project.join(".claude").join("logs").join("events"),
                cache_capacity: self.options.event_cache_capacity,
            }),
            evidence,
            dal: Dal::new(&target_project, self.writer.clone()),
            state_store,
            executor,
            executor_kind,
            lifecycle: LifecycleController::new(),
            l1: L1Pool::new(self.options.pool.l1_capacity, self.options.pool.l1_queueing),
            l2: L2Pool::new(&self.options.pool),
            limits,
            evidence_refs: Vec::new(),
            awaiting: HashMap::new(),
            asserted: None,
            cancelled: false,
            halted: false,
        });
        self.record_session_event("session resumed", Value::Null)?;
        Ok(state.pending_tasks)
    }

    /// Snapshot the session for a later `resume`.
    pub fn save_state(&mut self, pending_tasks: Vec<TaskSpec>) -> Result<(), RunnerError> {
        let at = self.now();
        let ctx = self.ctx()?;
        let session = ctx.task_logs.load_session(&ctx.session_id)?;
        ctx.state_store.save(&RunnerState {
            session,
            pending_tasks,
            executor: ctx.executor_kind.to_string(),
            saved_at: at,
        })?;
        Ok(())
    }

    /// Advance the session phase, attaching evidence.
    pub fn advance_phase(
        &mut self,
        evidence: Value,
        status: &str,
    ) -> Result<Option<Phase>, RunnerError> {
        let at = self.now();
        let ctx = self.ctx_mut()?;
        let next = ctx.lifecycle.complete_current_phase(evidence, status, at)?;
        ctx.task_logs
            .update_session(&ctx.session_id, |s| s.current_phase = next)?;
        Ok(next)
    }

    /// Explicitly acquire an L2 slot for an executor; fails when the
    /// pool is saturated.
    pub fn acquire_executor(&mut self, executor_id: &str) -> Result<(), RunnerError> {
        let at = self.now();
        let now = self.clock.now();
        let ctx = self.ctx()?;
        ctx.l2.acquire(executor_id, &[], at, now)?;
        Ok(())
    }

    pub fn release_executor(&mut self, executor_id: &str) -> Result<bool, RunnerError> {
        Ok(self.ctx()?.l2.release(executor_id))
    }

    /// Refuse all further dispatch; in-flight tasks run to their next
    /// terminal state.
    pub fn cancel(&mut self) -> Result<(), RunnerError> {
        self.ctx_mut()?.cancelled = true;
        Ok(())
    }

    /// Explicitly pin the session verdict (NO_EVIDENCE / INVALID).
    pub fn assert_overall(&mut self, status: OverallStatus) -> Result<(), RunnerError> {
        self.ctx_mut()?.asserted = Some(status);
        Ok(())
    }

    // --- execution ---

    /// Run the task DAG respecting declared dependencies.
    pub async fn execute(
        &mut self,
        tasks: Vec<TaskSpec>,
        selected_model: Option<String>,
    ) -> Result<ExecuteReport, RunnerError> {
        self.execute_with_dependencies(tasks, selected_model).await
    }

    /// Run tasks one after another in the given order.
    pub async fn execute_sequentially(
        &mut self,
        tasks: Vec<TaskSpec>,
        selected_model: Option<String>,
    ) -> Result<ExecuteReport, RunnerError> {
        self.mark_running()?;
        let mut outcomes = Vec::new();
        for spec in tasks {
            if self.ctx()?.halted || self.ctx()?.cancelled {
                break;
            }
            outcomes.push(self.execute_task(spec, selected_model.clone(), None).await?);
        }
        self.report(outcomes)
    }

    /// Run independent tasks concurrently, bounded by the pools. Tasks
    /// whose lock paths overlap serialize by grant order across batches.
    pub async fn execute_parallel(
        &mut self,
        tasks: Vec<TaskSpec>,
        selected_model: Option<String>,
    ) -> Result<ExecuteReport, RunnerError> {
        self.mark_running()?;
        let mut outcomes = Vec::new();
        let mut pending = Vec::new();
        for spec in tasks {
            if self.ctx()?.halted || self.ctx()?.cancelled {
                break;
            }
            let mut prepared = self.prepare_task(spec, selected_model.clone(), None).await?;
            match prepared.settled.take() {
                Some(outcome) => outcomes.push(outcome),
                None => pending.push(prepared),
            }
        }

        while !pending.is_empty() {
            self.sweep_stale_workers();
            let mut launched: Vec<Prepared> = Vec::new();
            let mut deferred = Vec::new();
            let mut joins: JoinSet<(usize, Result<ExecutorResult, ExecutorError>)> =
                JoinSet::new();

            for prepared in pending.drain(..) {
                match self.admit(&prepared) {
                    Ok(()) => {
                        let idx = launched.len();
                        let executor = self.ctx()?.executor.clone();
                        let exec_task = prepared
                            .exec_task
                            .clone()
                            .ok_or(RunnerError::NotInitialized)?;
                        joins.spawn(async move { (idx, executor.execute(exec_task).await) });
                        launched.push(prepared);
                    }
                    Err(RunnerError::Pool(PoolError::Lock(_)))
                    | Err(RunnerError::Pool(PoolError::Saturated { .. })) => {
                        deferred.push(prepared)
                    }
                    Err(e) => return Err(e),
                }
            }
            if launched.is_empty() && !deferred.is_empty() {
                // No slot ever freed: settle the rest as errors.
                for prepared in deferred.drain(..) {
                    let outcome = self
                        .seal(
                            &prepared.task_id,
                            TaskStatus::Error,
                            TaskCompletion {
                                status: Some(TaskStatus::Error),
                                error_message: Some("pool admission failed".to_string()),
                                ..TaskCompletion::default()
                            },
                            None,
                        )
                        .await?;
                    outcomes.push(outcome);
                }
                break;
            }

            let mut results: Vec<Option<Result<ExecutorResult, ExecutorError>>> =
                (0..launched.len()).map(|_| None).collect();
            while let Some(joined) = joins.join_next().await {
                match joined {
                    Ok((idx, result)) => results[idx] = Some(result),
                    Err(e) => warn!(error = %e, "executor join failed"),
                }
            }
            for (prepared, result) in launched.into_iter().zip(results.into_iter()) {
                self.release_pools(&prepared.task_id);
                let result = result
                    .unwrap_or_else(|| Ok(ExecutorResult::error("executor task vanished")));
                outcomes.push(self.finalize_task(&prepared, result).await?);
            }
            pending = deferred;
        }
        self.report(outcomes)
    }

    /// Run the DAG in dependency waves; a task whose dependency did not
    /// complete is sealed as ERROR without invoking the executor.
    pub async fn execute_with_dependencies(
        &mut self,
        tasks: Vec<TaskSpec>,
        selected_model: Option<String>,
    ) -> Result<ExecuteReport, RunnerError> {
        self.mark_running()?;
        let mut outcomes = Vec::new();
        let mut remaining = tasks;
        let mut terminal: HashMap<String, TaskStatus> = HashMap::new();

        while !remaining.is_empty() {
            if self.ctx()?.halted || self.ctx()?.cancelled {
                break;
            }
            self.sweep_stale_workers();
            let (ready, blocked): (Vec<TaskSpec>, Vec<TaskSpec>) = remaining
                .drain(..)
                .partition(|spec| spec.dependencies.iter().all(|dep| terminal.contains_key(dep)));

            if ready.is_empty() {
                // Unresolvable dependencies: cycle or references to
                // tasks that are not part of this request.
                for spec in blocked {
                    let outcome = self
                        .settle_without_executor(
                            &spec,
                            TaskStatus::Error,
                            Some("unresolvable dependency".to_string()),
                        )
                        .await?;
                    record_terminal(&mut terminal, &spec, &outcome);
                    outcomes.push(outcome);
                }
                break;
            }

            for spec in ready {
                if self.ctx()?.halted || self.ctx()?.cancelled {
                    break;
                }
                let failed_dep = spec
                    .dependencies
                    .iter()
                    .find(|dep| terminal.get(*dep) != Some(&TaskStatus::Completed));
                let outcome = if let Some(dep) = failed_dep {
                    self.settle_without_executor(
                        &spec,
                        TaskStatus::Error,
                        Some(format!("dependency {dep} did not complete")),
                    )
                    .await?
                } else {
                    self.execute_task(spec.clone(), selected_model.clone(), None)
                        .await?
                };
                record_terminal(&mut terminal, &spec, &outcome);
                outcomes.push(outcome);
            }
            remaining = blocked;
        }
        self.report(outcomes)
    }

    /// Dispatch one task through the full per-task algorithm.
    pub async fn execute_task(
        &mut self,
        spec: TaskSpec,
        selected_model: Option<String>,
        parent: Option<TaskId>,
    ) -> Result<TaskOutcome, RunnerError> {
        let mut prepared = self.prepare_task(spec, selected_model, parent).await?;
        if let Some(outcome) = prepared.settled.take() {
            return Ok(outcome);
        }
        self.admit(&prepared)?;
        let exec_task = prepared
            .exec_task
            .clone()
            .ok_or(RunnerError::NotInitialized)?;
        let executor = self.ctx()?.executor.clone();
        info!(task = %prepared.task_id, executor = executor.name(), "dispatching");
        let result = executor.execute(exec_task).await;
        self.release_pools(&prepared.task_id);
        self.finalize_task(&prepared, result).await
    }

    /// Convert a user's clarification response into a follow-up task and
    /// run it. The original task seals INCOMPLETE; the follow-up shares
    /// its thread and names it as parent.
    pub async fn submit_response(
        &mut self,
        task_id: &TaskId,
        user_response: &str,
    ) -> Result<Option<TaskOutcome>, RunnerError> {
        let signal = self
            .ctx_mut()?
            .awaiting
            .remove(task_id)
            .ok_or_else(|| RunnerError::NotAwaiting(task_id.clone()))?;

        let follow_up = self
            .mediator()?
            .normalize(&signal, user_response)
            .await?;

        self.seal(
            task_id,
            TaskStatus::Incomplete,
            TaskCompletion {
                status: Some(TaskStatus::Incomplete),
                error_message: None,
                response_summary: Some(format!(
                    "clarified: {:?}",
                    follow_up.action
                )),
                ..TaskCompletion::default()
            },
            Some(&signal),
        )
        .await?;

        if follow_up.action == FollowUpAction::Cancel {
            return Ok(None);
        }
        let mut spec = TaskSpec::new(follow_up.explicit_prompt);
        if let Some(target) = &follow_up.target_file {
            spec.lock_paths = vec![target.clone()];
        }
        let outcome = self
            .execute_task(spec, None, Some(task_id.clone()))
            .await?;
        Ok(Some(outcome))
    }

    // --- finalization ---

    /// Freeze the session with its verdict. `failed` forces FAILED.
    pub async fn complete_session(&mut self, failed: bool) -> Result<OverallStatus, RunnerError> {
        let at = self.now();
        let ctx = self.ctx()?;
        let session = ctx.task_logs.load_session(&ctx.session_id)?;
        let entries = ctx.task_logs.get_task_list(&ctx.session_id)?;
        let statuses: Vec<TaskStatus> = entries.iter().map(|entry| entry.status).collect();

        let mut overall = if let Some(asserted) = ctx.asserted {
            asserted
        } else if failed || ctx.cancelled {
            OverallStatus::Error
        } else {
            OverallStatus::aggregate(&statuses)
        };

        // The fail-closed gate: COMPLETE requires evidence integrity.
        if overall == OverallStatus::Complete {
            let provider = self.options.auto_resolve_llm_provider;
            let refs = ctx.evidence_refs.clone();
            let verdict = Sentinel::new(&ctx.evidence, provider).verify(&refs);
            if !verdict.can_assert_complete {
                warn!(reasons = ?verdict.reasons, "sentinel refused COMPLETE");
                overall = sentinel_fallback(&verdict.reasons);
                self.record_session_event(
                    "sentinel refused COMPLETE",
                    serde_json::to_value(&verdict.reasons).unwrap_or(Value::Null),
                )?;
            }
        }

        let ctx = self.ctx()?;
        let session_status = match overall {
            OverallStatus::Complete | OverallStatus::Incomplete => SessionStatus::Completed,
            _ => SessionStatus::Failed,
        };
        let session_status = if failed { SessionStatus::Failed } else { session_status };
        let run_status = if ctx.cancelled {
            pmo_core::RunStatus::Cancelled
        } else if session_status == SessionStatus::Failed {
            pmo_core::RunStatus::Failed
        } else {
            pmo_core::RunStatus::Completed
        };
        let run_id = ctx.run_id.clone();
        ctx.task_logs.update_session(&ctx.session_id, |session| {
            session.finish_run(&run_id, run_status, at);
        })?;
        ctx.task_logs
            .set_session_status(&ctx.session_id, session_status)?;
        ctx.dal
            .upsert_session(&SessionRow {
                session_id: ctx.session_id.as_str().to_string(),
                project_id: ctx.target_project.display().to_string(),
                status: session_status,
                started_at: session.started_at,
                overall: Some(overall),
            })
            .ok();
        if let Some(run) = session.run(&run_id) {
            ctx.dal
                .upsert_run(&pmo_storage::RunRow {
                    run_id: run_id.as_str().to_string(),
                    session_id: ctx.session_id.as_str().to_string(),
                    status: run_status,
                    started_at: run.started_at,
                    finished_at: Some(at),
                })
                .ok();
        }
        info!(session = %ctx.session_id, overall = %overall, "session completed");
        self.record_session_event("session completed", json!({"overall": overall}))?;
        Ok(overall)
    }

    /// Flush tracked writes and drop the session context.
    pub async fn shutdown(&mut self) -> Result<(), RunnerError> {
        if self.ctx.is_some() {
            self.record_session_event("session shutdown", Value::Null)?;
        }
        self.writer.flush_all().await;
        self.ctx = None;
        Ok(())
    }

    // --- internals ---

    fn mark_running(&mut self) -> Result<(), RunnerError> {
        let ctx = self.ctx()?;
        if ctx.cancelled {
            return Err(RunnerError::SessionCancelled);
        }
        ctx.task_logs
            .update_session(&ctx.session_id, |s| s.status = SessionStatus::Running)?;
        Ok(())
    }

    /// Reap L2 workers idle past the configured threshold. Runs at wave
    /// and batch boundaries.
    fn sweep_stale_workers(&self) {
        if let Ok(ctx) = self.ctx() {
            let reaped = ctx.l2.sweep_stale(self.clock.now());
            if !reaped.is_empty() {
                warn!(count = reaped.len(), "reaped stale L2 workers");
            }
        }
    }

    fn report(&self, outcomes: Vec<TaskOutcome>) -> Result<ExecuteReport, RunnerError> {
        let statuses: Vec<TaskStatus> = outcomes.iter().map(|o| o.status).collect();
        Ok(ExecuteReport {
            overall: OverallStatus::aggregate(&statuses),
            outcomes,
        })
    }

    fn mediator(&self) -> Result<Box<dyn Mediator>, RunnerError> {
        let ctx = self.ctx()?;
        if self.options.enable_auto_resolve {
            // Questions are language, not code: temperature stays > 0.
            let llm = LlmClient::new(
                self.options.auto_resolve_llm_provider,
                self.options.model.clone(),
                0.7,
                ctx.evidence.clone(),
                self.clock.clone(),
            );
            Ok(Box::new(LlmMediator::new(llm)))
        } else {
            Ok(Box::new(DeterministicMediator::new()))
        }
    }

    /// Create the task row, run triage, assemble the prompt. Returns a
    /// settled outcome when the executor must not be invoked.
    async fn prepare_task(
        &mut self,
        spec: TaskSpec,
        selected_model: Option<String>,
        parent: Option<TaskId>,
    ) -> Result<Prepared, RunnerError> {
        if self.ctx()?.cancelled {
            return Err(RunnerError::SessionCancelled);
        }
        let at = self.now();
        let ctx = self.ctx()?;
        let entry = ctx.task_logs.create_task_with_context(
            &ctx.session_id,
            &ctx.thread_id,
            &ctx.run_id,
            parent.as_ref(),
            spec.id.clone(),
            at,
        )?;
        let task_id = entry.task_id.clone();
        ctx.task_logs.start_task(&ctx.session_id, &task_id)?;
        ctx.task_logs.add_event(
            &task_id,
            &ctx.session_id,
            TaskEventType::TaskStarted,
            &spec.instruction,
            HashMap::new(),
            ExecutorMeta::default(),
            at,
        )?;
        self.record_task_event(&task_id, EventSource::Task, "TASK_STARTED", Value::Null)?;

        // Admission limits.
        let ctx = self.ctx()?;
        if let Some(violation) = ctx
            .limits
            .check_files(spec.lock_paths.len() as u32, at)
        {
            ctx.task_logs
                .update_session(&ctx.session_id, |s| s.record_violation(violation.clone()))?;
            let outcome = self
                .seal(
                    &task_id,
                    TaskStatus::Incomplete,
                    TaskCompletion {
                        status: Some(TaskStatus::Incomplete),
                        error_message: Some(violation.to_string()),
                        ..TaskCompletion::default()
                    },
                    None,
                )
                .await?;
            return Ok(Prepared {
                spec,
                task_id,
                exec_task: None,
                settled: Some(outcome),
            });
        }

        // Clarification triage: write-capable natural-language tasks
        // only, and never for normalized follow-ups.
        if spec.task_type == TaskType::Implementation && parent.is_none() {
            let project = self.ctx()?.target_project.clone();
            if let Some(signal) = triage(&spec.instruction, &project) {
                return Ok(Prepared {
                    spec: spec.clone(),
                    task_id: task_id.clone(),
                    exec_task: None,
                    settled: Some(self.settle_clarification(&spec, &task_id, signal).await?),
                });
            }
        }

        // Prompt assembly, in the fixed auditable order.
        let ctx = self.ctx()?;
        let parts = PromptParts::for_task(
            spec.instruction.clone(),
            format!("Project root: {}", ctx.target_project.display()),
            format!("Task {} ({})", task_id, spec.task_type),
        );
        let prompt = assemble_prompt(&parts);
        ctx.task_logs.add_event(
            &task_id,
            &ctx.session_id,
            TaskEventType::TaskProgress,
            "prompt assembled",
            HashMap::from([(
                "prompt".to_string(),
                Value::String(prompt.clone()),
            )]),
            ExecutorMeta::default(),
            at,
        )?;

        let exec_task = ExecutorTask {
            id: task_id.clone(),
            prompt,
            working_dir: ctx.target_project.clone(),
            selected_model,
            task_type: Some(spec.task_type),
        };
        Ok(Prepared {
            spec,
            task_id,
            exec_task: Some(exec_task),
            settled: None,
        })
    }

    /// Handle a triage hit: emit the structured signal, optionally
    /// auto-resolve through mediation, never invoke the executor here.
    async fn settle_clarification(
        &mut self,
        spec: &TaskSpec,
        task_id: &TaskId,
        signal: ClarificationSignal,
    ) -> Result<TaskOutcome, RunnerError> {
        let at = self.now();
        let ctx = self.ctx()?;
        ctx.task_logs.add_event(
            task_id,
            &ctx.session_id,
            TaskEventType::ClarificationRequested,
            "clarification required",
            HashMap::from([(
                "signal".to_string(),
                serde_json::to_value(&signal).unwrap_or(Value::Null),
            )]),
            ExecutorMeta::default(),
            at,
        )?;
        self.record_task_event(
            task_id,
            EventSource::Task,
            "CLARIFICATION_REQUESTED",
            serde_json::to_value(&signal).unwrap_or(Value::Null),
        )?;

        if let Some(handler) = self.options.user_response_handler.clone() {
            let mediator = self.mediator()?;
            let question = mediator.question_for(&signal).await?;
            if let Some(response) = handler(&question) {
                let follow_up = mediator.normalize(&signal, &response).await?;
                drop(mediator);
                let sealed = self
                    .seal(
                        task_id,
                        TaskStatus::Incomplete,
                        TaskCompletion {
                            status: Some(TaskStatus::Incomplete),
                            response_summary: Some(format!("clarified: {:?}", follow_up.action)),
                            ..TaskCompletion::default()
                        },
                        Some(&signal),
                    )
                    .await?;
                if follow_up.action == FollowUpAction::Cancel {
                    return Ok(sealed);
                }
                let mut follow_spec = TaskSpec::new(follow_up.explicit_prompt);
                follow_spec.task_type = spec.task_type;
                if let Some(target) = &follow_up.target_file {
                    follow_spec.lock_paths = vec![target.clone()];
                }
                return Box::pin(self.execute_task(
                    follow_spec,
                    None,
                    Some(task_id.clone()),
                ))
                .await;
            }
        }

        // No resolution path: seal INCOMPLETE with the signal attached.
        self.seal(
            task_id,
            TaskStatus::Incomplete,
            TaskCompletion {
                status: Some(TaskStatus::Incomplete),
                error_message: None,
                ..TaskCompletion::default()
            },
            Some(&signal),
        )
        .await
    }

    /// Pool admission for a prepared task. Read deliverables take an L1
    /// slot with the project as their whitelist; everything else takes
    /// an L2 slot plus its declared path locks.
    fn admit(&self, prepared: &Prepared) -> Result<(), RunnerError> {
        let at = self.now();
        let now = self.clock.now();
        let ctx = self.ctx()?;
        if prepared.spec.task_type.output_is_deliverable() {
            ctx.l1.try_acquire(
                prepared.task_id.as_str(),
                vec![ctx.target_project.clone()],
            )?;
            return Ok(());
        }
        ctx.l2
            .acquire(prepared.task_id.as_str(), &prepared.spec.lock_paths, at, now)?;
        Ok(())
    }

    fn release_pools(&self, task_id: &TaskId) {
        if let Ok(ctx) = self.ctx() {
            ctx.l2.release(task_id.as_str());
            ctx.l1.release(task_id.as_str());
        }
    }

    /// Record evidence, judge the result, seal the task.
    async fn finalize_task(
        &mut self,
        prepared: &Prepared,
        result: Result<ExecutorResult, ExecutorError>,
    ) -> Result<TaskOutcome, RunnerError> {
        let task_id = prepared.task_id.clone();
        let result = match result {
            Ok(result) => result,
            Err(e) => ExecutorResult::error(format!("executor fault: {e}")),
        };

        let call_id = self.record_call_evidence(prepared, &result)?;
        let at = self.now();
        let ctx = self.ctx()?;
        ctx.task_logs.add_event(
            &task_id,
            &ctx.session_id,
            TaskEventType::ExecutorInvoked,
            &format!("executor {} returned {}", ctx.executor.name(), result.status),
            HashMap::from([
                ("status".to_string(), json!(result.status)),
                ("files_modified".to_string(), json!(result.files_modified)),
                ("verified_files".to_string(), json!(result.verified_files)),
            ]),
            ExecutorMeta {
                provider: Some(self.options.auto_resolve_llm_provider.to_string()),
                model: Some(self.options.model.clone()),
                input_tokens: None,
                output_tokens: None,
                latency_ms: Some(result.duration_ms),
            },
            at,
        )?;
        self.record_task_event(
            &task_id,
            EventSource::Executor,
            "EXECUTOR_RETURNED",
            json!({"status": result.status, "duration_ms": result.duration_ms}),
        )?;

        // Completion judgment: the runner, not the executor, decides.
        let read_deliverable =
            prepared.spec.task_type.output_is_deliverable() && !result.output.trim().is_empty();

        if result.executor_blocked {
            let reason = result
                .blocked_reason
                .map(|r| format!("{r:?}"))
                .unwrap_or_else(|| "blocked".to_string());
            return self
                .seal(
                    &task_id,
                    TaskStatus::Blocked,
                    TaskCompletion {
                        status: Some(TaskStatus::Blocked),
                        error_message: Some(format!("executor blocked: {reason}")),
                        blocking: true,
                        evidence_ref: Some(call_id.as_str().to_string()),
                        ..TaskCompletion::default()
                    },
                    None,
                )
                .await;
        }

        if result.status == ExecStatus::Error || !result.executed {
            return self
                .seal(
                    &task_id,
                    TaskStatus::Error,
                    TaskCompletion {
                        status: Some(TaskStatus::Error),
                        error_message: Some(
                            result.error.unwrap_or_else(|| "executor error".to_string()),
                        ),
                        evidence_ref: Some(call_id.as_str().to_string()),
                        ..TaskCompletion::default()
                    },
                    None,
                )
                .await;
        }

        match result.status {
            ExecStatus::NoEvidence => {
                if read_deliverable {
                    self.seal_complete(&task_id, &result, &call_id, true).await
                } else {
                    self.seal(
                        &task_id,
                        TaskStatus::Error,
                        TaskCompletion {
                            status: Some(TaskStatus::Error),
                            error_message: Some("no evidence of work".to_string()),
                            evidence_ref: Some(call_id.as_str().to_string()),
                            ..TaskCompletion::default()
                        },
                        None,
                    )
                    .await
                }
            }
            ExecStatus::Incomplete => {
                if read_deliverable {
                    self.seal_complete(&task_id, &result, &call_id, true).await
                } else if result.output.trim().is_empty() {
                    // Park the task for a user response.
                    let signal = ClarificationSignal {
                        clarification_needed: true,
                        clarification_reason: ClarificationReason::MissingRequiredInfo,
                        target_file: None,
                        original_prompt: prepared.spec.instruction.clone(),
                    };
                    let ctx = self.ctx_mut()?;
                    ctx.awaiting.insert(task_id.clone(), signal.clone());
                    ctx.task_logs
                        .mark_awaiting_response(&ctx.session_id, &task_id)?;
                    ctx.task_logs.add_event(
                        &task_id,
                        &ctx.session_id,
                        TaskEventType::ClarificationRequested,
                        "executor stopped without output; waiting on a user response",
                        HashMap::from([(
                            "signal".to_string(),
                            serde_json::to_value(&signal).unwrap_or(Value::Null),
                        )]),
                        ExecutorMeta::default(),
                        at,
                    )?;
                    Ok(TaskOutcome {
                        task_id,
                        status: TaskStatus::AwaitingResponse,
                        response_summary: None,
                        error_message: None,
                        clarification: Some(signal),
                        evidence_ref: Some(call_id.as_str().to_string()),
                    })
                } else {
                    self.seal(
                        &task_id,
                        TaskStatus::Error,
                        TaskCompletion {
                            status: Some(TaskStatus::Error),
                            error_message: Some("executor stopped incomplete".to_string()),
                            evidence_ref: Some(call_id.as_str().to_string()),
                            ..TaskCompletion::default()
                        },
                        None,
                    )
                    .await
                }
            }
            ExecStatus::Complete => {
                // Re-verify: a completion claim needs at least one file
                // that verifiably exists, whatever the task type;
                // files_modified never counts.
                if result.has_existing_verified_file() {
                    self.seal_complete(&task_id, &result, &call_id, read_deliverable)
                        .await
                } else {
                    self.seal(
                        &task_id,
                        TaskStatus::Error,
                        TaskCompletion {
                            status: Some(TaskStatus::Error),
                            error_message: Some(
                                "completion claimed without verified files".to_string(),
                            ),
                            evidence_ref: Some(call_id.as_str().to_string()),
                            ..TaskCompletion::default()
                        },
                        None,
                    )
                    .await
                }
            }
            // Blocked and Error were handled above.
            _ => self
                .seal(
                    &task_id,
                    TaskStatus::Error,
                    TaskCompletion {
                        status: Some(TaskStatus::Error),
                        error_message: Some("unexpected executor status".to_string()),
                        evidence_ref: Some(call_id.as_str().to_string()),
                        ..TaskCompletion::default()
                    },
                    None,
                )
                .await,
        }
    }

    fn record_call_evidence(
        &mut self,
        prepared: &Prepared,
        result: &ExecutorResult,
    ) -> Result<LlmCallId, RunnerError> {
        let call_id = LlmCallId::generate(&self.clock);
        let at = self.now();
        let provider = self.options.auto_resolve_llm_provider;
        let model = self.options.model.clone();
        let success = result.executed
            && !matches!(result.status, ExecStatus::Error | ExecStatus::Blocked);
        let prompt = prepared
            .exec_task
            .as_ref()
            .map(|t| t.prompt.clone())
            .unwrap_or_else(|| prepared.spec.instruction.clone());
        let ctx = self.ctx_mut()?;
        ctx.evidence.record_call(CallOutcome {
            call_id: call_id.clone(),
            provider,
            model,
            request_messages: json!([{"role": "user", "content": prompt}]),
            response_text: (!result.output.is_empty()).then(|| result.output.clone()),
            timestamp: at,
            duration_ms: result.duration_ms,
            success,
            error: result.error.clone(),
        })?;
        ctx.evidence_refs.push(call_id.clone());
        Ok(call_id)
    }

    async fn seal_complete(
        &mut self,
        task_id: &TaskId,
        result: &ExecutorResult,
        call_id: &LlmCallId,
        with_summary: bool,
    ) -> Result<TaskOutcome, RunnerError> {
        self.seal(
            task_id,
            TaskStatus::Completed,
            TaskCompletion {
                status: Some(TaskStatus::Completed),
                files_modified: result.files_modified.clone(),
                evidence_ref: Some(call_id.as_str().to_string()),
                response_summary: with_summary.then(|| result.output.clone()),
                ..TaskCompletion::default()
            },
            None,
        )
        .await
    }

    /// The single sealing point: every terminal status flows through the
    /// fail-closed completer exactly once.
    async fn seal(
        &mut self,
        task_id: &TaskId,
        status: TaskStatus,
        completion: TaskCompletion,
        clarification: Option<&ClarificationSignal>,
    ) -> Result<TaskOutcome, RunnerError> {
        let at = self.now();
        let error_message = completion.error_message.clone();
        let response_summary = completion.response_summary.clone();
        let evidence_ref = completion.evidence_ref.clone();

        let ctx = self.ctx()?;
        ctx.task_logs
            .complete_task_with_session(task_id, &ctx.session_id, completion, at)?;

        let event_name = match status {
            TaskStatus::Completed => "TASK_COMPLETED",
            TaskStatus::Incomplete => "TASK_INCOMPLETE",
            _ => "TASK_ERROR",
        };
        self.record_task_event(task_id, EventSource::Task, event_name, Value::Null)?;

        if matches!(status, TaskStatus::Error | TaskStatus::Blocked)
            && !self.options.continue_on_task_failure
        {
            self.ctx_mut()?.halted = true;
        }
        Ok(TaskOutcome {
            task_id: task_id.clone(),
            status,
            response_summary,
            error_message,
            clarification: clarification.cloned(),
            evidence_ref,
        })
    }

    /// Seal a task that never reached the executor (failed dependency,
    /// cancelled wave).
    async fn settle_without_executor(
        &mut self,
        spec: &TaskSpec,
        status: TaskStatus,
        error_message: Option<String>,
    ) -> Result<TaskOutcome, RunnerError> {
        let at = self.now();
        let ctx = self.ctx()?;
        let entry = ctx.task_logs.create_task_with_context(
            &ctx.session_id,
            &ctx.thread_id,
            &ctx.run_id,
            None,
            spec.id.clone(),
            at,
        )?;
        ctx.task_logs.start_task(&ctx.session_id, &entry.task_id)?;
        self.seal(
            &entry.task_id,
            status,
            TaskCompletion {
                status: Some(status),
                error_message,
                ..TaskCompletion::default()
            },
            None,
        )
        .await
    }

    fn record_task_event(
        &self,
        task_id: &TaskId,
        source: EventSource,
        summary: &str,
        data: Value,
    ) -> Result<EventId, RunnerError> {
        let ctx = self.ctx()?;
        let event_id = ctx.task_logs.next_event_id(&ctx.session_id)?;
        let event = Event::new(event_id.clone(), self.now(), source, summary)
            .with_task(task_id.as_str())
            .with_session(ctx.session_id.as_str())
            .with_data(data);
        ctx.events.record(&event)?;
        Ok(event_id)
    }

    fn record_session_event(&self, summary: &str, data: Value) -> Result<(), RunnerError> {
        let ctx = self.ctx()?;
        let event_id = ctx.task_logs.next_event_id(&ctx.session_id)?;
        let event = Event::new(event_id, self.now(), EventSource::Session, mask(summary))
            .with_session(ctx.session_id.as_str())
            .with_data(data);
        ctx.events.record(&event)?;
        Ok(())
    }

    // --- inspection (two-layer view passthrough) ---

    pub fn task_list(&self) -> Result<Vec<TaskEntry>, RunnerError> {
        let ctx = self.ctx()?;
        Ok(ctx.task_logs.get_task_list(&ctx.session_id)?)
    }

    pub fn task_detail(
        &self,
        task_id: &TaskId,
        visibility: pmo_core::Visibility,
    ) -> Result<pmo_core::TaskLog, RunnerError> {
        let ctx = self.ctx()?;
        Ok(ctx
            .task_logs
            .get_task_detail(&ctx.session_id, task_id, visibility)?)
    }

    pub fn session_record(&self) -> Result<SessionRecord, RunnerError> {
        let ctx = self.ctx()?;
        Ok(ctx.task_logs.load_session(&ctx.session_id)?)
    }
}

fn record_terminal(terminal: &mut HashMap<String, TaskStatus>, spec: &TaskSpec, outcome: &TaskOutcome) {
    if let Some(external) = &spec.id {
        terminal.insert(external.clone(), outcome.status);
    }
    terminal.insert(outcome.task_id.as_str().to_string(), outcome.status);
}

/// Map sentinel refusals onto the verdict the caller must report.
fn sentinel_fallback(reasons: &[SentinelReason]) -> OverallStatus {
    let tampered = reasons.iter().any(|reason| {
        matches!(
            reason,
            SentinelReason::HashMismatch { .. } | SentinelReason::UnreadableEvidence { .. }
        )
    });
    if tampered {
        OverallStatus::Error
    } else {
        OverallStatus::NoEvidence
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
