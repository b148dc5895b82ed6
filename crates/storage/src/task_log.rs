// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session task log tree.
//!
//! Layout under `<project>/.claude/logs/`:
//!
//! ```text
//! index.json                       — global session registry
//! sessions/<session_id>/
//!   session.json                   — threads, runs, counters
//!   index.json                     — per-session task index
//!   tasks/<task_id>.json           — task log (events)
//! ```
//!
//! Logs are never overwritten destructively: corrupt JSON on read yields
//! an empty in-memory structure, and read paths never delete files.
//! `complete_task_with_session` is the fail-closed finalizer — every
//! terminal status goes through it, exactly once per task.

use crate::atomic::{AtomicWriter, WriteOptions};
use chrono::{DateTime, Utc};
use pmo_core::{
    mask, mask_value, ErrorKind, EventId, ExecutorMeta, RunRecord, SessionId, SessionRecord,
    SessionStatus, TaskEntry, TaskEventType, TaskId, TaskLog, TaskLogEvent, TaskStatus,
    ThreadId, ThreadRecord, ThreadType, Visibility,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Errors from task log operations.
#[derive(Debug, Error)]
pub enum TaskLogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),
    #[error("unknown thread: {0}")]
    UnknownThread(ThreadId),
    #[error("unknown task: {0}")]
    UnknownTask(TaskId),
    #[error("parent task {parent} belongs to thread {parent_thread}, not {thread}")]
    ParentThreadMismatch {
        parent: TaskId,
        parent_thread: ThreadId,
        thread: ThreadId,
    },
    #[error("task {0} already has a terminal log event")]
    AlreadySealed(TaskId),
    #[error("status {0} is not terminal")]
    NotTerminal(TaskStatus),
    #[error("write failed after {retries} retries: {message}")]
    Write { retries: u32, message: String },
}

impl TaskLogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TaskLogError::Io(_) | TaskLogError::Json(_) | TaskLogError::Write { .. } => {
                ErrorKind::Persistence
            }
            _ => ErrorKind::Configuration,
        }
    }
}

/// Row in the global session registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionIndexEntry {
    pub session_id: SessionId,
    pub target_project: PathBuf,
    pub started_at: DateTime<Utc>,
    pub status: SessionStatus,
}

/// Inputs to the fail-closed finalizer.
#[derive(Debug, Clone, Default)]
pub struct TaskCompletion {
    pub status: Option<TaskStatus>,
    pub files_modified: Vec<String>,
    pub evidence_ref: Option<String>,
    pub error_message: Option<String>,
    pub blocking: bool,
    pub response_summary: Option<String>,
    pub executor: ExecutorMeta,
}

impl TaskCompletion {
    pub fn with_status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Manager over one project's task log tree.
#[derive(Clone)]
pub struct TaskLogManager {
    root: PathBuf,
    writer: AtomicWriter,
}

impl TaskLogManager {
    /// Create a manager rooted at `<project>/.claude/logs`.
    pub fn new(project_root: &Path, writer: AtomicWriter) -> Self {
        Self {
            root: project_root.join(".claude").join("logs"),
            writer,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn session_dir(&self, session_id: &SessionId) -> PathBuf {
        self.root.join("sessions").join(session_id.as_str())
    }

    fn session_path(&self, session_id: &SessionId) -> PathBuf {
        self.session_dir(session_id).join("session.json")
    }

    fn index_path(&self, session_id: &SessionId) -> PathBuf {
        self.session_dir(session_id).join("index.json")
    }

    fn task_path(&self, session_id: &SessionId, task_id: &TaskId) -> PathBuf {
        self.session_dir(session_id)
            .join("tasks")
            .join(format!("{}.json", task_id))
    }

    fn registry_path(&self) -> PathBuf {
        self.root.join("index.json")
    }

    // --- session lifecycle ---

    /// Create the directory tree for a session and register it globally.
    /// Per-session ID counters start zeroed.
    pub fn initialize_session(&self, session: &SessionRecord) -> Result<(), TaskLogError> {
        std::fs::create_dir_all(self.session_dir(&session.session_id).join("tasks"))?;
        self.save_session(session)?;
        self.write_json(&self.index_path(&session.session_id), &Vec::<TaskEntry>::new())?;

        let mut registry = self.list_sessions();
        registry.retain(|entry| entry.session_id != session.session_id);
        registry.push(SessionIndexEntry {
            session_id: session.session_id.clone(),
            target_project: session.target_project.clone(),
            started_at: session.started_at,
            status: session.status,
        });
        registry.sort_by(|a, b| a.session_id.as_str().cmp(b.session_id.as_str()));
        self.write_json(&self.registry_path(), &registry)
    }

    /// Load a session record. A corrupt file yields an empty record for
    /// the same ID; the file itself is left untouched.
    pub fn load_session(&self, session_id: &SessionId) -> Result<SessionRecord, TaskLogError> {
        let path = self.session_path(session_id);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TaskLogError::UnknownSession(session_id.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(session) => Ok(session),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt session record");
                Ok(SessionRecord::new(
                    session_id.clone(),
                    PathBuf::new(),
                    DateTime::<Utc>::UNIX_EPOCH,
                ))
            }
        }
    }

    pub fn save_session(&self, session: &SessionRecord) -> Result<(), TaskLogError> {
        self.write_json(&self.session_path(&session.session_id), session)
    }

    /// Apply a mutation to the session record and persist it.
    pub fn update_session(
        &self,
        session_id: &SessionId,
        apply: impl FnOnce(&mut SessionRecord),
    ) -> Result<SessionRecord, TaskLogError> {
        let mut session = self.load_session(session_id)?;
        apply(&mut session);
        self.save_session(&session)?;
        Ok(session)
    }

    /// Allocate the next `evt-NNN` from the session's counters.
    pub fn next_event_id(&self, session_id: &SessionId) -> Result<EventId, TaskLogError> {
        let mut allocated = None;
        self.update_session(session_id, |session| {
            allocated = Some(session.counters.next_event());
        })?;
        allocated.ok_or_else(|| TaskLogError::UnknownSession(session_id.clone()))
    }

    /// Update the session status in both the record and the registry.
    pub fn set_session_status(
        &self,
        session_id: &SessionId,
        status: SessionStatus,
    ) -> Result<(), TaskLogError> {
        let mut session = self.load_session(session_id)?;
        session.status = status;
        self.save_session(&session)?;

        let mut registry = self.list_sessions();
        for entry in registry.iter_mut() {
            if &entry.session_id == session_id {
                entry.status = status;
            }
        }
        self.write_json(&self.registry_path(), &registry)
    }

    /// All registered sessions. Corrupt registry reads as empty.
    pub fn list_sessions(&self) -> Vec<SessionIndexEntry> {
        read_json_or_default(&self.registry_path())
    }

    // --- threads, runs, tasks ---

    pub fn create_thread(
        &self,
        session_id: &SessionId,
        thread_type: ThreadType,
        at: DateTime<Utc>,
    ) -> Result<ThreadRecord, TaskLogError> {
        let mut session = self.load_session(session_id)?;
        let record = session.add_thread(thread_type, at);
        self.save_session(&session)?;
        Ok(record)
    }

    pub fn create_run(
        &self,
        session_id: &SessionId,
        thread_id: &ThreadId,
        at: DateTime<Utc>,
    ) -> Result<RunRecord, TaskLogError> {
        let mut session = self.load_session(session_id)?;
        if session.thread(thread_id).is_none() {
            return Err(TaskLogError::UnknownThread(thread_id.clone()));
        }
        let record = session.add_run(thread_id.clone(), at);
        self.save_session(&session)?;
        Ok(record)
    }

    /// Allocate a task under a thread and run. A given parent must share
    /// the thread, otherwise the call fails. The task gets exactly one
    /// index entry and an empty log file.
    pub fn create_task_with_context(
        &self,
        session_id: &SessionId,
        thread_id: &ThreadId,
        run_id: &pmo_core::RunId,
        parent: Option<&TaskId>,
        external_id: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<TaskEntry, TaskLogError> {
        let mut session = self.load_session(session_id)?;
        if session.thread(thread_id).is_none() {
            return Err(TaskLogError::UnknownThread(thread_id.clone()));
        }

        let mut index = self.get_task_list(session_id)?;
        if let Some(parent_id) = parent {
            let parent_entry = index
                .iter()
                .find(|entry| &entry.task_id == parent_id)
                .ok_or_else(|| TaskLogError::UnknownTask(parent_id.clone()))?;
            if &parent_entry.thread_id != thread_id {
                return Err(TaskLogError::ParentThreadMismatch {
                    parent: parent_id.clone(),
                    parent_thread: parent_entry.thread_id.clone(),
                    thread: thread_id.clone(),
                });
            }
        }

        let task_id = session.counters.next_task();
        let mut entry = TaskEntry::new(task_id.clone(), thread_id.clone(), run_id.clone(), at);
        entry.parent_task_id = parent.cloned();
        entry.external_id = external_id;

        index.push(entry.clone());
        // Task file first: the index may never reference a missing file.
        self.write_json(
            &self.task_path(session_id, &task_id),
            &TaskLog::new(task_id.clone(), session_id.as_str()),
        )?;
        self.write_json(&self.index_path(session_id), &index)?;
        self.save_session(&session)?;
        Ok(entry)
    }

    /// Mark a task in progress in the index.
    pub fn start_task(
        &self,
        session_id: &SessionId,
        task_id: &TaskId,
    ) -> Result<(), TaskLogError> {
        self.update_entry(session_id, task_id, |entry| {
            entry.status = TaskStatus::InProgress;
        })
    }

    /// Park a task waiting on a user response. Not a terminal state: the
    /// task stays unsealed until a response converts it.
    pub fn mark_awaiting_response(
        &self,
        session_id: &SessionId,
        task_id: &TaskId,
    ) -> Result<(), TaskLogError> {
        self.update_entry(session_id, task_id, |entry| {
            entry.status = TaskStatus::AwaitingResponse;
        })
    }

    // --- events ---

    /// Append an event to a task log. Content and metadata are masked
    /// before the log is persisted as a whole.
    pub fn add_event(
        &self,
        task_id: &TaskId,
        session_id: &SessionId,
        event_type: TaskEventType,
        content: &str,
        metadata: HashMap<String, serde_json::Value>,
        executor: ExecutorMeta,
        at: DateTime<Utc>,
    ) -> Result<EventId, TaskLogError> {
        let mut session = self.load_session(session_id)?;
        let mut log = self.load_task_log(session_id, task_id)?;

        let event_id = session.counters.next_event();
        log.events.push(TaskLogEvent {
            id: event_id.clone(),
            event_type,
            timestamp: at,
            content: mask(content),
            metadata: metadata
                .into_iter()
                .map(|(k, v)| (k, mask_value(&v)))
                .collect(),
            executor,
        });

        self.write_json(&self.task_path(session_id, task_id), &log)?;
        self.save_session(&session)?;
        Ok(event_id)
    }

    /// The fail-closed finalizer: seals a task with its single terminal
    /// log event and updates the index entry. Must be invoked for every
    /// terminal status — COMPLETED, INCOMPLETE and ERROR alike.
    pub fn complete_task_with_session(
        &self,
        task_id: &TaskId,
        session_id: &SessionId,
        completion: TaskCompletion,
        at: DateTime<Utc>,
    ) -> Result<EventId, TaskLogError> {
        let status = completion
            .status
            .ok_or(TaskLogError::NotTerminal(TaskStatus::Created))?;
        let event_type = TaskEventType::for_terminal_status(status)
            .ok_or(TaskLogError::NotTerminal(status))?;

        let mut log = self.load_task_log(session_id, task_id)?;
        if log.terminal_event_count() > 0 {
            return Err(TaskLogError::AlreadySealed(task_id.clone()));
        }

        let mut session = self.load_session(session_id)?;
        let event_id = session.counters.next_event();

        let content = match &completion.error_message {
            Some(message) => mask(message),
            None => status.to_string(),
        };
        log.events.push(TaskLogEvent {
            id: event_id.clone(),
            event_type,
            timestamp: at,
            content,
            metadata: HashMap::new(),
            executor: completion.executor.clone(),
        });
        self.write_json(&self.task_path(session_id, task_id), &log)?;
        self.save_session(&session)?;

        self.update_entry(session_id, task_id, |entry| {
            entry.status = status;
            entry.completed_at = Some(at);
            entry.files_modified = completion.files_modified.clone();
            entry.evidence_ref = completion.evidence_ref.clone();
            entry.error_message = completion.error_message.as_deref().map(mask);
            entry.blocking = completion.blocking;
            entry.response_summary = completion.response_summary.as_deref().map(mask);
        })?;
        Ok(event_id)
    }

    // --- two-layer view ---

    /// Index rows for a session. Corrupt index reads as empty; files are
    /// never deleted by read paths.
    pub fn get_task_list(&self, session_id: &SessionId) -> Result<Vec<TaskEntry>, TaskLogError> {
        Ok(read_json_or_default(&self.index_path(session_id)))
    }

    /// The task log filtered by visibility. `summary` hides executor
    /// provider, model, token counts and latency.
    pub fn get_task_detail(
        &self,
        session_id: &SessionId,
        task_id: &TaskId,
        visibility: Visibility,
    ) -> Result<TaskLog, TaskLogError> {
        let mut log = self.load_task_log(session_id, task_id)?;
        if visibility == Visibility::Summary {
            for event in log.events.iter_mut() {
                event.executor = ExecutorMeta::default();
            }
        }
        Ok(log)
    }

    /// Count of task files on disk (for invariant auditing).
    pub fn task_file_count(&self, session_id: &SessionId) -> usize {
        let dir = self.session_dir(session_id).join("tasks");
        std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| {
                        e.path()
                            .extension()
                            .map(|ext| ext == "json")
                            .unwrap_or(false)
                    })
                    .count()
            })
            .unwrap_or(0)
    }

    // --- internals ---

    fn load_task_log(
        &self,
        session_id: &SessionId,
        task_id: &TaskId,
    ) -> Result<TaskLog, TaskLogError> {
        let path = self.task_path(session_id, task_id);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TaskLogError::UnknownTask(task_id.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(log) => Ok(log),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt task log");
                Ok(TaskLog::new(task_id.clone(), session_id.as_str()))
            }
        }
    }

    fn update_entry(
        &self,
        session_id: &SessionId,
        task_id: &TaskId,
        apply: impl FnOnce(&mut TaskEntry),
    ) -> Result<(), TaskLogError> {
        let mut index = self.get_task_list(session_id)?;
        let entry = index
            .iter_mut()
            .find(|entry| &entry.task_id == task_id)
            .ok_or_else(|| TaskLogError::UnknownTask(task_id.clone()))?;
        apply(entry);
        self.write_json(&self.index_path(session_id), &index)
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), TaskLogError> {
        let bytes = serde_json::to_vec_pretty(value)?;
        let receipt = self.writer.write(path, &bytes, WriteOptions::default());
        if receipt.success {
            Ok(())
        } else {
            Err(TaskLogError::Write {
                retries: receipt.retries,
                message: receipt.error.unwrap_or_default(),
            })
        }
    }
}

fn read_json_or_default<T: for<'de> Deserialize<'de> + Default>(path: &Path) -> T {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(_) => return T::default(),
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupt JSON, using empty structure");
            T::default()
        }
    }
}

#[cfg(test)]
#[path = "task_log_tests.rs"]
mod tests;
