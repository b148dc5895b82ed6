// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task descriptors, index rows and per-task logs.

use crate::id::{EventId, RunId, TaskId, ThreadId};
use crate::status::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// What kind of deliverable a task produces.
///
/// `READ_INFO` and `REPORT` tasks deliver text; they complete on non-empty
/// output without file evidence. Everything else requires verified files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    #[default]
    Implementation,
    ReadInfo,
    Report,
}

impl TaskType {
    /// Whether non-empty text output alone is an acceptable deliverable.
    pub fn output_is_deliverable(&self) -> bool {
        matches!(self, TaskType::ReadInfo | TaskType::Report)
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskType::Implementation => write!(f, "IMPLEMENTATION"),
            TaskType::ReadInfo => write!(f, "READ_INFO"),
            TaskType::Report => write!(f, "REPORT"),
        }
    }
}

/// A task descriptor handed to the runner by the front-end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// External identifier supplied by the caller, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Natural-language instruction for the executor.
    pub instruction: String,
    #[serde(default)]
    pub task_type: TaskType,
    /// IDs (external or allocated) of tasks that must finish first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    /// Paths this task intends to write; locked for the duration.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lock_paths: Vec<PathBuf>,
}

impl TaskSpec {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    pub fn with_dependencies(mut self, deps: Vec<String>) -> Self {
        self.dependencies = deps;
        self
    }

    pub fn with_lock_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.lock_paths = paths;
        self
    }
}

/// Index row for a task: the summary layer of the two-layer view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEntry {
    pub task_id: TaskId,
    pub thread_id: ThreadId,
    pub run_id: RunId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files_modified: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Set when the executor was blocked (interactive prompt, timeout).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub blocking: bool,
    /// Text deliverable for READ_INFO / REPORT tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_summary: Option<String>,
}

impl TaskEntry {
    pub fn new(
        task_id: TaskId,
        thread_id: ThreadId,
        run_id: RunId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id,
            thread_id,
            run_id,
            parent_task_id: None,
            external_id: None,
            status: TaskStatus::Created,
            created_at,
            completed_at: None,
            files_modified: Vec::new(),
            evidence_ref: None,
            error_message: None,
            blocking: false,
            response_summary: None,
        }
    }
}

/// Type tag of a per-task log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskEventType {
    TaskStarted,
    TaskProgress,
    ClarificationRequested,
    ExecutorInvoked,
    TaskCompleted,
    TaskIncomplete,
    TaskError,
}

impl TaskEventType {
    /// Exactly one terminal log event exists per terminal task.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskEventType::TaskCompleted | TaskEventType::TaskIncomplete | TaskEventType::TaskError
        )
    }

    /// Terminal event for a terminal status.
    pub fn for_terminal_status(status: TaskStatus) -> Option<TaskEventType> {
        match status {
            TaskStatus::Completed => Some(TaskEventType::TaskCompleted),
            TaskStatus::Incomplete => Some(TaskEventType::TaskIncomplete),
            TaskStatus::Error | TaskStatus::Blocked => Some(TaskEventType::TaskError),
            _ => None,
        }
    }
}

/// Executor detail attached to a log event; hidden in summary visibility.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutorMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl ExecutorMeta {
    pub fn is_empty(&self) -> bool {
        self.provider.is_none()
            && self.model.is_none()
            && self.input_tokens.is_none()
            && self.output_tokens.is_none()
            && self.latency_ms.is_none()
    }
}

/// One event appended to a per-task log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskLogEvent {
    pub id: EventId,
    pub event_type: TaskEventType,
    pub timestamp: DateTime<Utc>,
    pub content: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "ExecutorMeta::is_empty")]
    pub executor: ExecutorMeta,
}

/// Append-only per-task log: the detail layer of the two-layer view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskLog {
    pub task_id: TaskId,
    pub session_id: String,
    #[serde(default)]
    pub events: Vec<TaskLogEvent>,
}

impl TaskLog {
    pub fn new(task_id: TaskId, session_id: impl Into<String>) -> Self {
        Self {
            task_id,
            session_id: session_id.into(),
            events: Vec::new(),
        }
    }

    /// Count of terminal events in this log.
    pub fn terminal_event_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| e.event_type.is_terminal())
            .count()
    }
}

/// How much of the task log a reader may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Summary,
    Full,
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
