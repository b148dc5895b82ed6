// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session, thread and run records.

use crate::id::{IdCounters, RunId, SessionId, ThreadId};
use crate::limits::LimitViolation;
use crate::status::{Phase, RunStatus, SessionStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Conversational scope of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadType {
    #[default]
    Main,
    Clarification,
    Recovery,
}

impl std::fmt::Display for ThreadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThreadType::Main => write!(f, "main"),
            ThreadType::Clarification => write!(f, "clarification"),
            ThreadType::Recovery => write!(f, "recovery"),
        }
    }
}

/// A thread record. Threads are never destroyed, only appended to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub thread_id: ThreadId,
    pub thread_type: ThreadType,
    pub created_at: DateTime<Utc>,
}

/// One user-triggered execution within a thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub thread_id: ThreadId,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Top-level session container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub started_at: DateTime<Utc>,
    /// Absolute path to the project this session operates on.
    pub target_project: PathBuf,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_phase: Option<Phase>,
    /// Configuration snapshot taken at initialization, masked.
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub limit_violations: Vec<LimitViolation>,
    #[serde(default)]
    pub threads: Vec<ThreadRecord>,
    #[serde(default)]
    pub runs: Vec<RunRecord>,
    #[serde(default)]
    pub counters: IdCounters,
}

impl SessionRecord {
    pub fn new(
        session_id: SessionId,
        target_project: PathBuf,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            started_at,
            target_project,
            status: SessionStatus::Initialized,
            current_phase: None,
            config: serde_json::Value::Null,
            limit_violations: Vec::new(),
            threads: Vec::new(),
            runs: Vec::new(),
            counters: IdCounters::default(),
        }
    }

    /// Append a new thread and return its record.
    pub fn add_thread(&mut self, thread_type: ThreadType, at: DateTime<Utc>) -> ThreadRecord {
        let record = ThreadRecord {
            thread_id: self.counters.next_thread(),
            thread_type,
            created_at: at,
        };
        self.threads.push(record.clone());
        record
    }

    /// Append a new run under the given thread and return its record.
    pub fn add_run(&mut self, thread_id: ThreadId, at: DateTime<Utc>) -> RunRecord {
        let record = RunRecord {
            run_id: self.counters.next_run(),
            thread_id,
            status: RunStatus::Running,
            started_at: at,
            finished_at: None,
        };
        self.runs.push(record.clone());
        record
    }

    /// Seal a run with its single terminal status. Idempotent against
    /// double finishing: the first terminal wins.
    pub fn finish_run(&mut self, run_id: &RunId, status: RunStatus, at: DateTime<Utc>) {
        if let Some(run) = self.runs.iter_mut().find(|r| &r.run_id == run_id) {
            if run.finished_at.is_none() && status.is_terminal() {
                run.status = status;
                run.finished_at = Some(at);
            }
        }
    }

    pub fn thread(&self, thread_id: &ThreadId) -> Option<&ThreadRecord> {
        self.threads.iter().find(|t| &t.thread_id == thread_id)
    }

    pub fn run(&self, run_id: &RunId) -> Option<&RunRecord> {
        self.runs.iter().find(|r| &r.run_id == run_id)
    }

    pub fn record_violation(&mut self, violation: LimitViolation) {
        self.limit_violations.push(violation);
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
