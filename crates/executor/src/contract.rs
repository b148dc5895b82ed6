// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The executor wire contract.
//!
//! Inputs use camelCase keys on the wire (`workingDir`, `selectedModel`,
//! `taskType`); results use snake_case. `verified_files` is authoritative
//! for completion judgment; `files_modified` is informational only.

use async_trait::async_trait;
use pmo_core::{TaskId, TaskType};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Infrastructure faults below the contract. Contract-level failures
/// (non-zero exit, blocked, timeout) are carried inside the result.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed executor result: {0}")]
    Protocol(String),
    #[error("llm error: {0}")]
    Llm(String),
}

/// Status asserted by the executor for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecStatus {
    Complete,
    Incomplete,
    NoEvidence,
    Error,
    Blocked,
}

impl std::fmt::Display for ExecStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecStatus::Complete => write!(f, "COMPLETE"),
            ExecStatus::Incomplete => write!(f, "INCOMPLETE"),
            ExecStatus::NoEvidence => write!(f, "NO_EVIDENCE"),
            ExecStatus::Error => write!(f, "ERROR"),
            ExecStatus::Blocked => write!(f, "BLOCKED"),
        }
    }
}

/// What terminated the subprocess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminatedBy {
    Timeout,
    InteractivePrompt,
    Signal,
}

/// Why an executor reported itself blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockedReason {
    InteractivePrompt,
    Timeout,
    PermissionPrompt,
}

/// One file check performed by the executor after its work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedFile {
    pub path: String,
    pub exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Task handed to an executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorTask {
    pub id: TaskId,
    pub prompt: String,
    #[serde(rename = "workingDir")]
    pub working_dir: PathBuf,
    #[serde(
        rename = "selectedModel",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub selected_model: Option<String>,
    #[serde(rename = "taskType", default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<TaskType>,
}

/// Structured result returned by every executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorResult {
    pub executed: bool,
    pub status: ExecStatus,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub files_modified: Vec<String>,
    #[serde(default)]
    pub verified_files: Vec<VerifiedFile>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub executor_blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<BlockedReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminated_by: Option<TerminatedBy>,
}

impl ExecutorResult {
    /// A minimal successful result.
    pub fn complete(output: impl Into<String>) -> Self {
        Self {
            executed: true,
            status: ExecStatus::Complete,
            output: output.into(),
            files_modified: Vec::new(),
            verified_files: Vec::new(),
            duration_ms: 0,
            error: None,
            executor_blocked: false,
            blocked_reason: None,
            timeout_ms: None,
            terminated_by: None,
        }
    }

    /// A failed result carrying an error message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            executed: false,
            status: ExecStatus::Error,
            output: String::new(),
            files_modified: Vec::new(),
            verified_files: Vec::new(),
            duration_ms: 0,
            error: Some(message.into()),
            executor_blocked: false,
            blocked_reason: None,
            timeout_ms: None,
            terminated_by: None,
        }
    }

    /// A blocked result for a terminated subprocess.
    pub fn blocked(reason: BlockedReason, terminated_by: TerminatedBy, timeout_ms: u64) -> Self {
        Self {
            executed: true,
            status: ExecStatus::Blocked,
            output: String::new(),
            files_modified: Vec::new(),
            verified_files: Vec::new(),
            duration_ms: timeout_ms,
            error: None,
            executor_blocked: true,
            blocked_reason: Some(reason),
            timeout_ms: Some(timeout_ms),
            terminated_by: Some(terminated_by),
        }
    }

    pub fn with_status(mut self, status: ExecStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_verified_file(mut self, path: impl Into<String>, exists: bool) -> Self {
        self.verified_files.push(VerifiedFile {
            path: path.into(),
            exists,
            size: None,
        });
        self
    }

    pub fn with_files_modified(mut self, files: Vec<String>) -> Self {
        self.files_modified = files;
        self
    }

    /// Whether at least one verified file exists on the executor's word.
    pub fn has_existing_verified_file(&self) -> bool {
        self.verified_files.iter().any(|f| f.exists)
    }
}

/// The capability set every executor implements.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Stable implementation name (`claude-code`, `api`, `stub`, …).
    fn name(&self) -> &str;

    /// Run one task to a structured result.
    async fn execute(&self, task: ExecutorTask) -> Result<ExecutorResult, ExecutorError>;
}

impl std::fmt::Debug for dyn Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor").field("name", &self.name()).finish()
    }
}

#[cfg(test)]
#[path = "contract_tests.rs"]
mod tests;
