// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error classification shared across the workspace.
//!
//! Errors are surfaced by kind, not concrete type: callers branch on the
//! kind to decide whether a failure is fatal, retriable, or absorbed into
//! a task status.

use serde::{Deserialize, Serialize};

/// Classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing project path, bad YAML, missing required key. Fatal at init.
    Configuration,
    /// max_files / max_tests / max_seconds exceeded.
    ResourceLimit,
    /// Requested path already locked; caller may retry.
    LockConflict,
    /// Subprocess failed, timed out, or was blocked.
    ExecutorFault,
    /// Required evidence missing or failing integrity.
    EvidenceGap,
    /// Mixed run IDs detected by the completion judge.
    StaleRun,
    /// IO retry exhaustion.
    Persistence,
}

impl ErrorKind {
    /// Whether this kind aborts initialization outright.
    pub fn is_fatal_at_init(&self) -> bool {
        matches!(self, ErrorKind::Configuration)
    }

    /// Whether the caller may retry the failed operation.
    pub fn is_retriable(&self) -> bool {
        matches!(self, ErrorKind::LockConflict | ErrorKind::Persistence)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::ResourceLimit => "resource_limit",
            ErrorKind::LockConflict => "lock_conflict",
            ErrorKind::ExecutorFault => "executor_fault",
            ErrorKind::EvidenceGap => "evidence_gap",
            ErrorKind::StaleRun => "stale_run",
            ErrorKind::Persistence => "persistence",
        };
        write!(f, "{name}")
    }
}
