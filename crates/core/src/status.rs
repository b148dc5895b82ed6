// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status enumerations and the task state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Initialized,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Initialized => write!(f, "INITIALIZED"),
            SessionStatus::Running => write!(f, "RUNNING"),
            SessionStatus::Completed => write!(f, "COMPLETED"),
            SessionStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Terminal-or-running status of a run within a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Running => write!(f, "RUNNING"),
            RunStatus::Completed => write!(f, "COMPLETED"),
            RunStatus::Failed => write!(f, "FAILED"),
            RunStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Task state machine.
///
/// ```text
/// CREATED → IN_PROGRESS → {COMPLETED, INCOMPLETE, ERROR}
/// IN_PROGRESS → AWAITING_RESPONSE   (clarification requested)
/// IN_PROGRESS → BLOCKED             (interactive prompt / timeout; terminal)
/// ```
///
/// `BLOCKED` maps to `ERROR` in the session aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Created,
    InProgress,
    AwaitingResponse,
    Blocked,
    Completed,
    Incomplete,
    Error,
}

impl TaskStatus {
    /// Terminal statuses never transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Incomplete | TaskStatus::Error | TaskStatus::Blocked
        )
    }

    /// Whether the state machine permits `self → to`.
    pub fn can_transition(&self, to: TaskStatus) -> bool {
        match self {
            TaskStatus::Created => matches!(to, TaskStatus::InProgress),
            TaskStatus::InProgress => matches!(
                to,
                TaskStatus::Completed
                    | TaskStatus::Incomplete
                    | TaskStatus::Error
                    | TaskStatus::Blocked
                    | TaskStatus::AwaitingResponse
            ),
            // A clarification response converts the task into a new
            // normalized task; the waiting task itself only seals.
            TaskStatus::AwaitingResponse => {
                matches!(to, TaskStatus::Incomplete | TaskStatus::Error)
            }
            _ => false,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Created => write!(f, "CREATED"),
            TaskStatus::InProgress => write!(f, "IN_PROGRESS"),
            TaskStatus::AwaitingResponse => write!(f, "AWAITING_RESPONSE"),
            TaskStatus::Blocked => write!(f, "BLOCKED"),
            TaskStatus::Completed => write!(f, "COMPLETED"),
            TaskStatus::Incomplete => write!(f, "INCOMPLETE"),
            TaskStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Verdict-level status other tools may trust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
    Complete,
    Incomplete,
    NoEvidence,
    Error,
    Invalid,
}

impl OverallStatus {
    /// Reduce task terminals to a session-level status.
    ///
    /// Any ERROR (or BLOCKED) wins; else any INCOMPLETE or missing terminal
    /// yields INCOMPLETE; else at least one COMPLETE yields COMPLETE.
    /// `NO_EVIDENCE` and `INVALID` are asserted by explicit calls, except
    /// for the empty input which carries no evidence of any work.
    pub fn aggregate(statuses: &[TaskStatus]) -> OverallStatus {
        if statuses.is_empty() {
            return OverallStatus::NoEvidence;
        }
        if statuses
            .iter()
            .any(|s| matches!(s, TaskStatus::Error | TaskStatus::Blocked))
        {
            return OverallStatus::Error;
        }
        if statuses
            .iter()
            .any(|s| !s.is_terminal() || matches!(s, TaskStatus::Incomplete))
        {
            return OverallStatus::Incomplete;
        }
        if statuses.iter().any(|s| matches!(s, TaskStatus::Completed)) {
            return OverallStatus::Complete;
        }
        OverallStatus::NoEvidence
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverallStatus::Complete => write!(f, "COMPLETE"),
            OverallStatus::Incomplete => write!(f, "INCOMPLETE"),
            OverallStatus::NoEvidence => write!(f, "NO_EVIDENCE"),
            OverallStatus::Error => write!(f, "ERROR"),
            OverallStatus::Invalid => write!(f, "INVALID"),
        }
    }
}

/// Ordered session phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    RequirementAnalysis,
    TaskDecomposition,
    Planning,
    Execution,
    Qa,
    CompletionValidation,
    Report,
}

impl Phase {
    pub const ALL: [Phase; 7] = [
        Phase::RequirementAnalysis,
        Phase::TaskDecomposition,
        Phase::Planning,
        Phase::Execution,
        Phase::Qa,
        Phase::CompletionValidation,
        Phase::Report,
    ];

    /// The phase following this one, or `None` after REPORT.
    pub fn next(&self) -> Option<Phase> {
        let idx = Phase::ALL.iter().position(|p| p == self)?;
        Phase::ALL.get(idx + 1).copied()
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::RequirementAnalysis => write!(f, "REQUIREMENT_ANALYSIS"),
            Phase::TaskDecomposition => write!(f, "TASK_DECOMPOSITION"),
            Phase::Planning => write!(f, "PLANNING"),
            Phase::Execution => write!(f, "EXECUTION"),
            Phase::Qa => write!(f, "QA"),
            Phase::CompletionValidation => write!(f, "COMPLETION_VALIDATION"),
            Phase::Report => write!(f, "REPORT"),
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
