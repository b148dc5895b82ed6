// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ordered phase machine for a session.
//!
//! Sessions traverse `REQUIREMENT_ANALYSIS → TASK_DECOMPOSITION →
//! PLANNING → EXECUTION → QA → COMPLETION_VALIDATION → REPORT` in order;
//! any transition that would skip a phase is rejected. Completing a
//! phase attaches its evidence object to the history.

use chrono::{DateTime, Utc};
use pmo_core::Phase;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors from phase transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("phase {requested} is not the current phase {current}")]
    SkipRejected { current: Phase, requested: Phase },
    #[error("lifecycle already completed")]
    AlreadyComplete,
    #[error("PLANNING requires a non-empty task list")]
    EmptyTaskList,
}

/// Evidence attached to a completed phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub phase: Phase,
    pub status: String,
    pub evidence: Value,
    pub completed_at: DateTime<Utc>,
}

/// Phase machine. Starts at REQUIREMENT_ANALYSIS.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LifecycleController {
    current: Option<Phase>,
    #[serde(default)]
    history: Vec<PhaseRecord>,
}

impl LifecycleController {
    pub fn new() -> Self {
        Self {
            current: Some(Phase::RequirementAnalysis),
            history: Vec::new(),
        }
    }

    /// The phase the session is in, or `None` after REPORT completes.
    pub fn current(&self) -> Option<Phase> {
        self.current
    }

    pub fn history(&self) -> &[PhaseRecord] {
        &self.history
    }

    /// Complete the current phase with its evidence and advance.
    ///
    /// `phase` must equal the current phase — naming any other phase is
    /// the skip that gets rejected. Returns the new current phase.
    pub fn complete_phase(
        &mut self,
        phase: Phase,
        evidence: Value,
        status: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<Option<Phase>, LifecycleError> {
        let current = self.current.ok_or(LifecycleError::AlreadyComplete)?;
        if phase != current {
            return Err(LifecycleError::SkipRejected {
                current,
                requested: phase,
            });
        }
        if phase == Phase::Planning && !has_tasks(&evidence) {
            return Err(LifecycleError::EmptyTaskList);
        }

        self.history.push(PhaseRecord {
            phase,
            status: status.into(),
            evidence,
            completed_at: at,
        });
        self.current = current.next();
        Ok(self.current)
    }

    /// Complete whatever phase is current (the common forward step).
    pub fn complete_current_phase(
        &mut self,
        evidence: Value,
        status: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<Option<Phase>, LifecycleError> {
        let current = self.current.ok_or(LifecycleError::AlreadyComplete)?;
        self.complete_phase(current, evidence, status, at)
    }

    /// Whether every phase has completed.
    pub fn is_complete(&self) -> bool {
        self.current.is_none()
    }
}

/// PLANNING evidence must carry a non-empty `tasks` array.
fn has_tasks(evidence: &Value) -> bool {
    evidence
        .get("tasks")
        .and_then(Value::as_array)
        .map(|tasks| !tasks.is_empty())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
