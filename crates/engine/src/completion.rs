// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Completion protocol: an independent judge over QA-gate results.
//!
//! Judgment is scoped to a single run ID. Mixing results from different
//! runs — or from a run other than the expected current one — is not a
//! verdict, it is a stale-run error: old green gates must never vouch
//! for new code.

use chrono::{DateTime, Utc};
use pmo_core::{ErrorKind, GateRunId};
use pmo_evidence::sha256_hex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// One QA gate's structured result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateResult {
    pub run_id: GateRunId,
    pub timestamp: DateTime<Utc>,
    pub passing: i64,
    pub failing: i64,
    pub skipped: i64,
    pub gate_name: String,
}

/// Verdict over one run's gates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Complete,
    Failing { gates: Vec<String> },
    NoEvidence,
}

/// Mixed or unexpected run IDs in the inputs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("stale run: expected {expected:?}, found {found:?}")]
pub struct StaleRunError {
    pub expected: Option<GateRunId>,
    pub found: Vec<GateRunId>,
}

impl StaleRunError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::StaleRun
    }
}

/// The judge. Optionally pinned to the expected current run.
#[derive(Debug, Clone, Default)]
pub struct CompletionJudge {
    expected_run_id: Option<GateRunId>,
}

impl CompletionJudge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin judgment to one expected run ID.
    pub fn expecting(run_id: GateRunId) -> Self {
        Self {
            expected_run_id: Some(run_id),
        }
    }

    /// Judge a set of gate results.
    ///
    /// COMPLETE requires zero failures, no negative counts, and at least
    /// one passing test; it may never be asserted with `failing > 0`.
    pub fn judge(&self, results: &[GateResult]) -> Result<Verdict, StaleRunError> {
        if results.is_empty() {
            return Ok(Verdict::NoEvidence);
        }

        let run_ids: BTreeSet<&GateRunId> = results.iter().map(|r| &r.run_id).collect();
        if run_ids.len() != 1 {
            return Err(StaleRunError {
                expected: self.expected_run_id.clone(),
                found: run_ids.into_iter().cloned().collect(),
            });
        }
        if let Some(expected) = &self.expected_run_id {
            if results[0].run_id != *expected {
                return Err(StaleRunError {
                    expected: Some(expected.clone()),
                    found: vec![results[0].run_id.clone()],
                });
            }
        }

        let offending: Vec<String> = results
            .iter()
            .filter(|r| r.failing > 0 || r.passing < 0 || r.failing < 0 || r.skipped < 0)
            .map(|r| r.gate_name.clone())
            .collect();
        if !offending.is_empty() {
            return Ok(Verdict::Failing { gates: offending });
        }

        let passing_total: i64 = results.iter().map(|r| r.passing).sum();
        if passing_total > 0 {
            Ok(Verdict::Complete)
        } else {
            Ok(Verdict::NoEvidence)
        }
    }
}

/// Mint a run ID: `YYYYMMDD-HHmmss-mmm-<shortSha>-<cmdHash8>`.
///
/// The timestamp prefix gives plain string comparison temporal meaning.
pub fn generate_run_id(now: DateTime<Utc>, short_sha: &str, command: &str) -> GateRunId {
    let cmd_hash = sha256_hex(command.as_bytes());
    GateRunId::new_unchecked(format!(
        "{}-{}-{}",
        now.format("%Y%m%d-%H%M%S-%3f"),
        short_sha,
        &cmd_hash[..8]
    ))
}

#[cfg(test)]
#[path = "completion_tests.rs"]
mod tests;
