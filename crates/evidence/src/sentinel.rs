// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The fail-closed gate in front of COMPLETE.
//!
//! Three gates run in order: the configured provider's credential must be
//! present, the evidence directory must exist and be writable, and every
//! referenced evidence file must pass integrity with at least one
//! successful call. Any failure yields `can_assert_complete = false` with
//! a structured reason; callers map that to NO_EVIDENCE or ERROR.

use crate::manager::{EvidenceError, EvidenceManager};
use crate::provider::Provider;
use pmo_core::{probe_env, LlmCallId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Why a gate refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SentinelReason {
    /// Key gate: the provider credential env key is absent.
    MissingCredential { env_key: String },
    /// Directory gate: evidence directory does not exist.
    EvidenceDirMissing { dir: PathBuf },
    /// Directory gate: evidence directory is not writable.
    EvidenceDirUnwritable { dir: PathBuf },
    /// Integrity gate: a referenced evidence file is absent.
    MissingEvidence { call_id: String },
    /// Integrity gate: a stored hash does not recompute.
    HashMismatch { call_id: String, field: String },
    /// Integrity gate: an evidence file could not be read.
    UnreadableEvidence { call_id: String, message: String },
    /// Integrity gate: no referenced entry has `success = true`.
    NoSuccessfulCall,
}

/// Aggregate gate outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentinelVerdict {
    pub can_assert_complete: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<SentinelReason>,
}

impl SentinelVerdict {
    fn pass() -> Self {
        Self {
            can_assert_complete: true,
            reasons: Vec::new(),
        }
    }

    fn fail(reasons: Vec<SentinelReason>) -> Self {
        Self {
            can_assert_complete: false,
            reasons,
        }
    }
}

/// Verifier over an evidence directory.
pub struct Sentinel<'a> {
    manager: &'a EvidenceManager,
    provider: Provider,
}

impl<'a> Sentinel<'a> {
    pub fn new(manager: &'a EvidenceManager, provider: Provider) -> Self {
        Self { manager, provider }
    }

    /// Run all three gates over the referenced calls.
    pub fn verify(&self, referenced: &[LlmCallId]) -> SentinelVerdict {
        // Gate 1: credential present.
        if probe_env(self.provider.env_key()) != "SET" {
            return SentinelVerdict::fail(vec![SentinelReason::MissingCredential {
                env_key: self.provider.env_key().to_string(),
            }]);
        }

        // Gate 2: directory exists and is writable.
        let dir = self.manager.dir().to_path_buf();
        if !dir.is_dir() {
            return SentinelVerdict::fail(vec![SentinelReason::EvidenceDirMissing { dir }]);
        }
        if !dir_is_writable(&dir) {
            return SentinelVerdict::fail(vec![SentinelReason::EvidenceDirUnwritable { dir }]);
        }

        // Gate 3: integrity of every referenced file, with at least one
        // successful call among them.
        let mut reasons = Vec::new();
        let mut any_success = false;
        for call_id in referenced {
            match self.manager.load(call_id) {
                Ok(file) => {
                    match self.manager.verify(call_id) {
                        Ok(Ok(())) => {
                            if file.record.success {
                                any_success = true;
                            }
                        }
                        Ok(Err(field)) => reasons.push(SentinelReason::HashMismatch {
                            call_id: call_id.as_str().to_string(),
                            field,
                        }),
                        Err(e) => reasons.push(SentinelReason::UnreadableEvidence {
                            call_id: call_id.as_str().to_string(),
                            message: e.to_string(),
                        }),
                    }
                }
                Err(EvidenceError::NotFound(_)) => {
                    reasons.push(SentinelReason::MissingEvidence {
                        call_id: call_id.as_str().to_string(),
                    });
                }
                Err(e) => reasons.push(SentinelReason::UnreadableEvidence {
                    call_id: call_id.as_str().to_string(),
                    message: e.to_string(),
                }),
            }
        }
        if !any_success {
            reasons.push(SentinelReason::NoSuccessfulCall);
        }

        if reasons.is_empty() {
            SentinelVerdict::pass()
        } else {
            SentinelVerdict::fail(reasons)
        }
    }
}

/// Probe writability by creating and removing a marker file.
fn dir_is_writable(dir: &std::path::Path) -> bool {
    let probe = dir.join(".write-probe");
    match std::fs::write(&probe, b"") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
#[path = "sentinel_tests.rs"]
mod tests;
