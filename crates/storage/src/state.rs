// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator resume state.
//!
//! A single snapshot at `.claude/state/runner.json` lets a new process
//! pick up a session where the previous one left off. The snapshot is
//! whole-file atomic; there is no replay.

use crate::atomic::{AtomicWriter, WriteOptions};
use chrono::{DateTime, Utc};
use pmo_core::{SessionId, SessionRecord, TaskSpec};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from resume-state operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no saved state")]
    Missing,
    #[error("saved state belongs to session {saved}, not {requested}")]
    SessionMismatch { saved: SessionId, requested: SessionId },
    #[error("write failed after {retries} retries: {message}")]
    Write { retries: u32, message: String },
}

/// The runner's resumable snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerState {
    pub session: SessionRecord,
    /// Tasks accepted but not yet terminal at save time.
    #[serde(default)]
    pub pending_tasks: Vec<TaskSpec>,
    /// Name of the executor implementation selected at init.
    pub executor: String,
    pub saved_at: DateTime<Utc>,
}

/// Store for the runner snapshot.
#[derive(Clone)]
pub struct StateStore {
    path: PathBuf,
    writer: AtomicWriter,
}

impl StateStore {
    /// Create a store at `<project>/.claude/state/runner.json`.
    pub fn new(project_root: &Path, writer: AtomicWriter) -> Self {
        Self {
            path: project_root
                .join(".claude")
                .join("state")
                .join("runner.json"),
            writer,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, state: &RunnerState) -> Result<(), StateError> {
        let bytes = serde_json::to_vec_pretty(state)?;
        let receipt = self.writer.write(&self.path, &bytes, WriteOptions::default());
        if receipt.success {
            Ok(())
        } else {
            Err(StateError::Write {
                retries: receipt.retries,
                message: receipt.error.unwrap_or_default(),
            })
        }
    }

    /// Load the snapshot for the given session. A snapshot saved by a
    /// different session is a mismatch, not a silent adoption.
    pub fn load(&self, session_id: &SessionId) -> Result<RunnerState, StateError> {
        let state = self.load_any()?;
        if &state.session.session_id != session_id {
            return Err(StateError::SessionMismatch {
                saved: state.session.session_id,
                requested: session_id.clone(),
            });
        }
        Ok(state)
    }

    /// Load whatever snapshot exists.
    pub fn load_any(&self) -> Result<RunnerState, StateError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StateError::Missing)
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn clear(&self) -> Result<(), StateError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
