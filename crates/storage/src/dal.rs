// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed data-access layer for dashboard consumers.
//!
//! One JSON document per record under `.claude/state/dal/<collection>/`.
//! Collections: projects, sessions, runs, events, plans. Records are
//! masked and written through the atomic writer; serving them over HTTP
//! is someone else's job.

use crate::atomic::{AtomicWriter, WriteOptions};
use chrono::{DateTime, Utc};
use pmo_core::{mask_value, OverallStatus, RunStatus, SessionStatus};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Errors from DAL operations.
#[derive(Debug, Error)]
pub enum DalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("write failed after {retries} retries: {message}")]
    Write { retries: u32, message: String },
}

/// A registered project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: String,
    pub path: PathBuf,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Dashboard row for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRow {
    pub session_id: String,
    pub project_id: String,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall: Option<OverallStatus>,
}

/// Dashboard row for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRow {
    pub run_id: String,
    pub session_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// A stored plan: the ordered task list produced during planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRecord {
    pub id: String,
    pub session_id: String,
    pub title: String,
    pub tasks: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// File-backed record store. Construct once at startup.
#[derive(Clone)]
pub struct Dal {
    root: PathBuf,
    writer: AtomicWriter,
}

impl Dal {
    /// Create a DAL rooted at `<project>/.claude/state/dal`.
    pub fn new(project_root: &Path, writer: AtomicWriter) -> Self {
        Self {
            root: project_root.join(".claude").join("state").join("dal"),
            writer,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // --- typed collections ---

    pub fn upsert_project(&self, record: &ProjectRecord) -> Result<(), DalError> {
        self.put("projects", &record.id, record)
    }

    pub fn projects(&self) -> Result<Vec<ProjectRecord>, DalError> {
        self.list("projects")
    }

    pub fn upsert_session(&self, row: &SessionRow) -> Result<(), DalError> {
        self.put("sessions", &row.session_id, row)
    }

    pub fn sessions(&self) -> Result<Vec<SessionRow>, DalError> {
        self.list("sessions")
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionRow>, DalError> {
        self.get("sessions", session_id)
    }

    pub fn upsert_run(&self, row: &RunRow) -> Result<(), DalError> {
        self.put("runs", &row.run_id, row)
    }

    pub fn runs(&self) -> Result<Vec<RunRow>, DalError> {
        self.list("runs")
    }

    pub fn upsert_plan(&self, record: &PlanRecord) -> Result<(), DalError> {
        self.put("plans", &record.id, record)
    }

    pub fn plans(&self) -> Result<Vec<PlanRecord>, DalError> {
        self.list("plans")
    }

    /// Mirror an event into the dashboard event collection.
    pub fn upsert_event(&self, event: &pmo_core::Event) -> Result<(), DalError> {
        self.put("events", event.id.as_str(), event)
    }

    pub fn events(&self) -> Result<Vec<pmo_core::Event>, DalError> {
        self.list("events")
    }

    // --- generic storage ---

    fn put<T: Serialize>(&self, collection: &str, id: &str, record: &T) -> Result<(), DalError> {
        let value = mask_value(&serde_json::to_value(record)?);
        let bytes = serde_json::to_vec_pretty(&value)?;
        let path = self.record_path(collection, id);
        let receipt = self.writer.write(&path, &bytes, WriteOptions::default());
        if receipt.success {
            Ok(())
        } else {
            Err(DalError::Write {
                retries: receipt.retries,
                message: receipt.error.unwrap_or_default(),
            })
        }
    }

    fn get<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<Option<T>, DalError> {
        let path = self.record_path(collection, id);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt DAL record");
                Ok(None)
            }
        }
    }

    fn list<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>, DalError> {
        let dir = self.root.join(collection);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|ext| ext == "json").unwrap_or(false))
            .collect();
        paths.sort();

        let mut records = Vec::new();
        for path in paths {
            let bytes = std::fs::read(&path)?;
            match serde_json::from_slice(&bytes) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping corrupt DAL record");
                }
            }
        }
        Ok(records)
    }

    fn record_path(&self, collection: &str, id: &str) -> PathBuf {
        self.root.join(collection).join(format!("{id}.json"))
    }
}

#[cfg(test)]
#[path = "dal_tests.rs"]
mod tests;
