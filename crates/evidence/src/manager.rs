// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Evidence files: one per executor/LLM call, named by call ID.
//!
//! The file stores the masked request message list and raw response text
//! alongside their hashes, so integrity is recomputable at verification
//! time. Masking happens before hashing — the hash anchors exactly the
//! bytes on disk.

use crate::hash::{hash_value, sha256_hex};
use crate::provider::Provider;
use pmo_core::{mask, mask_value, LlmCallId};
use pmo_storage::{AtomicWriter, WriteOptions};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Errors from evidence operations.
#[derive(Debug, Error)]
pub enum EvidenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("evidence not found: {0}")]
    NotFound(LlmCallId),
    #[error("write failed after {retries} retries: {message}")]
    Write { retries: u32, message: String },
}

/// The hash-anchored call summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub call_id: LlmCallId,
    pub provider: Provider,
    pub model: String,
    /// Hash of the canonicalized (masked) prompt message list.
    pub request_hash: String,
    /// Hash of the raw response text; null on failure.
    pub response_hash: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Full evidence file content: record plus the hashed material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceFile {
    #[serde(flatten)]
    pub record: EvidenceRecord,
    pub request_messages: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_text: Option<String>,
}

/// Inputs describing a finished call.
#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub call_id: LlmCallId,
    pub provider: Provider,
    pub model: String,
    pub request_messages: Value,
    pub response_text: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    pub error: Option<String>,
}

/// Owner of the evidence directory; construct once at startup.
#[derive(Clone)]
pub struct EvidenceManager {
    dir: PathBuf,
    writer: AtomicWriter,
}

impl EvidenceManager {
    pub fn new(dir: impl Into<PathBuf>, writer: AtomicWriter) -> Self {
        Self {
            dir: dir.into(),
            writer,
        }
    }

    /// Conventional location under a project: `<project>/.claude/evidence`.
    pub fn for_project(project_root: &Path, writer: AtomicWriter) -> Self {
        Self::new(project_root.join(".claude").join("evidence"), writer)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, call_id: &LlmCallId) -> PathBuf {
        self.dir.join(format!("{}.json", call_id))
    }

    /// Record a call: mask, hash, persist. Returns the stored record.
    pub fn record_call(&self, outcome: CallOutcome) -> Result<EvidenceRecord, EvidenceError> {
        let request_messages = mask_value(&outcome.request_messages);
        let response_text = outcome.response_text.as_deref().map(mask);

        let record = EvidenceRecord {
            call_id: outcome.call_id,
            provider: outcome.provider,
            model: outcome.model,
            request_hash: hash_value(&request_messages),
            response_hash: response_text.as_deref().map(|t| sha256_hex(t.as_bytes())),
            timestamp: outcome.timestamp,
            duration_ms: outcome.duration_ms,
            success: outcome.success,
            error: outcome.error.as_deref().map(mask),
        };
        let file = EvidenceFile {
            record: record.clone(),
            request_messages,
            response_text,
        };

        let bytes = serde_json::to_vec_pretty(&file)?;
        let receipt = self.writer.write(
            &self.path_for(&record.call_id),
            &bytes,
            WriteOptions::default(),
        );
        if receipt.success {
            Ok(record)
        } else {
            Err(EvidenceError::Write {
                retries: receipt.retries,
                message: receipt.error.unwrap_or_default(),
            })
        }
    }

    /// Load one evidence file.
    pub fn load(&self, call_id: &LlmCallId) -> Result<EvidenceFile, EvidenceError> {
        let path = self.path_for(call_id);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(EvidenceError::NotFound(call_id.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// All records on disk, sorted by call ID (time-ordered by
    /// construction of the ID). Unreadable files are skipped with a log.
    pub fn list(&self) -> Result<Vec<EvidenceRecord>, EvidenceError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut records = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().map(|ext| ext != "json").unwrap_or(true) {
                continue;
            }
            match std::fs::read(&path).map_err(EvidenceError::from).and_then(|bytes| {
                serde_json::from_slice::<EvidenceFile>(&bytes).map_err(EvidenceError::from)
            }) {
                Ok(file) => records.push(file.record),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable evidence file");
                }
            }
        }
        records.sort_by(|a, b| a.call_id.as_str().cmp(b.call_id.as_str()));
        Ok(records)
    }

    /// Recompute the stored hashes from the stored content.
    ///
    /// Returns `Ok(())` when both hashes match; mismatches name the field.
    pub fn verify(&self, call_id: &LlmCallId) -> Result<Result<(), String>, EvidenceError> {
        let file = self.load(call_id)?;
        if hash_value(&file.request_messages) != file.record.request_hash {
            return Ok(Err("request_hash".to_string()));
        }
        let recomputed = file
            .response_text
            .as_deref()
            .map(|t| sha256_hex(t.as_bytes()));
        if recomputed != file.record.response_hash {
            return Ok(Err("response_hash".to_string()));
        }
        Ok(Ok(()))
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
