// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Path-scoped exclusive locks held by write-capable workers.
//!
//! Two paths conflict when they are equal or one is an ancestor of the
//! other. Acquisition over a set of paths is all-or-nothing, and release
//! frees a holder's locks atomically, so no interleaving can observe a
//! partially locked set.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use pmo_core::{ErrorKind, LockId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from lock operations.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("path {path} is locked by {holder}")]
    Conflict { path: PathBuf, holder: String },
}

impl LockError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::LockConflict
    }
}

/// A live lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lock {
    pub lock_id: LockId,
    pub path: PathBuf,
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
}

/// In-process lock table; at most one live holder per path.
#[derive(Default)]
pub struct LockManager {
    locks: Mutex<Vec<Lock>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire every path or none. On conflict, nothing is taken and the
    /// first conflicting path is reported.
    pub fn acquire_all(
        &self,
        paths: &[PathBuf],
        holder: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<LockId>, LockError> {
        let mut locks = self.locks.lock();
        for path in paths {
            if let Some(existing) = locks.iter().find(|lock| paths_overlap(&lock.path, path)) {
                return Err(LockError::Conflict {
                    path: path.clone(),
                    holder: existing.holder.clone(),
                });
            }
        }
        let mut ids = Vec::with_capacity(paths.len());
        for path in paths {
            let lock = Lock {
                lock_id: LockId::generate(),
                path: path.clone(),
                holder: holder.to_string(),
                acquired_at: at,
            };
            ids.push(lock.lock_id.clone());
            locks.push(lock);
        }
        Ok(ids)
    }

    /// Release every lock held by `holder` atomically.
    pub fn release_holder(&self, holder: &str) -> usize {
        let mut locks = self.locks.lock();
        let before = locks.len();
        locks.retain(|lock| lock.holder != holder);
        before - locks.len()
    }

    /// Whether any live lock overlaps the path.
    pub fn is_locked(&self, path: &Path) -> bool {
        self.locks
            .lock()
            .iter()
            .any(|lock| paths_overlap(&lock.path, path))
    }

    /// Snapshot of live locks.
    pub fn live(&self) -> Vec<Lock> {
        self.locks.lock().clone()
    }
}

/// Equal, ancestor or descendant.
fn paths_overlap(a: &Path, b: &Path) -> bool {
    a == b || a.starts_with(b) || b.starts_with(a)
}

#[cfg(test)]
#[path = "locks_tests.rs"]
mod tests;
