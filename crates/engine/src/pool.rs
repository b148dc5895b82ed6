// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded agent pools.
//!
//! L1 is read-only: fixed capacity, optional FIFO queueing, a per-agent
//! read whitelist, never any locks. L2 is write-capable: fixed capacity
//! backed by a semaphore for backpressure, all-or-nothing path locking
//! on admission, atomic release, and a stale sweep that reaps workers
//! whose last activity is older than the configured threshold.
//!
//! Ordering: writers to overlapping paths serialize on lock grant order;
//! readers never block writers and may observe pre- or post-write state.

use crate::config::PoolConfig;
use crate::locks::{LockError, LockManager};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::info;

/// Errors from pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("pool saturated at capacity {capacity}")]
    Saturated { capacity: usize },
    #[error("worker already admitted: {0}")]
    DuplicateWorker(String),
    #[error("unknown worker: {0}")]
    UnknownWorker(String),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("pool closed")]
    Closed,
}

struct L1Agent {
    allowed_paths: Vec<PathBuf>,
    _permit: OwnedSemaphorePermit,
}

/// Read-only pool.
pub struct L1Pool {
    capacity: usize,
    queueing: bool,
    semaphore: Arc<Semaphore>,
    agents: Mutex<HashMap<String, L1Agent>>,
}

impl L1Pool {
    pub fn new(capacity: usize, queueing: bool) -> Self {
        Self {
            capacity,
            queueing,
            semaphore: Arc::new(Semaphore::new(capacity)),
            agents: Mutex::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn active(&self) -> usize {
        self.agents.lock().len()
    }

    /// Admit a reader with its whitelist. Queues FIFO when enabled,
    /// otherwise fails at capacity.
    pub async fn acquire(
        &self,
        agent_id: &str,
        allowed_paths: Vec<PathBuf>,
    ) -> Result<(), PoolError> {
        if self.agents.lock().contains_key(agent_id) {
            return Err(PoolError::DuplicateWorker(agent_id.to_string()));
        }
        let permit = if self.queueing {
            self.semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| PoolError::Closed)?
        } else {
            self.semaphore
                .clone()
                .try_acquire_owned()
                .map_err(|_| PoolError::Saturated {
                    capacity: self.capacity,
                })?
        };
        self.agents.lock().insert(
            agent_id.to_string(),
            L1Agent {
                allowed_paths,
                _permit: permit,
            },
        );
        Ok(())
    }

    /// Admit a reader without waiting, regardless of the queueing flag.
    pub fn try_acquire(
        &self,
        agent_id: &str,
        allowed_paths: Vec<PathBuf>,
    ) -> Result<(), PoolError> {
        if self.agents.lock().contains_key(agent_id) {
            return Err(PoolError::DuplicateWorker(agent_id.to_string()));
        }
        let permit = self
            .semaphore
            .clone()
            .try_acquire_owned()
            .map_err(|_| PoolError::Saturated {
                capacity: self.capacity,
            })?;
        self.agents.lock().insert(
            agent_id.to_string(),
            L1Agent {
                allowed_paths,
                _permit: permit,
            },
        );
        Ok(())
    }

    /// Whitelist check for a read.
    pub fn can_read(&self, agent_id: &str, path: &Path) -> bool {
        let agents = self.agents.lock();
        match agents.get(agent_id) {
            Some(agent) => agent
                .allowed_paths
                .iter()
                .any(|allowed| path.starts_with(allowed)),
            None => false,
        }
    }

    pub fn release(&self, agent_id: &str) -> bool {
        self.agents.lock().remove(agent_id).is_some()
    }
}

struct L2Worker {
    lock_paths: Vec<PathBuf>,
    last_activity: Instant,
    acquired_at: DateTime<Utc>,
    _permit: OwnedSemaphorePermit,
}

/// Write-capable pool.
pub struct L2Pool {
    capacity: usize,
    stale_after: std::time::Duration,
    semaphore: Arc<Semaphore>,
    locks: Arc<LockManager>,
    workers: Mutex<HashMap<String, L2Worker>>,
}

impl L2Pool {
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            capacity: config.l2_capacity,
            stale_after: config.stale_after,
            semaphore: Arc::new(Semaphore::new(config.l2_capacity)),
            locks: Arc::new(LockManager::new()),
            workers: Mutex::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Live workers, for backpressure decisions.
    pub fn active(&self) -> usize {
        self.workers.lock().len()
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// Admit a writer: a free slot and every requested path unlocked,
    /// or nothing at all.
    pub fn acquire(
        &self,
        worker_id: &str,
        lock_paths: &[PathBuf],
        at: DateTime<Utc>,
        now: Instant,
    ) -> Result<(), PoolError> {
        if self.workers.lock().contains_key(worker_id) {
            return Err(PoolError::DuplicateWorker(worker_id.to_string()));
        }
        let permit = self
            .semaphore
            .clone()
            .try_acquire_owned()
            .map_err(|_| PoolError::Saturated {
                capacity: self.capacity,
            })?;
        self.locks.acquire_all(lock_paths, worker_id, at)?;
        self.workers.lock().insert(
            worker_id.to_string(),
            L2Worker {
                lock_paths: lock_paths.to_vec(),
                last_activity: now,
                acquired_at: at,
                _permit: permit,
            },
        );
        Ok(())
    }

    /// Record liveness for the stale sweep.
    pub fn touch(&self, worker_id: &str, now: Instant) -> Result<(), PoolError> {
        let mut workers = self.workers.lock();
        let worker = workers
            .get_mut(worker_id)
            .ok_or_else(|| PoolError::UnknownWorker(worker_id.to_string()))?;
        worker.last_activity = now;
        Ok(())
    }

    /// Release the slot and every held lock atomically.
    pub fn release(&self, worker_id: &str) -> bool {
        let removed = self.workers.lock().remove(worker_id).is_some();
        if removed {
            self.locks.release_holder(worker_id);
        }
        removed
    }

    /// Reap workers whose last activity is older than the threshold.
    pub fn sweep_stale(&self, now: Instant) -> Vec<String> {
        let stale: Vec<String> = {
            let workers = self.workers.lock();
            workers
                .iter()
                .filter(|(_, w)| {
                    now.saturating_duration_since(w.last_activity) > self.stale_after
                })
                .map(|(id, _)| id.clone())
                .collect()
        };
        for worker_id in &stale {
            info!(worker = %worker_id, "reaping stale L2 worker");
            self.release(worker_id);
        }
        stale
    }

    /// Held lock paths of a live worker.
    pub fn worker_paths(&self, worker_id: &str) -> Option<Vec<PathBuf>> {
        self.workers
            .lock()
            .get(worker_id)
            .map(|w| w.lock_paths.clone())
    }

    /// Admission time of a live worker.
    pub fn worker_acquired_at(&self, worker_id: &str) -> Option<DateTime<Utc>> {
        self.workers.lock().get(worker_id).map(|w| w.acquired_at)
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
