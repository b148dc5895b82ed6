// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable file writes with retry and optional fsync.
//!
//! Writes go to a temp file in the target directory and are renamed into
//! place. In non-interactive mode (no controlling terminal on stdin, or
//! forced by the caller) the target is re-opened and fsynced after the
//! rename — that is the durability point on crash.
//!
//! IO failures are retried with exponential backoff and reported in the
//! returned receipt, never raised through the normal flow; the caller
//! decides whether the write was critical.

use parking_lot::Mutex;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::warn;

/// Default retry bound.
const DEFAULT_RETRIES: u32 = 3;

/// Initial backoff; doubles per attempt.
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);

/// Per-write options.
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// Fsync even in interactive mode.
    pub force_fsync: bool,
    /// Maximum retry attempts after the first failure.
    pub retries: u32,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            force_fsync: false,
            retries: DEFAULT_RETRIES,
        }
    }
}

/// Outcome of a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReceipt {
    pub success: bool,
    /// Retries consumed (0 when the first attempt succeeded).
    pub retries: u32,
    pub error: Option<String>,
}

struct WriterInner {
    non_interactive: AtomicBool,
    in_flight: Mutex<Vec<JoinHandle<WriteReceipt>>>,
}

/// Process-wide atomic writer; construct once and pass down by reference.
#[derive(Clone)]
pub struct AtomicWriter {
    inner: Arc<WriterInner>,
}

impl Default for AtomicWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomicWriter {
    /// Create a writer, inferring non-interactive mode from stdin.
    pub fn new() -> Self {
        let non_interactive = !std::io::stdin().is_terminal();
        Self::with_mode(non_interactive)
    }

    /// Create a writer with an explicit interactivity mode.
    pub fn with_mode(non_interactive: bool) -> Self {
        Self {
            inner: Arc::new(WriterInner {
                non_interactive: AtomicBool::new(non_interactive),
                in_flight: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Explicit override of the inferred mode.
    pub fn set_non_interactive(&self, value: bool) {
        self.inner.non_interactive.store(value, Ordering::SeqCst);
    }

    pub fn is_non_interactive(&self) -> bool {
        self.inner.non_interactive.load(Ordering::SeqCst)
    }

    /// Write `bytes` to `path` atomically, retrying on IO errors.
    pub fn write(&self, path: &Path, bytes: &[u8], opts: WriteOptions) -> WriteReceipt {
        let fsync = opts.force_fsync || self.is_non_interactive();
        let mut backoff = INITIAL_BACKOFF;
        let mut last_error = None;

        for attempt in 0..=opts.retries {
            match write_once(path, bytes, fsync) {
                Ok(()) => {
                    return WriteReceipt {
                        success: true,
                        retries: attempt,
                        error: None,
                    }
                }
                Err(e) => {
                    last_error = Some(e.to_string());
                    if attempt < opts.retries {
                        std::thread::sleep(backoff);
                        backoff *= 2;
                    }
                }
            }
        }

        warn!(path = %path.display(), error = ?last_error, "write failed after retries");
        WriteReceipt {
            success: false,
            retries: opts.retries,
            error: last_error,
        }
    }

    /// Queue a tracked background write. The receipt is collected by
    /// `flush_all` on shutdown.
    pub fn spawn_write(&self, path: PathBuf, bytes: Vec<u8>, opts: WriteOptions) {
        let writer = self.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let receipt = writer.write(&path, &bytes, opts);
            if !receipt.success {
                warn!(path = %path.display(), "background write failed");
            }
            receipt
        });
        self.inner.in_flight.lock().push(handle);
    }

    /// Await every tracked write. Must run on clean shutdown; on crash,
    /// durability is limited to already-fsynced writes.
    pub async fn flush_all(&self) -> usize {
        let handles: Vec<JoinHandle<WriteReceipt>> =
            std::mem::take(&mut *self.inner.in_flight.lock());
        let mut flushed = 0;
        for handle in handles {
            match handle.await {
                Ok(_) => flushed += 1,
                Err(e) => warn!(error = %e, "tracked write task failed"),
            }
        }
        flushed
    }

    /// Number of writes still tracked.
    pub fn pending(&self) -> usize {
        self.inner.in_flight.lock().len()
    }
}

fn write_once(path: &Path, bytes: &[u8], fsync: bool) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    if fsync {
        // Open-for-read then sync: the rename is only durable once the
        // data and directory entry hit the platter.
        let file = std::fs::File::open(path)?;
        file.sync_all()?;
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
#[path = "atomic_tests.rs"]
mod tests;
