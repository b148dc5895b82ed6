// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Real executor: a local subprocess speaking the wire contract.
//!
//! The task is written to the child's stdin as JSON; the child prints a
//! structured result on stdout. Expiry of the per-task timeout kills the
//! child and yields a blocked result with `terminated_by = timeout`.

use crate::contract::{
    BlockedReason, ExecStatus, Executor, ExecutorError, ExecutorResult, ExecutorTask,
    TerminatedBy,
};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{info, warn};

/// Default per-task wall clock.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(900);

/// Subprocess-backed executor.
pub struct ClaudeCodeExecutor {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ClaudeCodeExecutor {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Executor for ClaudeCodeExecutor {
    fn name(&self) -> &str {
        "claude-code"
    }

    async fn execute(&self, task: ExecutorTask) -> Result<ExecutorResult, ExecutorError> {
        let payload =
            serde_json::to_vec(&task).map_err(|e| ExecutorError::Protocol(e.to_string()))?;

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .current_dir(&task.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecutorError::SpawnFailed(format!("{}: {e}", self.command)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await?;
        }

        let started = Instant::now();
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(e.into()),
            Err(_elapsed) => {
                // Child is killed on drop of the owning future.
                warn!(task = %task.id, timeout_s = self.timeout.as_secs(), "executor timed out");
                return Ok(ExecutorResult::blocked(
                    BlockedReason::Timeout,
                    TerminatedBy::Timeout,
                    self.timeout.as_millis() as u64,
                ));
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            info!(task = %task.id, code = ?output.status.code(), "executor exited nonzero");
            let mut result = ExecutorResult::error(format!(
                "executor exited with {:?}: {}",
                output.status.code(),
                stderr.trim()
            ));
            result.duration_ms = elapsed_ms;
            if output.status.code().is_none() {
                result.terminated_by = Some(TerminatedBy::Signal);
            }
            return Ok(result);
        }

        match serde_json::from_str::<ExecutorResult>(stdout.trim()) {
            Ok(mut result) => {
                if result.duration_ms == 0 {
                    result.duration_ms = elapsed_ms;
                }
                // An interactive prompt surfaced by the child is blocking.
                if result.executor_blocked && result.status != ExecStatus::Blocked {
                    result.status = ExecStatus::Blocked;
                }
                Ok(result)
            }
            Err(e) => {
                let mut result =
                    ExecutorResult::error(format!("malformed executor output: {e}"));
                result.duration_ms = elapsed_ms;
                Ok(result)
            }
        }
    }
}

#[cfg(test)]
#[path = "claude_code_tests.rs"]
mod tests;
