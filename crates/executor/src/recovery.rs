// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recovery drill executor.
//!
//! Simulates the failure modes the runner must fail closed on: timeout
//! termination, interactive-prompt blocking, and missing evidence. Only
//! selectable when the process is explicitly in recovery mode
//! (`PM_EXECUTOR_MODE=recovery-stub`).

use crate::contract::{
    BlockedReason, ExecStatus, Executor, ExecutorError, ExecutorResult, ExecutorTask,
    TerminatedBy,
};
use async_trait::async_trait;

/// Scenario-simulating executor for regression drills.
#[derive(Default)]
pub struct RecoveryStubExecutor;

impl RecoveryStubExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Executor for RecoveryStubExecutor {
    fn name(&self) -> &str {
        "recovery-stub"
    }

    async fn execute(&self, task: ExecutorTask) -> Result<ExecutorResult, ExecutorError> {
        let prompt = task.prompt.to_lowercase();
        let result = if prompt.contains("timeout") {
            ExecutorResult::blocked(BlockedReason::Timeout, TerminatedBy::Timeout, 1_000)
        } else if prompt.contains("prompt") || prompt.contains("interactive") {
            ExecutorResult::blocked(
                BlockedReason::InteractivePrompt,
                TerminatedBy::InteractivePrompt,
                0,
            )
        } else if prompt.contains("fail") {
            ExecutorResult::error("simulated executor failure")
        } else {
            // Fail-closed default: work claimed, nothing verifiable.
            ExecutorResult::complete("").with_status(ExecStatus::NoEvidence)
        };
        Ok(result)
    }
}
