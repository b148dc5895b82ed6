// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted executor for tests.

use crate::contract::{ExecStatus, Executor, ExecutorError, ExecutorResult, ExecutorTask};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Injected executor that replays scripted results and records the tasks
/// it was handed.
#[derive(Clone, Default)]
pub struct StubExecutor {
    results: Arc<Mutex<VecDeque<ExecutorResult>>>,
    calls: Arc<Mutex<Vec<ExecutorTask>>>,
}

impl StubExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next result to replay.
    pub fn push_result(&self, result: ExecutorResult) {
        self.results.lock().push_back(result);
    }

    /// Tasks seen so far, in order.
    pub fn calls(&self) -> Vec<ExecutorTask> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Executor for StubExecutor {
    fn name(&self) -> &str {
        "stub"
    }

    async fn execute(&self, task: ExecutorTask) -> Result<ExecutorResult, ExecutorError> {
        self.calls.lock().push(task);
        let result = self.results.lock().pop_front().unwrap_or_else(|| {
            // Out of script: fail closed.
            ExecutorResult::complete("").with_status(ExecStatus::NoEvidence)
        });
        Ok(result)
    }
}
