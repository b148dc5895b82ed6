// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Regression wrapper forcing INCOMPLETE results.
//!
//! Selected by `PM_TEST_EXECUTOR_MODE`: wraps the active executor and
//! downgrades every successful result so incomplete-path handling stays
//! covered by end-to-end drills.

use crate::contract::{ExecStatus, Executor, ExecutorError, ExecutorResult, ExecutorTask};
use async_trait::async_trait;
use std::sync::Arc;

/// Wrapper that rewrites COMPLETE results to INCOMPLETE.
pub struct TestIncompleteExecutor {
    inner: Arc<dyn Executor>,
    name: String,
}

impl TestIncompleteExecutor {
    pub fn new(inner: Arc<dyn Executor>) -> Self {
        let name = format!("test-incomplete({})", inner.name());
        Self { inner, name }
    }
}

#[async_trait]
impl Executor for TestIncompleteExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, task: ExecutorTask) -> Result<ExecutorResult, ExecutorError> {
        let mut result = self.inner.execute(task).await?;
        if result.status == ExecStatus::Complete {
            result.status = ExecStatus::Incomplete;
            result.verified_files.clear();
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubExecutor;
    use pmo_core::TaskId;
    use std::path::PathBuf;

    #[tokio::test]
    async fn downgrades_complete_results() {
        let stub = StubExecutor::new();
        stub.push_result(ExecutorResult::complete("done").with_verified_file("a.rs", true));
        let wrapped = TestIncompleteExecutor::new(Arc::new(stub));
        assert_eq!(wrapped.name(), "test-incomplete(stub)");

        let result = wrapped
            .execute(ExecutorTask {
                id: TaskId::new("task-001"),
                prompt: "x".to_string(),
                working_dir: PathBuf::from("/tmp"),
                selected_model: None,
                task_type: None,
            })
            .await
            .unwrap();
        assert_eq!(result.status, ExecStatus::Incomplete);
        assert!(result.verified_files.is_empty());
    }

    #[tokio::test]
    async fn passes_failures_through() {
        let stub = StubExecutor::new();
        stub.push_result(ExecutorResult::error("boom"));
        let wrapped = TestIncompleteExecutor::new(Arc::new(stub));
        let result = wrapped
            .execute(ExecutorTask {
                id: TaskId::new("task-001"),
                prompt: "x".to_string(),
                working_dir: PathBuf::from("/tmp"),
                selected_model: None,
                task_type: None,
            })
            .await
            .unwrap();
        assert_eq!(result.status, ExecStatus::Error);
    }
}
