// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor selection at session init.
//!
//! One implementation is chosen per session and never swapped mid-run.
//! `recovery-stub` is rejected unless the process is explicitly in
//! recovery mode; `CLI_TEST_MODE=1` forces the deterministic transcript;
//! `PM_TEST_EXECUTOR_MODE` wraps whatever was selected in the
//! incomplete-forcing regression shim.

use crate::api::ApiExecutor;
use crate::claude_code::ClaudeCodeExecutor;
use crate::contract::Executor;
use crate::deterministic::DeterministicExecutor;
use crate::llm::LlmClient;
use crate::recovery::RecoveryStubExecutor;
use crate::wrap::TestIncompleteExecutor;
use pmo_core::Clock;
use pmo_evidence::{EvidenceManager, Provider};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Environment key permitting the recovery executor.
pub const RECOVERY_MODE_ENV: &str = "PM_EXECUTOR_MODE";
/// Environment key forcing the deterministic executor.
pub const CLI_TEST_MODE_ENV: &str = "CLI_TEST_MODE";
/// Environment key wrapping the selection in the incomplete shim.
pub const TEST_EXECUTOR_MODE_ENV: &str = "PM_TEST_EXECUTOR_MODE";

/// Errors from executor selection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectError {
    #[error("recovery-stub requires {RECOVERY_MODE_ENV}=recovery-stub")]
    RecoveryNotPermitted,
}

/// The available implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorKind {
    ClaudeCode,
    Api,
    Stub,
    Deterministic,
    RecoveryStub,
}

impl std::fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutorKind::ClaudeCode => write!(f, "claude-code"),
            ExecutorKind::Api => write!(f, "api"),
            ExecutorKind::Stub => write!(f, "stub"),
            ExecutorKind::Deterministic => write!(f, "deterministic"),
            ExecutorKind::RecoveryStub => write!(f, "recovery-stub"),
        }
    }
}

/// Selection inputs from runner configuration.
pub struct Selection {
    /// Select the real subprocess executor.
    pub use_claude_code: bool,
    /// Subprocess command for the real executor.
    pub claude_command: String,
    /// Per-task wall clock in milliseconds.
    pub claude_timeout_ms: Option<u64>,
    /// LLM provider for the `api` executor.
    pub provider: Provider,
    /// Model for the `api` executor.
    pub model: String,
    /// Explicitly requested kind (recovery drills).
    pub requested: Option<ExecutorKind>,
    /// Injected implementation (testing).
    pub injected: Option<Arc<dyn Executor>>,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            use_claude_code: false,
            claude_command: "claude-code".to_string(),
            claude_timeout_ms: None,
            provider: Provider::Anthropic,
            model: "claude-sonnet-4-20250514".to_string(),
            requested: None,
            injected: None,
        }
    }
}

/// Pick the executor for a session.
pub fn select_executor<C: Clock + 'static>(
    selection: Selection,
    evidence: &EvidenceManager,
    clock: C,
) -> Result<(Arc<dyn Executor>, ExecutorKind), SelectError> {
    let (executor, kind): (Arc<dyn Executor>, ExecutorKind) =
        if let Some(requested) = selection.requested {
            if requested == ExecutorKind::RecoveryStub {
                if std::env::var(RECOVERY_MODE_ENV).as_deref() != Ok("recovery-stub") {
                    return Err(SelectError::RecoveryNotPermitted);
                }
                (Arc::new(RecoveryStubExecutor::new()), ExecutorKind::RecoveryStub)
            } else {
                build_default(selection, evidence, clock)
            }
        } else if let Some(injected) = selection.injected.clone() {
            (injected, ExecutorKind::Stub)
        } else if std::env::var(CLI_TEST_MODE_ENV).as_deref() == Ok("1") {
            (Arc::new(DeterministicExecutor::new()), ExecutorKind::Deterministic)
        } else {
            build_default(selection, evidence, clock)
        };

    if std::env::var(TEST_EXECUTOR_MODE_ENV)
        .map(|v| !v.is_empty())
        .unwrap_or(false)
    {
        return Ok((Arc::new(TestIncompleteExecutor::new(executor)), kind));
    }
    Ok((executor, kind))
}

fn build_default<C: Clock + 'static>(
    selection: Selection,
    evidence: &EvidenceManager,
    clock: C,
) -> (Arc<dyn Executor>, ExecutorKind) {
    if selection.use_claude_code {
        let mut executor = ClaudeCodeExecutor::new(selection.claude_command);
        if let Some(ms) = selection.claude_timeout_ms {
            executor = executor.with_timeout(Duration::from_millis(ms));
        }
        (Arc::new(executor), ExecutorKind::ClaudeCode)
    } else {
        let llm = LlmClient::new(
            selection.provider,
            selection.model,
            0.2,
            evidence.clone(),
            clock,
        );
        (Arc::new(ApiExecutor::new(llm)), ExecutorKind::Api)
    }
}

#[cfg(test)]
#[path = "select_tests.rs"]
mod tests;
