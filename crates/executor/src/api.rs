// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! API executor: answers tasks with an LLM call instead of a subprocess.
//!
//! An LLM cannot edit files, so results carry text output and no
//! verified files; the runner's judgment turns that into COMPLETE for
//! read/report tasks and into a fail-closed status for anything else.

use crate::contract::{ExecStatus, Executor, ExecutorError, ExecutorResult, ExecutorTask};
use crate::llm::{LlmClient, LlmMessage};
use async_trait::async_trait;
use pmo_core::Clock;

/// LLM-backed executor.
pub struct ApiExecutor<C: Clock> {
    llm: LlmClient<C>,
}

impl<C: Clock> ApiExecutor<C> {
    pub fn new(llm: LlmClient<C>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl<C: Clock + 'static> Executor for ApiExecutor<C> {
    fn name(&self) -> &str {
        "api"
    }

    async fn execute(&self, task: ExecutorTask) -> Result<ExecutorResult, ExecutorError> {
        let messages = [LlmMessage::user(task.prompt.clone())];
        match self.llm.complete(&messages).await {
            Ok(reply) => {
                let mut result = ExecutorResult::complete(reply.text)
                    .with_status(ExecStatus::NoEvidence);
                result.duration_ms = reply.duration_ms;
                Ok(result)
            }
            Err(e) => Ok(ExecutorResult::error(e.to_string())),
        }
    }
}
