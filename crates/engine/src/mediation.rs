// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mediation layer: conversational phrasing lives here, not in the runner.
//!
//! Mediation consumes the runner's structured clarification signal and
//! either emits a natural-language question for the user, or normalizes
//! the user's reply into a deterministic follow-up task. Two back-ends
//! share the interface: a regex/keyword one with no network, and an
//! LLM-backed one whose question text may vary across runs while the
//! normalized structure stays inside the closed action enumeration.

use crate::clarify::{ClarificationReason, ClarificationSignal};
use async_trait::async_trait;
use pmo_core::Clock;
use pmo_executor::{LlmClient, LlmMessage};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors from mediation.
#[derive(Debug, Error)]
pub enum MediationError {
    #[error("llm call failed: {0}")]
    Llm(String),
    #[error("normalization did not produce a recognized action: {0}")]
    InvalidNormalization(String),
}

/// Closed set of follow-up actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpAction {
    Create,
    Overwrite,
    CreateNew,
    Modify,
    Cancel,
}

/// A deterministic follow-up task built from the user's reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpTask {
    pub explicit_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_file: Option<PathBuf>,
    pub action: FollowUpAction,
    pub original_context: String,
}

/// The mediation interface between runner and front-end.
#[async_trait]
pub trait Mediator: Send + Sync {
    fn name(&self) -> &str;

    /// Phrase a user-facing question for a clarification signal.
    async fn question_for(&self, signal: &ClarificationSignal) -> Result<String, MediationError>;

    /// Normalize the user's reply into a follow-up task.
    async fn normalize(
        &self,
        signal: &ClarificationSignal,
        user_response: &str,
    ) -> Result<FollowUpTask, MediationError>;
}

/// Keyword mediation; no network.
#[derive(Default)]
pub struct DeterministicMediator;

impl DeterministicMediator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Mediator for DeterministicMediator {
    fn name(&self) -> &str {
        "deterministic"
    }

    async fn question_for(&self, signal: &ClarificationSignal) -> Result<String, MediationError> {
        let file = signal
            .target_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let question = match signal.clarification_reason {
            ClarificationReason::TargetFileExists => format!(
                "{file} already exists. Overwrite it, create a new file, modify the existing one, or cancel?"
            ),
            ClarificationReason::TargetFileAmbiguous => {
                "Which file should be created? Please name the target path.".to_string()
            }
            ClarificationReason::TargetActionAmbiguous => {
                "Which file or component should be changed?".to_string()
            }
            ClarificationReason::MissingRequiredInfo => {
                "More context is needed to run this task. What exactly should be done?"
                    .to_string()
            }
        };
        Ok(question)
    }

    async fn normalize(
        &self,
        signal: &ClarificationSignal,
        user_response: &str,
    ) -> Result<FollowUpTask, MediationError> {
        let action = classify_response(user_response);
        let file = signal.target_file.clone();
        let file_display = file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "the target file".to_string());

        let explicit_prompt = match action {
            FollowUpAction::Overwrite => format!(
                "Overwrite {file_display} with the requested content. Original request: {}",
                signal.original_prompt
            ),
            FollowUpAction::CreateNew => format!(
                "Create a new file instead of touching {file_display}. Original request: {}. User said: {}",
                signal.original_prompt, user_response
            ),
            FollowUpAction::Modify => format!(
                "Modify the existing {file_display} as requested. Original request: {}",
                signal.original_prompt
            ),
            FollowUpAction::Cancel => String::new(),
            FollowUpAction::Create => format!(
                "{}. User clarified: {}",
                signal.original_prompt, user_response
            ),
        };

        Ok(FollowUpTask {
            explicit_prompt,
            target_file: file,
            action,
            original_context: signal.original_prompt.clone(),
        })
    }
}

/// Keyword classification of a user reply.
fn classify_response(response: &str) -> FollowUpAction {
    let lower = response.to_lowercase();
    if ["cancel", "stop", "abort", "never mind", "nevermind"]
        .iter()
        .any(|kw| lower.contains(kw))
    {
        return FollowUpAction::Cancel;
    }
    if ["overwrite", "replace", "上書き"].iter().any(|kw| lower.contains(kw)) {
        return FollowUpAction::Overwrite;
    }
    if ["new file", "different file", "another file", "create new", "別の"]
        .iter()
        .any(|kw| lower.contains(kw))
    {
        return FollowUpAction::CreateNew;
    }
    if ["modify", "edit", "keep and", "existing"]
        .iter()
        .any(|kw| lower.contains(kw))
    {
        return FollowUpAction::Modify;
    }
    FollowUpAction::Create
}

/// LLM-backed mediation. Question text may vary; the normalized
/// structure is validated against the closed enumeration.
pub struct LlmMediator<C: Clock> {
    llm: LlmClient<C>,
}

impl<C: Clock> LlmMediator<C> {
    /// The client should be constructed with `temperature > 0`; replies
    /// are language, not code.
    pub fn new(llm: LlmClient<C>) -> Self {
        Self { llm }
    }
}

#[derive(Deserialize)]
struct NormalizedReply {
    action: FollowUpAction,
    #[serde(default)]
    explicit_prompt: String,
    #[serde(default)]
    target_file: Option<PathBuf>,
}

#[async_trait]
impl<C: Clock + 'static> Mediator for LlmMediator<C> {
    fn name(&self) -> &str {
        "llm"
    }

    async fn question_for(&self, signal: &ClarificationSignal) -> Result<String, MediationError> {
        let prompt = format!(
            "A task runner needs clarification from its user.\n\
             Reason code: {:?}\n\
             Target file: {}\n\
             Original request: {}\n\
             Write one short question to ask the user. Reply with the question only.",
            signal.clarification_reason,
            signal
                .target_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".to_string()),
            signal.original_prompt,
        );
        let reply = self
            .llm
            .complete(&[LlmMessage::user(prompt)])
            .await
            .map_err(|e| MediationError::Llm(e.to_string()))?;
        Ok(reply.text.trim().to_string())
    }

    async fn normalize(
        &self,
        signal: &ClarificationSignal,
        user_response: &str,
    ) -> Result<FollowUpTask, MediationError> {
        let prompt = format!(
            "A user replied to a clarification question.\n\
             Original request: {}\n\
             Reason code: {:?}\n\
             Target file: {}\n\
             User reply: {}\n\
             Respond with JSON only: {{\"action\": one of \
             [\"create\",\"overwrite\",\"create_new\",\"modify\",\"cancel\"], \
             \"explicit_prompt\": string, \"target_file\": string or null}}.",
            signal.original_prompt,
            signal.clarification_reason,
            signal
                .target_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".to_string()),
            user_response,
        );
        let reply = self
            .llm
            .complete(&[LlmMessage::user(prompt)])
            .await
            .map_err(|e| MediationError::Llm(e.to_string()))?;

        let parsed: NormalizedReply = serde_json::from_str(extract_json(&reply.text))
            .map_err(|e| MediationError::InvalidNormalization(e.to_string()))?;
        Ok(FollowUpTask {
            explicit_prompt: parsed.explicit_prompt,
            target_file: parsed.target_file.or_else(|| signal.target_file.clone()),
            action: parsed.action,
            original_context: signal.original_prompt.clone(),
        })
    }
}

/// Trim chatter around a JSON object in an LLM reply.
fn extract_json(text: &str) -> &str {
    let start = text.find('{');
    let end = text.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if end >= start => &text[start..=end],
        _ => text,
    }
}

#[cfg(test)]
#[path = "mediation_tests.rs"]
mod tests;
