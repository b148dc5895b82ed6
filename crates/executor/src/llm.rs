// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! LLM HTTP client with mandatory evidence.
//!
//! Every call — success or failure — is recorded through the evidence
//! manager before the reply is returned. Key values are read from the
//! provider's environment key at call time and never logged.

use pmo_core::{Clock, LlmCallId};
use pmo_evidence::{CallOutcome, EvidenceManager, Provider};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

/// HTTP timeout for a single call.
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors from LLM calls.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("missing credential: {0}")]
    MissingKey(&'static str),
    #[error("network error: {0}")]
    Network(String),
    #[error("upstream status {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("unexpected response shape")]
    MalformedResponse,
    #[error("evidence error: {0}")]
    Evidence(String),
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: String,
    pub content: String,
}

impl LlmMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

/// A completed call.
#[derive(Debug, Clone)]
pub struct LlmReply {
    pub call_id: LlmCallId,
    pub text: String,
    pub duration_ms: u64,
}

/// Evidenced LLM client.
pub struct LlmClient<C: Clock> {
    provider: Provider,
    model: String,
    temperature: f32,
    base_url: Option<String>,
    client: reqwest::Client,
    evidence: EvidenceManager,
    clock: C,
}

impl<C: Clock> LlmClient<C> {
    pub fn new(
        provider: Provider,
        model: impl Into<String>,
        temperature: f32,
        evidence: EvidenceManager,
        clock: C,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            base_url: None,
            client: reqwest::Client::new(),
            evidence,
            clock,
        }
    }

    /// Override the provider endpoint (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a chat completion. The call is evidenced either way.
    pub async fn complete(&self, messages: &[LlmMessage]) -> Result<LlmReply, LlmError> {
        let key = std::env::var(self.provider.env_key())
            .map_err(|_| LlmError::MissingKey(self.provider.env_key()))?;

        let call_id = LlmCallId::generate(&self.clock);
        let started = self.clock.now();
        let request_messages =
            serde_json::to_value(messages).unwrap_or_else(|_| Value::Array(Vec::new()));

        let outcome = self.send(&key, messages).await;
        let duration_ms = self
            .clock
            .now()
            .saturating_duration_since(started)
            .as_millis() as u64;
        let timestamp = self.clock.timestamp();

        let (response_text, error) = match &outcome {
            Ok(text) => (Some(text.clone()), None),
            Err(e) => (None, Some(e.to_string())),
        };
        self.evidence
            .record_call(CallOutcome {
                call_id: call_id.clone(),
                provider: self.provider,
                model: self.model.clone(),
                request_messages,
                response_text,
                timestamp,
                duration_ms,
                success: outcome.is_ok(),
                error,
            })
            .map_err(|e| LlmError::Evidence(e.to_string()))?;

        let text = outcome?;
        Ok(LlmReply {
            call_id,
            text,
            duration_ms,
        })
    }

    async fn send(&self, key: &str, messages: &[LlmMessage]) -> Result<String, LlmError> {
        let url = self.endpoint();
        let body = request_body(self.provider, &self.model, self.temperature, messages);

        let mut request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .timeout(HTTP_TIMEOUT)
            .json(&body);
        request = match self.provider {
            Provider::Openai => request.bearer_auth(key),
            Provider::Anthropic => request
                .header("x-api-key", key)
                .header("anthropic-version", "2023-06-01"),
        };

        let response = request
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Upstream { status, message });
        }

        let value: Value = response
            .json()
            .await
            .map_err(|_| LlmError::MalformedResponse)?;
        extract_text(self.provider, &value).ok_or(LlmError::MalformedResponse)
    }

    fn endpoint(&self) -> String {
        match (&self.base_url, self.provider) {
            (Some(base), Provider::Openai) => format!("{base}/v1/chat/completions"),
            (Some(base), Provider::Anthropic) => format!("{base}/v1/messages"),
            (None, Provider::Openai) => "https://api.openai.com/v1/chat/completions".to_string(),
            (None, Provider::Anthropic) => "https://api.anthropic.com/v1/messages".to_string(),
        }
    }
}

/// Provider-specific request body.
fn request_body(provider: Provider, model: &str, temperature: f32, messages: &[LlmMessage]) -> Value {
    match provider {
        Provider::Openai => json!({
            "model": model,
            "temperature": temperature,
            "messages": messages,
        }),
        Provider::Anthropic => {
            // Anthropic takes the system prompt out of the message list.
            let system: Vec<&str> = messages
                .iter()
                .filter(|m| m.role == "system")
                .map(|m| m.content.as_str())
                .collect();
            let chat: Vec<&LlmMessage> =
                messages.iter().filter(|m| m.role != "system").collect();
            let mut body = json!({
                "model": model,
                "max_tokens": 4096,
                "temperature": temperature,
                "messages": chat,
            });
            if !system.is_empty() {
                body["system"] = Value::String(system.join("\n"));
            }
            body
        }
    }
}

/// Pull the reply text out of a provider response.
fn extract_text(provider: Provider, value: &Value) -> Option<String> {
    match provider {
        Provider::Openai => value
            .get("choices")?
            .get(0)?
            .get("message")?
            .get("content")?
            .as_str()
            .map(str::to_string),
        Provider::Anthropic => value
            .get("content")?
            .get(0)?
            .get("text")?
            .as_str()
            .map(str::to_string),
    }
}

#[cfg(test)]
#[path = "llm_tests.rs"]
mod tests;
