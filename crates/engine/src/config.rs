// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner configuration.
//!
//! Recognized options are an explicit record, not an option bag: every
//! field the runner honors is enumerated here. Project limits come from
//! `pm-orchestrator.yaml` at the project root.

use pmo_core::{mask_value, ErrorKind, Limits};
use pmo_evidence::Provider;
use pmo_executor::Executor;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Project configuration file name.
pub const PROJECT_CONFIG_FILE: &str = "pm-orchestrator.yaml";

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("bad YAML in {path}: {message}")]
    Yaml { path: PathBuf, message: String },
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}

/// Contents of `pm-orchestrator.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub limits: Limits,
}

/// Load the project config; a missing file yields defaults, bad YAML is
/// fatal at init.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig, ConfigError> {
    let path = project_root.join(PROJECT_CONFIG_FILE);
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ProjectConfig::default())
        }
        Err(e) => return Err(ConfigError::Io { path, source: e }),
    };
    serde_yaml::from_str(&text).map_err(|e| ConfigError::Yaml {
        path,
        message: e.to_string(),
    })
}

/// Agent pool sizing and liveness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Read-only pool capacity.
    pub l1_capacity: usize,
    /// Whether L1 acquisitions beyond capacity queue FIFO.
    pub l1_queueing: bool,
    /// Write-capable pool capacity.
    pub l2_capacity: usize,
    /// Reap L2 workers idle longer than this.
    pub stale_after: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            l1_capacity: 9,
            l1_queueing: true,
            l2_capacity: 4,
            stale_after: Duration::from_secs(300),
        }
    }
}

/// Callback for user-facing clarification questions.
pub type UserResponseHandler = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// The runner's recognized options.
#[derive(Clone)]
pub struct RunnerOptions {
    /// Root for evidence files; defaults to `<project>/.claude/evidence`.
    pub evidence_dir: Option<PathBuf>,
    /// Keep the session going when a task lands on ERROR.
    pub continue_on_task_failure: bool,
    /// Select the real executor subprocess.
    pub use_claude_code: bool,
    /// Subprocess command for the real executor.
    pub claude_command: String,
    /// Per-task wall clock in milliseconds.
    pub claude_code_timeout_ms: Option<u64>,
    /// Select LLM-backed mediation.
    pub enable_auto_resolve: bool,
    /// Provider for LLM-backed mediation and the `api` executor.
    pub auto_resolve_llm_provider: Provider,
    /// Model for the `api` executor and LLM mediation.
    pub model: String,
    /// Callback answering user-facing questions.
    pub user_response_handler: Option<UserResponseHandler>,
    /// Injected executor (testing).
    pub executor: Option<Arc<dyn Executor>>,
    /// Pool sizing.
    pub pool: PoolConfig,
    /// Bound on the in-memory event cache.
    pub event_cache_capacity: usize,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            evidence_dir: None,
            continue_on_task_failure: false,
            use_claude_code: false,
            claude_command: "claude-code".to_string(),
            claude_code_timeout_ms: None,
            enable_auto_resolve: false,
            auto_resolve_llm_provider: Provider::Anthropic,
            model: "claude-sonnet-4-20250514".to_string(),
            user_response_handler: None,
            executor: None,
            pool: PoolConfig::default(),
            event_cache_capacity: 1_000,
        }
    }
}

impl std::fmt::Debug for RunnerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerOptions")
            .field("evidence_dir", &self.evidence_dir)
            .field("continue_on_task_failure", &self.continue_on_task_failure)
            .field("use_claude_code", &self.use_claude_code)
            .field("claude_code_timeout_ms", &self.claude_code_timeout_ms)
            .field("enable_auto_resolve", &self.enable_auto_resolve)
            .field("auto_resolve_llm_provider", &self.auto_resolve_llm_provider)
            .field("model", &self.model)
            .field("executor", &self.executor.as_ref().map(|e| e.name().to_string()))
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl RunnerOptions {
    /// Masked configuration snapshot for the session record.
    pub fn snapshot(&self) -> serde_json::Value {
        mask_value(&json!({
            "evidence_dir": self.evidence_dir,
            "continue_on_task_failure": self.continue_on_task_failure,
            "use_claude_code": self.use_claude_code,
            "claude_code_timeout_ms": self.claude_code_timeout_ms,
            "enable_auto_resolve": self.enable_auto_resolve,
            "auto_resolve_llm_provider": self.auto_resolve_llm_provider,
            "model": self.model,
            "executor": self.executor.as_ref().map(|e| e.name().to_string()),
            "l1_capacity": self.pool.l1_capacity,
            "l2_capacity": self.pool.l2_capacity,
            "stale_after_s": self.pool.stale_after.as_secs(),
            "event_cache_capacity": self.event_cache_capacity,
        }))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
