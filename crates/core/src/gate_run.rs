// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! QA-gate run identifiers.
//!
//! A gate run ID is `YYYYMMDD-HHmmss-mmm-<shortSha>-<cmdHash8>`. The
//! timestamp prefix makes plain string ordering temporal ordering, which
//! is what stale-run detection relies on.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static SHAPE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^\d{8}-\d{6}-\d{3}-[0-9a-f]{7,12}-[0-9a-f]{8}$").ok()
});

/// Errors from parsing a gate run ID.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateRunIdError {
    #[error("malformed gate run id: {0:?}")]
    Malformed(String),
}

/// Identifier of one QA-gate execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GateRunId(String);

impl GateRunId {
    /// Parse and validate an ID string.
    pub fn parse(raw: &str) -> Result<Self, GateRunIdError> {
        let valid = SHAPE
            .as_ref()
            .map(|re| re.is_match(raw))
            .unwrap_or(false);
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(GateRunIdError::Malformed(raw.to_string()))
        }
    }

    /// Construct without validation (for IDs produced by this process).
    pub fn new_unchecked(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `YYYYMMDD-HHmmss-mmm` prefix, or the whole string when shorter.
    pub fn timestamp_prefix(&self) -> &str {
        if self.0.len() >= 19 {
            &self.0[..19]
        } else {
            &self.0
        }
    }

    /// Temporal comparison by timestamp prefix.
    pub fn is_older_than(&self, other: &GateRunId) -> bool {
        self.timestamp_prefix() < other.timestamp_prefix()
    }
}

impl std::fmt::Display for GateRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GateRunId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
#[path = "gate_run_tests.rs"]
mod tests;
