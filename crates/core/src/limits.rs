// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource limits enforced at admission time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_max_files() -> u32 {
    20
}

fn default_max_tests() -> u32 {
    50
}

fn default_max_seconds() -> u64 {
    900
}

/// Per-project limits, loadable from `pm-orchestrator.yaml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    #[serde(default = "default_max_files")]
    pub max_files: u32,
    #[serde(default = "default_max_tests")]
    pub max_tests: u32,
    #[serde(default = "default_max_seconds")]
    pub max_seconds: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            max_tests: default_max_tests(),
            max_seconds: default_max_seconds(),
        }
    }
}

impl Limits {
    pub fn check_files(&self, actual: u32, at: DateTime<Utc>) -> Option<LimitViolation> {
        (actual > self.max_files).then(|| LimitViolation {
            limit: "max_files".to_string(),
            actual: actual as u64,
            max: self.max_files as u64,
            at,
        })
    }

    pub fn check_tests(&self, actual: u32, at: DateTime<Utc>) -> Option<LimitViolation> {
        (actual > self.max_tests).then(|| LimitViolation {
            limit: "max_tests".to_string(),
            actual: actual as u64,
            max: self.max_tests as u64,
            at,
        })
    }

    pub fn check_seconds(&self, actual: u64, at: DateTime<Utc>) -> Option<LimitViolation> {
        (actual > self.max_seconds).then(|| LimitViolation {
            limit: "max_seconds".to_string(),
            actual,
            max: self.max_seconds,
            at,
        })
    }
}

/// An accumulated record of a limit exceeded at admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitViolation {
    pub limit: String,
    pub actual: u64,
    pub max: u64,
    pub at: DateTime<Utc>,
}

impl std::fmt::Display for LimitViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} exceeded: {} > {}", self.limit, self.actual, self.max)
    }
}

#[cfg(test)]
#[path = "limits_tests.rs"]
mod tests;
