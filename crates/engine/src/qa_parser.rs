// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parser over Mocha/Jest-style test runner output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Counts extracted from runner output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCounts {
    pub passing: u32,
    pub failing: u32,
    pub pending: u32,
}

/// Scope tag for a failing test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestScope {
    InScope,
    OutOfScope,
}

/// One failing test with its scope tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailingTest {
    pub name: String,
    pub scope: TestScope,
}

fn re(pattern: &str) -> Option<Regex> {
    Regex::new(pattern).ok()
}

static MOCHA_PASSING: Lazy<Option<Regex>> = Lazy::new(|| re(r"(\d+)\s+passing"));
static MOCHA_FAILING: Lazy<Option<Regex>> = Lazy::new(|| re(r"(\d+)\s+failing"));
static MOCHA_PENDING: Lazy<Option<Regex>> = Lazy::new(|| re(r"(\d+)\s+pending"));
static JEST_PASSED: Lazy<Option<Regex>> = Lazy::new(|| re(r"(\d+)\s+passed"));
static JEST_FAILED: Lazy<Option<Regex>> = Lazy::new(|| re(r"(\d+)\s+failed"));
static JEST_SKIPPED: Lazy<Option<Regex>> = Lazy::new(|| re(r"(\d+)\s+skipped"));
static MOCHA_FAILURE_LINE: Lazy<Option<Regex>> = Lazy::new(|| re(r"(?m)^\s*\d+\)\s+(.+)$"));
static JEST_FAILURE_LINE: Lazy<Option<Regex>> = Lazy::new(|| re(r"(?m)^\s*[✕✗]\s+(.+)$"));

fn capture_count(pattern: &Lazy<Option<Regex>>, output: &str) -> Option<u32> {
    pattern
        .as_ref()?
        .captures(output)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

/// Extract `{passing, failing, pending}` from test runner output.
///
/// Mocha-style counts win when present; Jest's `Tests:` summary is the
/// fallback. Unrecognized output parses as all zeros.
pub fn parse_test_output(output: &str) -> TestCounts {
    let mocha = TestCounts {
        passing: capture_count(&MOCHA_PASSING, output).unwrap_or(0),
        failing: capture_count(&MOCHA_FAILING, output).unwrap_or(0),
        pending: capture_count(&MOCHA_PENDING, output).unwrap_or(0),
    };
    if mocha != TestCounts::default() {
        return mocha;
    }
    TestCounts {
        passing: capture_count(&JEST_PASSED, output).unwrap_or(0),
        failing: capture_count(&JEST_FAILED, output).unwrap_or(0),
        pending: capture_count(&JEST_SKIPPED, output).unwrap_or(0),
    }
}

/// Substrings marking a failure as outside the change's scope.
const OUT_OF_SCOPE_MARKERS: &[&str] = &["integration", "e2e", "external"];

/// List failing tests and tag each as in or out of scope.
///
/// Scope is advisory only: OUT_OF_SCOPE failures still fail the gate.
pub fn extract_failing_tests(output: &str) -> Vec<FailingTest> {
    let mut failing = Vec::new();
    for pattern in [&MOCHA_FAILURE_LINE, &JEST_FAILURE_LINE] {
        let Some(re) = pattern.as_ref() else { continue };
        for captures in re.captures_iter(output) {
            let Some(name) = captures.get(1) else { continue };
            let name = name.as_str().trim().to_string();
            let lower = name.to_lowercase();
            let scope = if OUT_OF_SCOPE_MARKERS
                .iter()
                .any(|marker| lower.contains(marker))
            {
                TestScope::OutOfScope
            } else {
                TestScope::InScope
            };
            failing.push(FailingTest { name, scope });
        }
    }
    failing
}

#[cfg(test)]
#[path = "qa_parser_tests.rs"]
mod tests;
