// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sensitive-data masking applied before any persistence or display.
//!
//! Rules are an ordered list of regex → placeholder substitutions grouped
//! in priority bands, so longer and more specific patterns win. The bands
//! are part of the contract: each matched region is replaced by its band's
//! placeholder, and the rules are applied one at a time — never merged
//! into a single alternation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Returned instead of content when masking itself fails.
pub const MASKING_ERROR: &str = "[MASKING_ERROR]";

struct MaskRule {
    re: Regex,
    replacement: &'static str,
}

/// Ordered pattern table. Band 1 (critical keys) through band 4 (generic).
const PATTERNS: &[(&str, &str)] = &[
    // -- band 1: critical --
    (r"sk-ant-[A-Za-z0-9_\-]{8,}", "[MASKED:ANTHROPIC_KEY]"),
    (r"sk-[A-Za-z0-9_\-]{20,}", "[MASKED:OPENAI_KEY]"),
    (
        r"(?s)-----BEGIN [A-Z ]*PRIVATE KEY-----.*?-----END [A-Z ]*PRIVATE KEY-----",
        "[MASKED:PRIVATE_KEY]",
    ),
    // -- band 2: tokens --
    (
        r"\beyJ[A-Za-z0-9_\-]{4,}\.[A-Za-z0-9_\-]{4,}\.[A-Za-z0-9_\-]{4,}",
        "[MASKED:JWT]",
    ),
    (r"(?i)authorization\s*:\s*[^\r\n]+", "[MASKED:AUTH_HEADER]"),
    (r"(?i)\bset-cookie\s*:\s*[^\r\n]+", "[MASKED:SET_COOKIE]"),
    (r"(?i)\bcookie\s*:\s*[^\r\n]+", "[MASKED:COOKIE]"),
    // -- band 3: credentials --
    (
        r#"(?i)"(api[_-]?key|apikey|password|passwd|secret|token|access[_-]?token|refresh[_-]?token|private[_-]?key|credentials?)"\s*:\s*"[^"]*""#,
        "\"${1}\": \"[MASKED:CREDENTIAL]\"",
    ),
    (
        r"(?m)^(\s*(?:export\s+)?[A-Za-z0-9_]*(?:PASSWORD|SECRET|KEY|TOKEN|CREDENTIAL)[A-Za-z0-9_]*)\s*=\s*\S+",
        "${1}=[MASKED:ENV_VALUE]",
    ),
    (r"(?i)\bbearer\s+[A-Za-z0-9._~+/=\-]+", "[MASKED:BEARER_TOKEN]"),
    // -- band 4: generic --
    (
        r#"(?i)\b(password|passwd|secret|token|api[_-]?key|apikey|credentials?)\b\s*[:=]\s*[^\s"']+"#,
        "[MASKED:GENERIC_SECRET]",
    ),
];

static RULES: Lazy<Vec<MaskRule>> = Lazy::new(|| {
    PATTERNS
        .iter()
        .filter_map(|(pattern, replacement)| {
            Regex::new(pattern).ok().map(|re| MaskRule { re, replacement })
        })
        .collect()
});

fn apply_rules(content: &str) -> String {
    let mut masked = content.to_string();
    for rule in RULES.iter() {
        if rule.re.is_match(&masked) {
            masked = rule.re.replace_all(&masked, rule.replacement).into_owned();
        }
    }
    masked
}

/// Mask sensitive data in a string.
///
/// Never returns raw content on failure: an internal masking fault yields
/// `[MASKING_ERROR]` instead.
pub fn mask(content: &str) -> String {
    let owned = content.to_string();
    match std::panic::catch_unwind(move || apply_rules(&owned)) {
        Ok(masked) => masked,
        Err(_) => MASKING_ERROR.to_string(),
    }
}

/// Mask every string leaf of a composite JSON value.
pub fn mask_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(mask(s)),
        Value::Array(items) => Value::Array(items.iter().map(mask_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), mask_value(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Report only whether an environment key is present. Raw values are
/// never surfaced.
pub fn probe_env(name: &str) -> &'static str {
    if std::env::var_os(name).is_some() {
        "SET"
    } else {
        "NOT SET"
    }
}

#[cfg(test)]
#[path = "mask_tests.rs"]
mod tests;
