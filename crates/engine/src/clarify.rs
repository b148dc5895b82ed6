// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clarification triage.
//!
//! A rule-based detector over the natural-language task. It returns one
//! structured reason code and never any phrasing — turning codes into
//! questions is the mediation layer's job, which keeps the runner free
//! of conversational text and locale.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Closed set of reasons conveyed to mediation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClarificationReason {
    /// Create-type verb and the named file already exists on disk.
    TargetFileExists,
    /// Create-type verb, no named file, and the prompt is truly ambiguous.
    TargetFileAmbiguous,
    /// Modify-type verb with no identifiable target.
    TargetActionAmbiguous,
    /// Otherwise insufficient context.
    MissingRequiredInfo,
}

/// Structured signal from the runner to mediation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarificationSignal {
    pub clarification_needed: bool,
    pub clarification_reason: ClarificationReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_file: Option<PathBuf>,
    pub original_prompt: String,
}

impl ClarificationSignal {
    fn new(reason: ClarificationReason, prompt: &str) -> Self {
        Self {
            clarification_needed: true,
            clarification_reason: reason,
            target_file: None,
            original_prompt: prompt.to_string(),
        }
    }

    fn with_target(mut self, target: PathBuf) -> Self {
        self.target_file = Some(target);
        self
    }
}

const CREATE_VERBS: &[&str] = &["create", "add", "update", "write", "make", "generate", "new"];
const MODIFY_VERBS: &[&str] = &[
    "modify", "change", "edit", "fix", "refactor", "rename", "delete", "remove",
];
const VAGUE_TERMS: &[&str] = &["something", "anything", "stuff", "somewhere", "なにか", "何か"];

/// Words that never count as a candidate identifier.
static KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "and", "for", "with", "from", "into", "that", "this", "please", "file", "files",
        "some", "any", "all", "one", "two", "then", "them", "there", "here", "now", "can", "you",
        "project", "code",
    ]
    .iter()
    .copied()
    .chain(CREATE_VERBS.iter().copied())
    .chain(MODIFY_VERBS.iter().copied())
    .chain(VAGUE_TERMS.iter().copied())
    .collect()
});

/// Classify a natural-language task. `None` means no clarification is
/// required and the executor may be invoked.
pub fn triage(instruction: &str, project_root: &Path) -> Option<ClarificationSignal> {
    let trimmed = instruction.trim();
    if trimmed.is_empty() {
        return Some(ClarificationSignal::new(
            ClarificationReason::MissingRequiredInfo,
            instruction,
        ));
    }

    let lower = trimmed.to_lowercase();
    let has_create_verb = CREATE_VERBS.iter().any(|verb| contains_word(&lower, verb));
    let has_modify_verb = MODIFY_VERBS.iter().any(|verb| contains_word(&lower, verb));
    let named_file = named_path(trimmed);
    let vague = VAGUE_TERMS.iter().any(|term| lower.contains(term));
    let has_identifier = has_candidate_identifier(&lower);

    if has_create_verb {
        if let Some(file) = &named_file {
            if project_root.join(file).exists() {
                return Some(
                    ClarificationSignal::new(ClarificationReason::TargetFileExists, trimmed)
                        .with_target(file.clone()),
                );
            }
            return None;
        }
        // Truly ambiguous: nothing identifier-like and a vague reference.
        if !has_identifier && vague {
            return Some(ClarificationSignal::new(
                ClarificationReason::TargetFileAmbiguous,
                trimmed,
            ));
        }
        return None;
    }

    if has_modify_verb {
        if named_file.is_none() && !has_identifier {
            return Some(ClarificationSignal::new(
                ClarificationReason::TargetActionAmbiguous,
                trimmed,
            ));
        }
        return None;
    }

    if named_file.is_none() && !has_identifier {
        return Some(ClarificationSignal::new(
            ClarificationReason::MissingRequiredInfo,
            trimmed,
        ));
    }
    None
}

/// A path-looking token: contains a slash, or an interior dot.
fn named_path(instruction: &str) -> Option<PathBuf> {
    instruction
        .split_whitespace()
        .map(|token| {
            token.trim_matches(|c: char| {
                !c.is_ascii_alphanumeric() && c != '/' && c != '.' && c != '_' && c != '-'
            })
        })
        .find(|token| {
            token.contains('/')
                || (token.contains('.') && !token.starts_with('.') && !token.ends_with('.'))
        })
        .map(PathBuf::from)
}

/// A candidate identifier: length ≥ 3, alphanumeric/underscore, outside
/// the closed keyword list.
fn has_candidate_identifier(lower: &str) -> bool {
    lower
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .any(|token| token.len() >= 3 && !KEYWORDS.contains(token))
}

fn contains_word(lower: &str, word: &str) -> bool {
    lower
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .any(|token| token == word)
}

#[cfg(test)]
#[path = "clarify_tests.rs"]
mod tests;
