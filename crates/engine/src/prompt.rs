// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor prompt assembly.
//!
//! The prompt is assembled in a fixed, auditable order: global preamble,
//! optional template rules, project preamble, task-group preamble, user
//! input, optional template output format, output epilogue. The
//! assembled text is logged; the executor sees no additional hidden
//! text.

use serde::{Deserialize, Serialize};

/// Default framing around every task.
pub const GLOBAL_PREAMBLE: &str = "You are a code-editing executor. Work only inside the \
working directory you are given, modify only what the task requires, and report every file \
you touch.";

/// Default closing instruction.
pub const OUTPUT_EPILOGUE: &str = "When finished, report the final status, the files you \
modified, and verification for each file you claim to have produced.";

/// The ordered parts of an executor prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptParts {
    pub global_preamble: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_rules: Option<String>,
    pub project_preamble: String,
    pub task_group_preamble: String,
    pub user_input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_output_format: Option<String>,
    pub output_epilogue: String,
}

impl PromptParts {
    /// Standard parts for a task in a project.
    pub fn for_task(
        user_input: impl Into<String>,
        project_preamble: impl Into<String>,
        task_group_preamble: impl Into<String>,
    ) -> Self {
        Self {
            global_preamble: GLOBAL_PREAMBLE.to_string(),
            template_rules: None,
            project_preamble: project_preamble.into(),
            task_group_preamble: task_group_preamble.into(),
            user_input: user_input.into(),
            template_output_format: None,
            output_epilogue: OUTPUT_EPILOGUE.to_string(),
        }
    }

    pub fn with_template_rules(mut self, rules: impl Into<String>) -> Self {
        self.template_rules = Some(rules.into());
        self
    }

    pub fn with_output_format(mut self, format: impl Into<String>) -> Self {
        self.template_output_format = Some(format.into());
        self
    }
}

/// Deterministic assembly of the parts, in order, separated by blank
/// lines. Empty sections are skipped; the result always begins with the
/// global preamble and ends with the output epilogue.
pub fn assemble_prompt(parts: &PromptParts) -> String {
    let ordered: [Option<&str>; 7] = [
        some_if_nonempty(&parts.global_preamble),
        parts.template_rules.as_deref().and_then(some_if_nonempty),
        some_if_nonempty(&parts.project_preamble),
        some_if_nonempty(&parts.task_group_preamble),
        some_if_nonempty(&parts.user_input),
        parts
            .template_output_format
            .as_deref()
            .and_then(some_if_nonempty),
        some_if_nonempty(&parts.output_epilogue),
    ];
    ordered
        .into_iter()
        .flatten()
        .collect::<Vec<&str>>()
        .join("\n\n")
}

fn some_if_nonempty(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
