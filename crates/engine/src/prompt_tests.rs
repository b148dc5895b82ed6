// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn parts() -> PromptParts {
    PromptParts::for_task("Create docs/guide.md", "Project: demo", "Group: docs")
}

#[test]
fn begins_with_global_preamble_and_ends_with_epilogue() {
    let prompt = assemble_prompt(&parts());
    assert!(prompt.starts_with(GLOBAL_PREAMBLE));
    assert!(prompt.ends_with(OUTPUT_EPILOGUE));
}

#[test]
fn sections_appear_in_fixed_order() {
    let prompt = assemble_prompt(
        &parts()
            .with_template_rules("Rule: no TODOs")
            .with_output_format("Format: JSON"),
    );
    let positions: Vec<usize> = [
        GLOBAL_PREAMBLE,
        "Rule: no TODOs",
        "Project: demo",
        "Group: docs",
        "Create docs/guide.md",
        "Format: JSON",
        OUTPUT_EPILOGUE,
    ]
    .iter()
    .map(|section| prompt.find(section).unwrap())
    .collect();
    let mut sorted = positions.clone();
    sorted.sort_unstable();
    assert_eq!(positions, sorted);
}

#[test]
fn optional_sections_are_skipped_silently() {
    let prompt = assemble_prompt(&parts());
    assert!(!prompt.contains("Rule:"));
    assert!(!prompt.contains("Format:"));
    assert_eq!(prompt.matches("\n\n").count(), 4);
}

#[test]
fn assembly_is_deterministic() {
    let a = assemble_prompt(&parts().with_template_rules("r"));
    let b = assemble_prompt(&parts().with_template_rules("r"));
    assert_eq!(a, b);
}

#[test]
fn empty_sections_do_not_leave_blank_runs() {
    let mut p = parts();
    p.project_preamble = String::new();
    p.task_group_preamble = "   ".to_string();
    let prompt = assemble_prompt(&p);
    assert!(!prompt.contains("\n\n\n"));
    assert!(prompt.contains("Create docs/guide.md"));
}
