// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

fn root() -> TempDir {
    TempDir::new().unwrap()
}

#[test]
fn create_of_existing_file_needs_clarification() {
    let dir = root();
    std::fs::create_dir_all(dir.path().join("docs")).unwrap();
    std::fs::write(dir.path().join("docs/guide.md"), "existing").unwrap();

    let signal = triage("Create docs/guide.md", dir.path()).unwrap();
    assert!(signal.clarification_needed);
    assert_eq!(
        signal.clarification_reason,
        ClarificationReason::TargetFileExists
    );
    assert_eq!(signal.target_file, Some(PathBuf::from("docs/guide.md")));
    assert_eq!(signal.original_prompt, "Create docs/guide.md");
}

#[test]
fn create_of_new_file_passes() {
    let dir = root();
    assert!(triage("Create docs/guide.md", dir.path()).is_none());
}

#[test]
fn update_verb_counts_as_create_type_for_existing_target() {
    let dir = root();
    std::fs::write(dir.path().join("README.md"), "x").unwrap();
    let signal = triage("Update README.md with a usage section", dir.path()).unwrap();
    assert_eq!(
        signal.clarification_reason,
        ClarificationReason::TargetFileExists
    );
}

#[test]
fn truly_ambiguous_create_is_flagged() {
    let dir = root();
    let signal = triage("Create something new", dir.path()).unwrap();
    assert_eq!(
        signal.clarification_reason,
        ClarificationReason::TargetFileAmbiguous
    );
    assert!(signal.target_file.is_none());
}

#[test]
fn japanese_vague_reference_is_flagged() {
    let dir = root();
    let signal = triage("なにか create for the project", dir.path()).unwrap();
    assert_eq!(
        signal.clarification_reason,
        ClarificationReason::TargetFileAmbiguous
    );
}

#[test]
fn create_with_identifier_passes_even_without_file() {
    let dir = root();
    assert!(triage("Create a parser for cron expressions", dir.path()).is_none());
}

#[test]
fn modify_without_target_is_flagged() {
    let dir = root();
    let signal = triage("fix it please", dir.path()).unwrap();
    assert_eq!(
        signal.clarification_reason,
        ClarificationReason::TargetActionAmbiguous
    );
}

#[test]
fn modify_with_named_file_passes() {
    let dir = root();
    assert!(triage("fix src/parser.rs", dir.path()).is_none());
}

#[test]
fn modify_with_identifier_passes() {
    let dir = root();
    assert!(triage("refactor the scheduler", dir.path()).is_none());
}

#[test]
fn empty_instruction_is_missing_info() {
    let dir = root();
    let signal = triage("   ", dir.path()).unwrap();
    assert_eq!(
        signal.clarification_reason,
        ClarificationReason::MissingRequiredInfo
    );
}

#[test]
fn contentless_instruction_is_missing_info() {
    let dir = root();
    let signal = triage("can you please", dir.path()).unwrap();
    assert_eq!(
        signal.clarification_reason,
        ClarificationReason::MissingRequiredInfo
    );
}

#[test]
fn read_style_instruction_passes() {
    let dir = root();
    assert!(triage("Summarize tests/", dir.path()).is_none());
}

#[test]
fn reason_codes_serialize_snake_case() {
    assert_eq!(
        serde_json::to_string(&ClarificationReason::TargetFileExists).unwrap(),
        "\"target_file_exists\""
    );
    assert_eq!(
        serde_json::to_string(&ClarificationReason::MissingRequiredInfo).unwrap(),
        "\"missing_required_info\""
    );
}
