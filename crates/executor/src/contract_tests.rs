// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn task_serializes_with_camel_case_keys() {
    let task = ExecutorTask {
        id: TaskId::new("task-001"),
        prompt: "Create docs/guide.md".to_string(),
        working_dir: PathBuf::from("/work/demo"),
        selected_model: Some("claude-sonnet".to_string()),
        task_type: Some(TaskType::Implementation),
    };
    let value = serde_json::to_value(&task).unwrap();
    assert_eq!(value["workingDir"], "/work/demo");
    assert_eq!(value["selectedModel"], "claude-sonnet");
    assert_eq!(value["taskType"], "IMPLEMENTATION");
}

#[test]
fn result_parses_minimal_shape() {
    let raw = json!({
        "executed": true,
        "status": "COMPLETE",
        "output": "done",
        "verified_files": [{"path": "docs/guide.md", "exists": true, "size": 120}]
    });
    let result: ExecutorResult = serde_json::from_value(raw).unwrap();
    assert_eq!(result.status, ExecStatus::Complete);
    assert!(result.has_existing_verified_file());
    assert!(result.files_modified.is_empty());
    assert!(!result.executor_blocked);
}

#[test]
fn result_parses_blocked_shape() {
    let raw = json!({
        "executed": true,
        "status": "BLOCKED",
        "executor_blocked": true,
        "blocked_reason": "interactive_prompt",
        "terminated_by": "interactive_prompt",
        "timeout_ms": 900000
    });
    let result: ExecutorResult = serde_json::from_value(raw).unwrap();
    assert!(result.executor_blocked);
    assert_eq!(result.blocked_reason, Some(BlockedReason::InteractivePrompt));
    assert_eq!(result.terminated_by, Some(TerminatedBy::InteractivePrompt));
}

#[test]
fn blocked_constructor_sets_metadata() {
    let result = ExecutorResult::blocked(BlockedReason::Timeout, TerminatedBy::Timeout, 5_000);
    assert!(result.executor_blocked);
    assert_eq!(result.status, ExecStatus::Blocked);
    assert_eq!(result.timeout_ms, Some(5_000));
}

#[test]
fn verified_files_distinct_from_files_modified() {
    let result = ExecutorResult::complete("ok")
        .with_files_modified(vec!["a.rs".to_string()])
        .with_verified_file("b.rs", false);
    assert!(!result.has_existing_verified_file());
    assert_eq!(result.files_modified, vec!["a.rs".to_string()]);
}

#[test]
fn status_wire_names() {
    assert_eq!(
        serde_json::to_string(&ExecStatus::NoEvidence).unwrap(),
        "\"NO_EVIDENCE\""
    );
    assert_eq!(ExecStatus::Blocked.to_string(), "BLOCKED");
}
