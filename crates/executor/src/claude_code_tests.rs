// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pmo_core::TaskId;
use tempfile::TempDir;

fn task(dir: &TempDir) -> ExecutorTask {
    ExecutorTask {
        id: TaskId::new("task-001"),
        prompt: "Create docs/guide.md".to_string(),
        working_dir: dir.path().to_path_buf(),
        selected_model: None,
        task_type: None,
    }
}

/// A fake executor: a shell one-liner that consumes stdin and prints a
/// canned contract result.
fn script_executor(script: &str) -> ClaudeCodeExecutor {
    ClaudeCodeExecutor::new("sh").with_args(vec!["-c".to_string(), script.to_string()])
}

#[tokio::test]
async fn parses_contract_result_from_stdout() {
    let dir = TempDir::new().unwrap();
    let exec = script_executor(
        r#"cat > /dev/null; echo '{"executed":true,"status":"COMPLETE","output":"done","verified_files":[{"path":"docs/guide.md","exists":true}]}'"#,
    );
    let result = exec.execute(task(&dir)).await.unwrap();
    assert_eq!(result.status, ExecStatus::Complete);
    assert!(result.has_existing_verified_file());
    assert!(result.executed);
}

#[tokio::test]
async fn nonzero_exit_becomes_error_result() {
    let dir = TempDir::new().unwrap();
    let exec = script_executor("cat > /dev/null; echo boom >&2; exit 3");
    let result = exec.execute(task(&dir)).await.unwrap();
    assert_eq!(result.status, ExecStatus::Error);
    assert!(!result.executed);
    assert!(result.error.as_deref().unwrap_or_default().contains("boom"));
}

#[tokio::test]
async fn malformed_output_becomes_error_result() {
    let dir = TempDir::new().unwrap();
    let exec = script_executor("cat > /dev/null; echo 'not json'");
    let result = exec.execute(task(&dir)).await.unwrap();
    assert_eq!(result.status, ExecStatus::Error);
    assert!(result
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("malformed"));
}

#[tokio::test]
async fn timeout_terminates_and_reports_blocked() {
    let dir = TempDir::new().unwrap();
    let exec = script_executor("cat > /dev/null; sleep 30")
        .with_timeout(std::time::Duration::from_millis(200));
    let result = exec.execute(task(&dir)).await.unwrap();
    assert!(result.executor_blocked);
    assert_eq!(result.status, ExecStatus::Blocked);
    assert_eq!(result.terminated_by, Some(TerminatedBy::Timeout));
    assert_eq!(result.blocked_reason, Some(BlockedReason::Timeout));
    assert_eq!(result.timeout_ms, Some(200));
}

#[tokio::test]
async fn missing_command_is_a_spawn_fault() {
    let dir = TempDir::new().unwrap();
    let exec = ClaudeCodeExecutor::new("definitely-not-a-real-binary-xyz");
    let err = exec.execute(task(&dir)).await.unwrap_err();
    assert!(matches!(err, ExecutorError::SpawnFailed(_)));
}

#[tokio::test]
async fn child_blocked_flag_forces_blocked_status() {
    let dir = TempDir::new().unwrap();
    let exec = script_executor(
        r#"cat > /dev/null; echo '{"executed":true,"status":"INCOMPLETE","executor_blocked":true,"blocked_reason":"interactive_prompt"}'"#,
    );
    let result = exec.execute(task(&dir)).await.unwrap();
    assert_eq!(result.status, ExecStatus::Blocked);
}
