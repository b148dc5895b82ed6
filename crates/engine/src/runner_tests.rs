// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pmo_core::FakeClock;
use pmo_core::Visibility;
use pmo_executor::{ExecStatus, ExecutorResult, StubExecutor};
use serial_test::serial;
use tempfile::TempDir;

const KEY: &str = "ANTHROPIC_API_KEY";

struct Fixture {
    dir: TempDir,
    runner: Runner<FakeClock>,
    stub: StubExecutor,
}

fn fixture_with(options: impl FnOnce(&mut RunnerOptions)) -> Fixture {
    let dir = TempDir::new().unwrap();
    let stub = StubExecutor::new();
    let mut opts = RunnerOptions {
        executor: Some(Arc::new(stub.clone())),
        ..RunnerOptions::default()
    };
    options(&mut opts);
    Fixture {
        dir,
        runner: Runner::with_clock(opts, FakeClock::at_epoch_ms(1_760_000_000_000)),
        stub,
    }
}

fn fixture() -> Fixture {
    fixture_with(|_| {})
}

async fn init(f: &mut Fixture) -> SessionId {
    f.runner.initialize(f.dir.path()).await.unwrap()
}

fn complete_result(path: &str) -> ExecutorResult {
    ExecutorResult::complete("done")
        .with_verified_file(path, true)
        .with_files_modified(vec![path.to_string()])
}

// --- scenario: create a file successfully ---

#[tokio::test]
#[serial]
async fn successful_create_completes_task_and_session() {
    std::env::set_var(KEY, "sk-ant-test");
    let mut f = fixture();
    init(&mut f).await;
    f.stub.push_result(complete_result("docs/guide.md"));

    let report = f
        .runner
        .execute(
            vec![TaskSpec::new("Create docs/guide.md").with_id("task-001")],
            None,
        )
        .await
        .unwrap();
    assert_eq!(report.overall, OverallStatus::Complete);
    assert_eq!(report.outcomes[0].status, TaskStatus::Completed);

    // Exactly one terminal event in the task log.
    let detail = f
        .runner
        .task_detail(&report.outcomes[0].task_id, Visibility::Full)
        .unwrap();
    assert_eq!(detail.terminal_event_count(), 1);

    // Evidence file exists and the sentinel passes at session close.
    let overall = f.runner.complete_session(false).await.unwrap();
    assert_eq!(overall, OverallStatus::Complete);
    std::env::remove_var(KEY);
}

// --- scenario: clarification on existing file ---

#[tokio::test]
#[serial]
async fn existing_target_skips_executor_and_goes_incomplete() {
    let mut f = fixture();
    std::fs::create_dir_all(f.dir.path().join("docs")).unwrap();
    std::fs::write(f.dir.path().join("docs/guide.md"), "existing").unwrap();
    init(&mut f).await;

    let report = f
        .runner
        .execute(vec![TaskSpec::new("Create docs/guide.md")], None)
        .await
        .unwrap();

    assert_eq!(f.stub.call_count(), 0, "executor must not be invoked");
    let outcome = &report.outcomes[0];
    assert_eq!(outcome.status, TaskStatus::Incomplete);
    let signal = outcome.clarification.as_ref().unwrap();
    assert!(signal.clarification_needed);
    assert_eq!(
        signal.clarification_reason,
        ClarificationReason::TargetFileExists
    );
    assert_eq!(
        signal.target_file.as_deref(),
        Some(Path::new("docs/guide.md"))
    );
    assert_eq!(report.overall, OverallStatus::Incomplete);
}

// --- scenario: no evidence from executor ---

#[tokio::test]
#[serial]
async fn no_evidence_implementation_is_an_error() {
    let mut f = fixture();
    init(&mut f).await;
    f.stub
        .push_result(ExecutorResult::complete("").with_status(ExecStatus::NoEvidence));

    let report = f
        .runner
        .execute(vec![TaskSpec::new("Implement the cache layer")], None)
        .await
        .unwrap();
    let outcome = &report.outcomes[0];
    assert_eq!(outcome.status, TaskStatus::Error);
    assert_eq!(outcome.error_message.as_deref(), Some("no evidence of work"));
    assert_eq!(report.overall, OverallStatus::Error);
}

// --- scenario: READ_INFO with output ---

#[tokio::test]
#[serial]
async fn read_info_with_output_completes_without_files() {
    let mut f = fixture();
    init(&mut f).await;
    f.stub.push_result(
        ExecutorResult::complete("…summary…").with_status(ExecStatus::Incomplete),
    );

    let report = f
        .runner
        .execute(
            vec![TaskSpec::new("Summarize tests/").with_type(TaskType::ReadInfo)],
            None,
        )
        .await
        .unwrap();
    let outcome = &report.outcomes[0];
    assert_eq!(outcome.status, TaskStatus::Completed);
    assert_eq!(outcome.response_summary.as_deref(), Some("…summary…"));

    // The deliverable is preserved in the index entry.
    let list = f.runner.task_list().unwrap();
    assert_eq!(list[0].response_summary.as_deref(), Some("…summary…"));
    assert!(list[0].files_modified.is_empty());
}

// --- blocked executors ---

#[tokio::test]
#[serial]
async fn blocked_executor_maps_to_error_with_metadata() {
    let mut f = fixture();
    init(&mut f).await;
    f.stub.push_result(ExecutorResult::blocked(
        pmo_executor::BlockedReason::Timeout,
        pmo_executor::TerminatedBy::Timeout,
        900_000,
    ));

    let report = f
        .runner
        .execute(vec![TaskSpec::new("Implement the cache layer")], None)
        .await
        .unwrap();
    let outcome = &report.outcomes[0];
    assert_eq!(outcome.status, TaskStatus::Blocked);
    assert!(outcome.error_message.as_deref().unwrap().contains("blocked"));
    assert_eq!(report.overall, OverallStatus::Error);

    let list = f.runner.task_list().unwrap();
    assert!(list[0].blocking);
}

// --- verified_files is authoritative ---

#[tokio::test]
#[serial]
async fn complete_claim_is_reverified_even_for_read_tasks() {
    let mut f = fixture();
    init(&mut f).await;
    // A COMPLETE assertion gets the strict re-check; only INCOMPLETE and
    // NO_EVIDENCE results let a read task complete on output alone.
    f.stub.push_result(ExecutorResult::complete("…summary…"));

    let report = f
        .runner
        .execute(
            vec![TaskSpec::new("Summarize tests/").with_type(TaskType::ReadInfo)],
            None,
        )
        .await
        .unwrap();
    assert_eq!(report.outcomes[0].status, TaskStatus::Error);
    assert!(report.outcomes[0]
        .error_message
        .as_deref()
        .unwrap()
        .contains("verified"));
}

#[tokio::test]
#[serial]
async fn complete_claim_without_verified_files_fails() {
    let mut f = fixture();
    init(&mut f).await;
    // files_modified alone never satisfies the judgment.
    f.stub.push_result(
        ExecutorResult::complete("did it")
            .with_files_modified(vec!["docs/guide.md".to_string()]),
    );

    let report = f
        .runner
        .execute(vec![TaskSpec::new("Create docs/guide.md")], None)
        .await
        .unwrap();
    assert_eq!(report.outcomes[0].status, TaskStatus::Error);
    assert!(report.outcomes[0]
        .error_message
        .as_deref()
        .unwrap()
        .contains("verified"));
}

// --- dependencies ---

#[tokio::test]
#[serial]
async fn dependency_failure_seals_dependent_without_invocation() {
    let mut f = fixture_with(|o| o.continue_on_task_failure = true);
    init(&mut f).await;
    f.stub.push_result(ExecutorResult::error("boom"));

    let report = f
        .runner
        .execute(
            vec![
                TaskSpec::new("Implement the parser").with_id("a"),
                TaskSpec::new("Write parser docs page.md")
                    .with_id("b")
                    .with_dependencies(vec!["a".to_string()]),
            ],
            None,
        )
        .await
        .unwrap();
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.outcomes[0].status, TaskStatus::Error);
    assert_eq!(report.outcomes[1].status, TaskStatus::Error);
    assert!(report.outcomes[1]
        .error_message
        .as_deref()
        .unwrap()
        .contains("dependency"));
    // Only the first task reached the executor.
    assert_eq!(f.stub.call_count(), 1);
}

#[tokio::test]
#[serial]
async fn dependency_chain_executes_in_order() {
    let mut f = fixture();
    init(&mut f).await;
    f.stub.push_result(complete_result("src/parser.rs"));
    f.stub.push_result(complete_result("docs/parser.md"));

    let report = f
        .runner
        .execute(
            vec![
                TaskSpec::new("Write docs/parser.md for the parser")
                    .with_id("b")
                    .with_dependencies(vec!["a".to_string()]),
                TaskSpec::new("Create src/parser.rs").with_id("a"),
            ],
            None,
        )
        .await
        .unwrap();
    assert_eq!(report.overall, OverallStatus::Complete);
    // The dependent ran second despite being listed first.
    assert!(f.stub.calls()[0].prompt.contains("src/parser.rs"));
}

#[tokio::test]
#[serial]
async fn dependency_cycle_is_an_error() {
    let mut f = fixture_with(|o| o.continue_on_task_failure = true);
    init(&mut f).await;

    let report = f
        .runner
        .execute(
            vec![
                TaskSpec::new("Create a.rs")
                    .with_id("a")
                    .with_dependencies(vec!["b".to_string()]),
                TaskSpec::new("Create b.rs")
                    .with_id("b")
                    .with_dependencies(vec!["a".to_string()]),
            ],
            None,
        )
        .await
        .unwrap();
    assert_eq!(f.stub.call_count(), 0);
    assert!(report
        .outcomes
        .iter()
        .all(|o| o.status == TaskStatus::Error));
}

// --- halting policy ---

#[tokio::test]
#[serial]
async fn error_halts_unless_continue_on_task_failure() {
    let mut f = fixture();
    init(&mut f).await;
    f.stub.push_result(ExecutorResult::error("boom"));
    f.stub.push_result(complete_result("b.rs"));

    let report = f
        .runner
        .execute_sequentially(
            vec![TaskSpec::new("Create a.rs"), TaskSpec::new("Create b.rs")],
            None,
        )
        .await
        .unwrap();
    // Halted after the first error; second task never dispatched.
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(f.stub.call_count(), 1);
}

#[tokio::test]
#[serial]
async fn continue_on_task_failure_keeps_going() {
    let mut f = fixture_with(|o| o.continue_on_task_failure = true);
    init(&mut f).await;
    f.stub.push_result(ExecutorResult::error("boom"));
    f.stub.push_result(complete_result("b.rs"));

    let report = f
        .runner
        .execute_sequentially(
            vec![TaskSpec::new("Create a.rs"), TaskSpec::new("Create b.rs")],
            None,
        )
        .await
        .unwrap();
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.outcomes[1].status, TaskStatus::Completed);
    assert_eq!(report.overall, OverallStatus::Error);
}

// --- parallel execution ---

#[tokio::test]
#[serial]
async fn parallel_tasks_all_complete() {
    let mut f = fixture();
    init(&mut f).await;
    f.stub.push_result(complete_result("a.rs"));
    f.stub.push_result(complete_result("b.rs"));

    let report = f
        .runner
        .execute_parallel(
            vec![
                TaskSpec::new("Create a.rs").with_lock_paths(vec!["a.rs".into()]),
                TaskSpec::new("Create b.rs").with_lock_paths(vec!["b.rs".into()]),
            ],
            None,
        )
        .await
        .unwrap();
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.overall, OverallStatus::Complete);
    assert_eq!(f.stub.call_count(), 2);
}

#[tokio::test]
#[serial]
async fn parallel_overlapping_locks_serialize_in_batches() {
    let mut f = fixture();
    init(&mut f).await;
    f.stub.push_result(complete_result("src/a.rs"));
    f.stub.push_result(complete_result("src/a.rs"));

    let report = f
        .runner
        .execute_parallel(
            vec![
                TaskSpec::new("Create src/a.rs").with_lock_paths(vec!["src".into()]),
                TaskSpec::new("Update src/a.rs header").with_lock_paths(vec!["src/a.rs".into()]),
            ],
            None,
        )
        .await
        .unwrap();
    assert_eq!(report.outcomes.len(), 2);
    assert!(report
        .outcomes
        .iter()
        .all(|o| o.status == TaskStatus::Completed));
}

// --- invariants over the log tree ---

#[tokio::test]
#[serial]
async fn index_entries_match_task_files() {
    let mut f = fixture_with(|o| o.continue_on_task_failure = true);
    init(&mut f).await;
    f.stub.push_result(complete_result("a.rs"));
    f.stub.push_result(ExecutorResult::error("boom"));

    f.runner
        .execute_sequentially(
            vec![TaskSpec::new("Create a.rs"), TaskSpec::new("Create b.rs")],
            None,
        )
        .await
        .unwrap();

    let list = f.runner.task_list().unwrap();
    assert_eq!(list.len(), 2);
    for entry in &list {
        let detail = f
            .runner
            .task_detail(&entry.task_id, Visibility::Full)
            .unwrap();
        assert_eq!(detail.terminal_event_count(), 1);
    }
}

// --- auto-resolve through mediation ---

#[tokio::test]
#[serial]
async fn clarification_auto_resolves_via_handler() {
    let mut f = fixture_with(|o| {
        o.user_response_handler = Some(Arc::new(|_question| Some("overwrite it".to_string())));
    });
    std::fs::create_dir_all(f.dir.path().join("docs")).unwrap();
    std::fs::write(f.dir.path().join("docs/guide.md"), "existing").unwrap();
    init(&mut f).await;
    f.stub.push_result(complete_result("docs/guide.md"));

    let report = f
        .runner
        .execute(vec![TaskSpec::new("Create docs/guide.md")], None)
        .await
        .unwrap();

    // The follow-up completed; the original sealed INCOMPLETE.
    assert_eq!(report.outcomes[0].status, TaskStatus::Completed);
    let list = f.runner.task_list().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].status, TaskStatus::Incomplete);
    assert_eq!(list[1].status, TaskStatus::Completed);
    // Parent and child share the thread.
    assert_eq!(list[1].parent_task_id.as_ref(), Some(&list[0].task_id));
    assert_eq!(list[0].thread_id, list[1].thread_id);
    // The executor saw the normalized prompt, not the original.
    assert!(f.stub.calls()[0].prompt.contains("Overwrite docs/guide.md"));
}

#[tokio::test]
#[serial]
async fn cancel_response_stops_at_the_original() {
    let mut f = fixture_with(|o| {
        o.user_response_handler = Some(Arc::new(|_q| Some("cancel".to_string())));
    });
    std::fs::write(f.dir.path().join("README.md"), "x").unwrap();
    init(&mut f).await;

    let report = f
        .runner
        .execute(vec![TaskSpec::new("Create README.md")], None)
        .await
        .unwrap();
    assert_eq!(report.outcomes[0].status, TaskStatus::Incomplete);
    assert_eq!(f.stub.call_count(), 0);
    assert_eq!(f.runner.task_list().unwrap().len(), 1);
}

// --- awaiting response path ---

#[tokio::test]
#[serial]
async fn empty_incomplete_parks_then_response_converts() {
    let mut f = fixture();
    init(&mut f).await;
    f.stub
        .push_result(ExecutorResult::complete("").with_status(ExecStatus::Incomplete));
    f.stub.push_result(complete_result("src/cache.rs"));

    let report = f
        .runner
        .execute(vec![TaskSpec::new("Implement the cache layer")], None)
        .await
        .unwrap();
    let parked = &report.outcomes[0];
    assert_eq!(parked.status, TaskStatus::AwaitingResponse);
    assert!(parked.clarification.is_some());
    assert_eq!(report.overall, OverallStatus::Incomplete);

    let followed = f
        .runner
        .submit_response(&parked.task_id, "use an LRU in src/cache.rs")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(followed.status, TaskStatus::Completed);

    let list = f.runner.task_list().unwrap();
    assert_eq!(list[0].status, TaskStatus::Incomplete);
    assert_eq!(list[1].parent_task_id.as_ref(), Some(&list[0].task_id));
}

#[tokio::test]
#[serial]
async fn submit_response_requires_awaiting_task() {
    let mut f = fixture();
    init(&mut f).await;
    let err = f
        .runner
        .submit_response(&TaskId::new("task-999"), "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::NotAwaiting(_)));
}

// --- sentinel at session close ---

#[tokio::test]
#[serial]
async fn missing_credential_downgrades_complete_to_no_evidence() {
    std::env::remove_var(KEY);
    let mut f = fixture();
    init(&mut f).await;
    f.stub.push_result(complete_result("a.rs"));
    f.runner
        .execute(vec![TaskSpec::new("Create a.rs")], None)
        .await
        .unwrap();

    let overall = f.runner.complete_session(false).await.unwrap();
    assert_eq!(overall, OverallStatus::NoEvidence);
}

#[tokio::test]
#[serial]
async fn tampered_evidence_downgrades_complete_to_error() {
    std::env::set_var(KEY, "sk-ant-test");
    let mut f = fixture();
    init(&mut f).await;
    f.stub.push_result(complete_result("a.rs"));
    f.runner
        .execute(vec![TaskSpec::new("Create a.rs")], None)
        .await
        .unwrap();

    // Tamper with the single evidence file in place.
    let evidence_dir = f.dir.path().join(".claude").join("evidence");
    let entry = std::fs::read_dir(&evidence_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .find(|e| e.path().extension().map(|x| x == "json").unwrap_or(false))
        .unwrap();
    let mut value: serde_json::Value =
        serde_json::from_slice(&std::fs::read(entry.path()).unwrap()).unwrap();
    value["response_text"] = json!("tampered");
    std::fs::write(entry.path(), serde_json::to_vec_pretty(&value).unwrap()).unwrap();

    let overall = f.runner.complete_session(false).await.unwrap();
    assert_eq!(overall, OverallStatus::Error);
    std::env::remove_var(KEY);
}

// --- explicit assertions, cancel, state ---

#[tokio::test]
#[serial]
async fn asserted_overall_wins() {
    let mut f = fixture();
    init(&mut f).await;
    f.runner.assert_overall(OverallStatus::Invalid).unwrap();
    let overall = f.runner.complete_session(false).await.unwrap();
    assert_eq!(overall, OverallStatus::Invalid);
}

#[tokio::test]
#[serial]
async fn cancelled_session_refuses_dispatch() {
    let mut f = fixture();
    init(&mut f).await;
    f.runner.cancel().unwrap();
    let err = f
        .runner
        .execute(vec![TaskSpec::new("Create a.rs")], None)
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::SessionCancelled));
}

#[tokio::test]
#[serial]
async fn save_state_then_resume_restores_session() {
    let mut f = fixture();
    let session_id = init(&mut f).await;
    f.runner
        .save_state(vec![TaskSpec::new("finish the docs")])
        .unwrap();
    f.runner.shutdown().await.unwrap();

    let pending = f.runner.resume(f.dir.path(), &session_id).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].instruction, "finish the docs");
    assert_eq!(f.runner.session_id(), Some(&session_id));
    // A resumed session continues in a fresh run.
    let record = f.runner.session_record().unwrap();
    assert_eq!(record.runs.len(), 2);
}

#[tokio::test]
#[serial]
async fn acquire_executor_respects_capacity() {
    let mut f = fixture_with(|o| o.pool.l2_capacity = 1);
    init(&mut f).await;
    f.runner.acquire_executor("exec-1").unwrap();
    let err = f.runner.acquire_executor("exec-2").unwrap_err();
    assert!(matches!(err, RunnerError::Pool(PoolError::Saturated { .. })));
    assert!(f.runner.release_executor("exec-1").unwrap());
    f.runner.acquire_executor("exec-2").unwrap();
}

// --- phases ---

#[tokio::test]
#[serial]
async fn advance_phase_walks_the_lifecycle() {
    let mut f = fixture();
    init(&mut f).await;
    let next = f.runner.advance_phase(json!({}), "ok").unwrap();
    assert_eq!(next, Some(Phase::TaskDecomposition));
    let record = f.runner.session_record().unwrap();
    assert_eq!(record.current_phase, Some(Phase::TaskDecomposition));
}

#[tokio::test]
#[serial]
async fn initialize_rejects_missing_project() {
    let mut f = fixture();
    let missing = f.dir.path().join("nope");
    let err = f.runner.initialize(&missing).await.unwrap_err();
    assert!(matches!(err, RunnerError::ProjectPathInvalid(_)));
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
#[serial]
async fn resource_limit_violation_parks_task_incomplete() {
    let mut f = fixture();
    std::fs::write(
        f.dir.path().join("pm-orchestrator.yaml"),
        "limits:\n  max_files: 1\n",
    )
    .unwrap();
    init(&mut f).await;

    let report = f
        .runner
        .execute(
            vec![TaskSpec::new("Create a.rs and b.rs")
                .with_lock_paths(vec!["a.rs".into(), "b.rs".into()])],
            None,
        )
        .await
        .unwrap();
    assert_eq!(report.outcomes[0].status, TaskStatus::Incomplete);
    assert!(report.outcomes[0]
        .error_message
        .as_deref()
        .unwrap()
        .contains("max_files"));
    assert_eq!(f.stub.call_count(), 0);

    let record = f.runner.session_record().unwrap();
    assert_eq!(record.limit_violations.len(), 1);
}
