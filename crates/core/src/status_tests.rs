// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

// --- task state machine ---

#[parameterized(
    created_starts = { TaskStatus::Created, TaskStatus::InProgress, true },
    created_cannot_complete = { TaskStatus::Created, TaskStatus::Completed, false },
    in_progress_completes = { TaskStatus::InProgress, TaskStatus::Completed, true },
    in_progress_incomplete = { TaskStatus::InProgress, TaskStatus::Incomplete, true },
    in_progress_errors = { TaskStatus::InProgress, TaskStatus::Error, true },
    in_progress_blocks = { TaskStatus::InProgress, TaskStatus::Blocked, true },
    in_progress_awaits = { TaskStatus::InProgress, TaskStatus::AwaitingResponse, true },
    awaiting_seals_incomplete = { TaskStatus::AwaitingResponse, TaskStatus::Incomplete, true },
    awaiting_cannot_complete = { TaskStatus::AwaitingResponse, TaskStatus::Completed, false },
    completed_is_final = { TaskStatus::Completed, TaskStatus::Error, false },
    blocked_is_final = { TaskStatus::Blocked, TaskStatus::InProgress, false },
)]
fn transition(from: TaskStatus, to: TaskStatus, allowed: bool) {
    assert_eq!(from.can_transition(to), allowed);
}

#[test]
fn terminal_statuses() {
    assert!(TaskStatus::Completed.is_terminal());
    assert!(TaskStatus::Incomplete.is_terminal());
    assert!(TaskStatus::Error.is_terminal());
    assert!(TaskStatus::Blocked.is_terminal());
    assert!(!TaskStatus::Created.is_terminal());
    assert!(!TaskStatus::InProgress.is_terminal());
    assert!(!TaskStatus::AwaitingResponse.is_terminal());
}

// --- aggregation ---

#[test]
fn aggregate_error_wins() {
    let statuses = [TaskStatus::Completed, TaskStatus::Error, TaskStatus::Completed];
    assert_eq!(OverallStatus::aggregate(&statuses), OverallStatus::Error);
}

#[test]
fn aggregate_blocked_maps_to_error() {
    let statuses = [TaskStatus::Completed, TaskStatus::Blocked];
    assert_eq!(OverallStatus::aggregate(&statuses), OverallStatus::Error);
}

#[test]
fn aggregate_incomplete_over_complete() {
    let statuses = [TaskStatus::Completed, TaskStatus::Incomplete];
    assert_eq!(OverallStatus::aggregate(&statuses), OverallStatus::Incomplete);
}

#[test]
fn aggregate_missing_terminal_is_incomplete() {
    let statuses = [TaskStatus::Completed, TaskStatus::InProgress];
    assert_eq!(OverallStatus::aggregate(&statuses), OverallStatus::Incomplete);
}

#[test]
fn aggregate_all_complete() {
    let statuses = [TaskStatus::Completed, TaskStatus::Completed];
    assert_eq!(OverallStatus::aggregate(&statuses), OverallStatus::Complete);
}

#[test]
fn aggregate_empty_has_no_evidence() {
    assert_eq!(OverallStatus::aggregate(&[]), OverallStatus::NoEvidence);
}

// --- serde wire names ---

#[test]
fn statuses_serialize_screaming() {
    assert_eq!(
        serde_json::to_string(&TaskStatus::InProgress).unwrap(),
        "\"IN_PROGRESS\""
    );
    assert_eq!(
        serde_json::to_string(&OverallStatus::NoEvidence).unwrap(),
        "\"NO_EVIDENCE\""
    );
    assert_eq!(
        serde_json::to_string(&SessionStatus::Initialized).unwrap(),
        "\"INITIALIZED\""
    );
    assert_eq!(
        serde_json::to_string(&RunStatus::Cancelled).unwrap(),
        "\"CANCELLED\""
    );
}

// --- phases ---

#[test]
fn phases_advance_in_order() {
    assert_eq!(
        Phase::RequirementAnalysis.next(),
        Some(Phase::TaskDecomposition)
    );
    assert_eq!(Phase::Qa.next(), Some(Phase::CompletionValidation));
    assert_eq!(Phase::Report.next(), None);
}

#[test]
fn phase_display_names() {
    assert_eq!(Phase::RequirementAnalysis.to_string(), "REQUIREMENT_ANALYSIS");
    assert_eq!(Phase::Qa.to_string(), "QA");
    assert_eq!(
        serde_json::to_string(&Phase::CompletionValidation).unwrap(),
        "\"COMPLETION_VALIDATION\""
    );
}

#[test]
fn run_status_terminality() {
    assert!(!RunStatus::Running.is_terminal());
    assert!(RunStatus::Completed.is_terminal());
    assert!(RunStatus::Cancelled.is_terminal());
}
