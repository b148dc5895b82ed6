// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;

fn ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap()
}

#[test]
fn task_type_deliverables() {
    assert!(TaskType::ReadInfo.output_is_deliverable());
    assert!(TaskType::Report.output_is_deliverable());
    assert!(!TaskType::Implementation.output_is_deliverable());
}

#[test]
fn task_type_wire_names() {
    assert_eq!(
        serde_json::to_string(&TaskType::ReadInfo).unwrap(),
        "\"READ_INFO\""
    );
    assert_eq!(TaskType::Implementation.to_string(), "IMPLEMENTATION");
}

#[test]
fn task_spec_builder() {
    let spec = TaskSpec::new("Create docs/guide.md")
        .with_id("ext-1")
        .with_type(TaskType::Report)
        .with_dependencies(vec!["ext-0".into()])
        .with_lock_paths(vec![PathBuf::from("docs")]);
    assert_eq!(spec.instruction, "Create docs/guide.md");
    assert_eq!(spec.id.as_deref(), Some("ext-1"));
    assert_eq!(spec.task_type, TaskType::Report);
    assert_eq!(spec.dependencies, vec!["ext-0".to_string()]);
}

#[test]
fn task_spec_defaults_to_implementation() {
    let spec: TaskSpec = serde_json::from_str(r#"{"instruction":"do it"}"#).unwrap();
    assert_eq!(spec.task_type, TaskType::Implementation);
    assert!(spec.dependencies.is_empty());
}

#[test]
fn task_entry_starts_created() {
    let entry = TaskEntry::new(
        TaskId::new("task-001"),
        ThreadId::new("thr-001"),
        RunId::new("run-001"),
        ts(),
    );
    assert_eq!(entry.status, TaskStatus::Created);
    assert!(!entry.blocking);
    assert!(entry.completed_at.is_none());
}

#[test]
fn task_entry_omits_empty_fields() {
    let entry = TaskEntry::new(
        TaskId::new("task-001"),
        ThreadId::new("thr-001"),
        RunId::new("run-001"),
        ts(),
    );
    let json = serde_json::to_value(&entry).unwrap();
    assert!(json.get("parent_task_id").is_none());
    assert!(json.get("blocking").is_none());
    assert!(json.get("files_modified").is_none());
}

#[test]
fn terminal_event_mapping() {
    assert_eq!(
        TaskEventType::for_terminal_status(TaskStatus::Completed),
        Some(TaskEventType::TaskCompleted)
    );
    assert_eq!(
        TaskEventType::for_terminal_status(TaskStatus::Incomplete),
        Some(TaskEventType::TaskIncomplete)
    );
    assert_eq!(
        TaskEventType::for_terminal_status(TaskStatus::Error),
        Some(TaskEventType::TaskError)
    );
    // BLOCKED maps to the error terminal in the log
    assert_eq!(
        TaskEventType::for_terminal_status(TaskStatus::Blocked),
        Some(TaskEventType::TaskError)
    );
    assert_eq!(TaskEventType::for_terminal_status(TaskStatus::Created), None);
}

#[test]
fn task_log_counts_terminal_events() {
    let mut log = TaskLog::new(TaskId::new("task-001"), "sess-x");
    log.events.push(TaskLogEvent {
        id: EventId::new("evt-001"),
        event_type: TaskEventType::TaskStarted,
        timestamp: ts(),
        content: "started".into(),
        metadata: HashMap::new(),
        executor: ExecutorMeta::default(),
    });
    assert_eq!(log.terminal_event_count(), 0);
    log.events.push(TaskLogEvent {
        id: EventId::new("evt-002"),
        event_type: TaskEventType::TaskCompleted,
        timestamp: ts(),
        content: "done".into(),
        metadata: HashMap::new(),
        executor: ExecutorMeta::default(),
    });
    assert_eq!(log.terminal_event_count(), 1);
}

#[test]
fn executor_meta_hidden_when_empty() {
    let event = TaskLogEvent {
        id: EventId::new("evt-001"),
        event_type: TaskEventType::TaskProgress,
        timestamp: ts(),
        content: "working".into(),
        metadata: HashMap::new(),
        executor: ExecutorMeta::default(),
    };
    let json = serde_json::to_value(&event).unwrap();
    assert!(json.get("executor").is_none());
    assert!(json.get("metadata").is_none());
}
