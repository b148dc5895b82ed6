// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;
use serde_json::json;

fn ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap()
}

#[test]
fn builder_sets_relations() {
    let event = Event::new(EventId::new("evt-001"), ts(), EventSource::Task, "started")
        .with_task("task-001")
        .with_session("sess-x")
        .with_parent("evt-000");
    assert_eq!(event.relations.task_id.as_deref(), Some("task-001"));
    assert_eq!(event.relations.session_id.as_deref(), Some("sess-x"));
    assert_eq!(event.relations.parent_event_id.as_deref(), Some("evt-000"));
    assert!(event.relations.executor_id.is_none());
}

#[test]
fn empty_relations_are_omitted_from_json() {
    let event = Event::new(EventId::new("evt-001"), ts(), EventSource::Command, "run");
    let json = serde_json::to_value(&event).unwrap();
    assert!(json.get("relations").is_none());
    assert!(json.get("tags").is_none());
}

#[test]
fn source_serializes_snake_case() {
    assert_eq!(
        serde_json::to_string(&EventSource::FileChange).unwrap(),
        "\"file_change\""
    );
    assert_eq!(EventSource::FileChange.to_string(), "file_change");
}

#[test]
fn event_roundtrip() {
    let event = Event::new(EventId::new("evt-007"), ts(), EventSource::Executor, "invoked")
        .with_data(json!({"duration_ms": 120}))
        .with_executor("claude-code")
        .with_tags(vec!["qa".into()]);
    let text = serde_json::to_string(&event).unwrap();
    let back: Event = serde_json::from_str(&text).unwrap();
    assert_eq!(back, event);
}

#[test]
fn missing_data_defaults_to_null() {
    let text = r#"{"id":"evt-001","timestamp":"2026-03-14T09:26:53Z","source":"task","summary":"s"}"#;
    let event: Event = serde_json::from_str(text).unwrap();
    assert!(event.data.is_null());
    assert!(event.relations.is_empty());
}
