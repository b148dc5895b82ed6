// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test builders shared across crates (feature = "test-support").

use crate::event::{Event, EventSource};
use crate::id::{EventId, RunId, SessionId, TaskId, ThreadId};
use crate::session::SessionRecord;
use crate::task::{TaskEntry, TaskSpec};
use chrono::{DateTime, TimeZone, Utc};
use std::path::PathBuf;

/// A fixed timestamp for deterministic tests.
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53)
        .single()
        .unwrap_or_default()
}

/// A session record rooted at the given project path.
pub fn session_fixture(target_project: impl Into<PathBuf>) -> SessionRecord {
    SessionRecord::new(
        SessionId::new("sess-0000001000000-f1x7"),
        target_project.into(),
        fixed_time(),
    )
}

/// A minimal task spec with the given instruction.
pub fn task_spec(instruction: &str) -> TaskSpec {
    TaskSpec::new(instruction)
}

/// A task index entry in its freshly created state.
pub fn task_entry(n: u32) -> TaskEntry {
    TaskEntry::new(
        TaskId::new(format!("task-{n:03}")),
        ThreadId::new("thr-001"),
        RunId::new("run-001"),
        fixed_time(),
    )
}

/// A task-scoped event record.
pub fn task_event(n: u32, summary: &str) -> Event {
    Event::new(
        EventId::new(format!("evt-{n:03}")),
        fixed_time(),
        EventSource::Task,
        summary,
    )
    .with_task(format!("task-{n:03}"))
}
