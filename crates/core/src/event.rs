// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Uniform event record for the append-only event store.

use crate::id::EventId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Origin of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    FileChange,
    Executor,
    Task,
    Session,
    Command,
}

impl std::fmt::Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventSource::FileChange => write!(f, "file_change"),
            EventSource::Executor => write!(f, "executor"),
            EventSource::Task => write!(f, "task"),
            EventSource::Session => write!(f, "session"),
            EventSource::Command => write!(f, "command"),
        }
    }
}

/// Identifiers an event relates to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRelations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_event_id: Option<String>,
}

impl EventRelations {
    pub fn is_empty(&self) -> bool {
        self.task_id.is_none()
            && self.session_id.is_none()
            && self.executor_id.is_none()
            && self.parent_event_id.is_none()
    }
}

/// An append-only event record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: DateTime<Utc>,
    pub source: EventSource,
    pub summary: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "EventRelations::is_empty")]
    pub relations: EventRelations,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl Event {
    pub fn new(
        id: EventId,
        timestamp: DateTime<Utc>,
        source: EventSource,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            id,
            timestamp,
            source,
            summary: summary.into(),
            data: serde_json::Value::Null,
            relations: EventRelations::default(),
            tags: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.relations.task_id = Some(task_id.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.relations.session_id = Some(session_id.into());
        self
    }

    pub fn with_executor(mut self, executor_id: impl Into<String>) -> Self {
        self.relations.executor_id = Some(executor_id.into());
        self
    }

    pub fn with_parent(mut self, parent_event_id: impl Into<String>) -> Self {
        self.relations.parent_event_id = Some(parent_event_id.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
