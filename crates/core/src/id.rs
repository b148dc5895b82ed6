// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier newtypes and per-session counters.
//!
//! Every identifier is a string with a fixed prefix and a sortable suffix:
//! `sess-…`, `thr-NNN`, `run-NNN`, `task-NNN`, `evt-NNN`, `lock-…`,
//! `llm-<base36-time>-<hex>`. Thread, run, task and event numbers are
//! per-session monotonic and zero-padded so lexicographic order matches
//! allocation order.

use crate::clock::Clock;
use serde::{Deserialize, Serialize};

/// Trait for truncating identifiers to a short prefix.
pub trait ShortId {
    /// Returns a string slice truncated to at most `n` characters.
    fn short(&self, n: usize) -> &str;
}

impl ShortId for str {
    fn short(&self, n: usize) -> &str {
        if self.len() <= n {
            self
        } else {
            &self[..n]
        }
    }
}

/// Define a newtype ID wrapper around `String`.
///
/// Generates `new()`, `as_str()`, `short()`, `Display`, `From<String>`, `From<&str>`,
/// `PartialEq<str>`, `PartialEq<&str>`, and `Borrow<str>` implementations.
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns a string slice truncated to at most `n` characters.
            pub fn short(&self, n: usize) -> &str {
                if self.0.len() <= n {
                    &self.0
                } else {
                    &self.0[..n]
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id! {
    /// Top-level session identifier (`sess-<epoch-ms>-<hex>`).
    ///
    /// The zero-padded millisecond timestamp makes freshly generated IDs
    /// sort in creation order.
    pub struct SessionId;
}

define_id! {
    /// Conversational thread identifier (`thr-NNN`), per-session monotonic.
    pub struct ThreadId;
}

define_id! {
    /// Run identifier (`run-NNN`), per-session monotonic.
    pub struct RunId;
}

define_id! {
    /// Task identifier (`task-NNN`), per-session monotonic.
    pub struct TaskId;
}

define_id! {
    /// Event identifier (`evt-NNN`), per-session monotonic.
    pub struct EventId;
}

define_id! {
    /// Path lock identifier (`lock-<uuid>`).
    pub struct LockId;
}

define_id! {
    /// LLM call identifier (`llm-<base36-time>-<hex>`), used as the
    /// evidence file name for the call.
    pub struct LlmCallId;
}

/// Encode a u64 in lowercase base36.
fn base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Short hex entropy from a fresh UUID.
fn hex_suffix(n: usize) -> String {
    let raw = uuid::Uuid::new_v4().simple().to_string();
    raw[..n.min(raw.len())].to_string()
}

impl SessionId {
    /// Generate a fresh session ID with a sortable timestamp suffix.
    pub fn generate(clock: &impl Clock) -> Self {
        Self::new(format!("sess-{:013}-{}", clock.epoch_ms(), hex_suffix(4)))
    }
}

impl LockId {
    /// Generate a fresh lock ID.
    pub fn generate() -> Self {
        Self::new(format!("lock-{}", uuid::Uuid::new_v4()))
    }
}

impl LlmCallId {
    /// Generate a fresh LLM call ID (`llm-<base36 epoch-ms>-<8 hex>`).
    pub fn generate(clock: &impl Clock) -> Self {
        Self::new(format!(
            "llm-{}-{}",
            base36(clock.epoch_ms()),
            hex_suffix(8)
        ))
    }
}

/// Per-session monotonic counters for thread, run, task and event IDs.
///
/// Counters persist with the session record so allocation survives
/// save/resume. Numbers are zero-padded three wide for lexicographic order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdCounters {
    #[serde(default)]
    pub threads: u32,
    #[serde(default)]
    pub runs: u32,
    #[serde(default)]
    pub tasks: u32,
    #[serde(default)]
    pub events: u32,
}

impl IdCounters {
    pub fn next_thread(&mut self) -> ThreadId {
        self.threads += 1;
        ThreadId::new(format!("thr-{:03}", self.threads))
    }

    pub fn next_run(&mut self) -> RunId {
        self.runs += 1;
        RunId::new(format!("run-{:03}", self.runs))
    }

    pub fn next_task(&mut self) -> TaskId {
        self.tasks += 1;
        TaskId::new(format!("task-{:03}", self.tasks))
    }

    pub fn next_event(&mut self) -> EventId {
        self.events += 1;
        EventId::new(format!("evt-{:03}", self.events))
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
