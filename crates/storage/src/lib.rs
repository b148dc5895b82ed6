// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pmo-storage: durable persistence for the pm-orchestrator runner.
//!
//! Everything that touches disk flows through here: the atomic writer,
//! the append-only event store, the per-session task log tree, the
//! dashboard DAL, and the orchestrator resume state. Content is masked
//! before it reaches disk.

pub mod atomic;
pub mod dal;
pub mod event_store;
pub mod state;
pub mod task_log;

pub use atomic::{AtomicWriter, WriteOptions, WriteReceipt};
pub use dal::{Dal, DalError, PlanRecord, ProjectRecord, RunRow, SessionRow};
pub use event_store::{EventFilter, EventStore, EventStoreConfig, EventStoreError, QueryOrder};
pub use state::{RunnerState, StateError, StateStore};
pub use task_log::{SessionIndexEntry, TaskCompletion, TaskLogError, TaskLogManager};
