// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command implementations.
//!
//! Each invocation is its own process: `start` creates the session and
//! saves runner state; `task` resumes that state, runs one task as a
//! fresh run, and saves again; `shutdown` finalizes. `logs` and `gate`
//! only read.

use crate::exit::ExitStatus;
use crate::table::{Column, Table};
use anyhow::{anyhow, Context};
use chrono::Utc;
use pmo_core::{OverallStatus, SessionId, TaskId, TaskSpec, TaskType, Visibility};
use pmo_engine::{CompletionJudge, GateResult, Runner, RunnerOptions, Verdict};
use pmo_storage::{AtomicWriter, Dal, PlanRecord, StateStore, TaskLogManager};
use std::path::Path;

fn runner_options() -> RunnerOptions {
    RunnerOptions {
        use_claude_code: true,
        ..RunnerOptions::default()
    }
}

fn saved_session(project: &Path) -> anyhow::Result<SessionId> {
    let store = StateStore::new(project, AtomicWriter::new());
    let state = store
        .load_any()
        .context("no active session; run `pmo start <project>` first")?;
    Ok(state.session.session_id)
}

/// `pmo start <project>`
pub async fn start(project: &Path) -> anyhow::Result<ExitStatus> {
    let mut runner = Runner::new(runner_options());
    let session_id = runner.initialize(project).await?;
    runner.save_state(Vec::new())?;
    println!("{session_id}");
    Ok(ExitStatus::Success)
}

/// `pmo task <prompt>` — one task, one run.
pub async fn task(
    project: &Path,
    prompt: &str,
    model: Option<String>,
    read_info: bool,
) -> anyhow::Result<ExitStatus> {
    let session_id = saved_session(project)?;
    let mut runner = Runner::new(runner_options());
    runner.resume(project, &session_id).await?;

    let task_type = if read_info {
        TaskType::ReadInfo
    } else {
        TaskType::Implementation
    };
    let spec = TaskSpec::new(prompt).with_type(task_type);
    let report = runner.execute(vec![spec], model).await?;
    runner.save_state(Vec::new())?;

    for outcome in &report.outcomes {
        println!("{}  {}", outcome.task_id, outcome.status);
        if let Some(summary) = &outcome.response_summary {
            println!("{summary}");
        }
        if let Some(clarification) = &outcome.clarification {
            println!(
                "clarification needed: {}",
                serde_json::to_string(clarification)?
            );
        }
        if let Some(message) = &outcome.error_message {
            eprintln!("error: {message}");
        }
    }
    runner.shutdown().await?;
    Ok(ExitStatus::from(report.overall))
}

/// `pmo resume <session>`
pub async fn resume(project: &Path, session: &str) -> anyhow::Result<ExitStatus> {
    let session_id = SessionId::new(session);
    let mut runner = Runner::new(runner_options());
    let pending = runner.resume(project, &session_id).await?;
    runner.save_state(pending.clone())?;
    println!("resumed {session_id} ({} pending tasks)", pending.len());
    runner.shutdown().await?;
    Ok(ExitStatus::Success)
}

/// `pmo logs [task] [--full]`
pub fn logs(project: &Path, task: Option<&str>, full: bool) -> anyhow::Result<ExitStatus> {
    let session_id = saved_session(project)?;
    let manager = TaskLogManager::new(project, AtomicWriter::new());
    match task {
        None => {
            let list = manager.get_task_list(&session_id)?;
            let mut table = Table::new(vec![
                Column::left("TASK"),
                Column::left("THREAD"),
                Column::left("RUN"),
                Column::left("STATUS"),
                Column::right("FILES"),
                Column::capped("SUMMARY", 48),
            ]);
            for entry in &list {
                table.push(vec![
                    entry.task_id.to_string(),
                    entry.thread_id.to_string(),
                    entry.run_id.to_string(),
                    entry.status.to_string(),
                    entry.files_modified.len().to_string(),
                    entry.response_summary.clone().unwrap_or_default(),
                ]);
            }
            print!("{}", table.render());
        }
        Some(task) => {
            let visibility = if full {
                Visibility::Full
            } else {
                Visibility::Summary
            };
            let detail =
                manager.get_task_detail(&session_id, &TaskId::new(task), visibility)?;
            println!("{}", serde_json::to_string_pretty(&detail)?);
        }
    }
    Ok(ExitStatus::Success)
}

/// `pmo gate <results.json> [--run-id <id>]`
pub fn gate(results: &Path, run_id: Option<&str>) -> anyhow::Result<ExitStatus> {
    let text = std::fs::read_to_string(results)
        .with_context(|| format!("cannot read {}", results.display()))?;
    let results: Vec<GateResult> = serde_json::from_str(&text).context("bad gate results")?;

    let judge = match run_id {
        Some(raw) => CompletionJudge::expecting(
            pmo_core::GateRunId::parse(raw).map_err(|e| anyhow!("{e}"))?,
        ),
        None => CompletionJudge::new(),
    };
    match judge.judge(&results) {
        Ok(Verdict::Complete) => {
            println!("COMPLETE");
            Ok(ExitStatus::Success)
        }
        Ok(Verdict::Failing { gates }) => {
            println!("FAILING: {}", gates.join(", "));
            Ok(ExitStatus::from(OverallStatus::Error))
        }
        Ok(Verdict::NoEvidence) => {
            println!("NO_EVIDENCE");
            Ok(ExitStatus::from(OverallStatus::NoEvidence))
        }
        Err(stale) => {
            eprintln!("stale run: {stale}");
            Ok(ExitStatus::Invalid)
        }
    }
}

/// `pmo plan <file>` — one task per non-empty line.
pub fn plan(project: &Path, file: &Path) -> anyhow::Result<ExitStatus> {
    let session_id = saved_session(project)?;
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    let tasks: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if tasks.is_empty() {
        return Err(anyhow!("plan file has no tasks"));
    }

    let dal = Dal::new(project, AtomicWriter::new());
    let record = PlanRecord {
        id: format!("plan-{}", Utc::now().format("%Y%m%d-%H%M%S")),
        session_id: session_id.as_str().to_string(),
        title: file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "plan".to_string()),
        tasks,
        created_at: Utc::now(),
    };
    dal.upsert_plan(&record)?;
    println!("{} ({} tasks)", record.id, record.tasks.len());
    Ok(ExitStatus::Success)
}

/// `pmo shutdown` — finalize the session and flush.
pub async fn shutdown(project: &Path) -> anyhow::Result<ExitStatus> {
    let session_id = saved_session(project)?;
    let mut runner = Runner::new(runner_options());
    runner.resume(project, &session_id).await?;
    let overall = runner.complete_session(false).await?;
    runner.shutdown().await?;

    let store = StateStore::new(project, AtomicWriter::new());
    store.clear()?;
    println!("{overall}");
    Ok(ExitStatus::from(overall))
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
