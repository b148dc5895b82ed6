// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pmo - pm-orchestrator CLI
//!
//! Thin front-end over the runner: sessions persist between invocations
//! through the saved runner state, so `start`, `task`, `logs` and
//! `shutdown` compose across processes.

mod commands;
mod exit;
mod logging;
mod table;

use clap::{Parser, Subcommand};
use exit::ExitStatus;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "pmo",
    version,
    about = "pm-orchestrator - evidence-gated task runner"
)]
struct Cli {
    /// Change to <dir> before doing anything
    #[arg(short = 'C', global = true, value_name = "DIR")]
    directory: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a session on a project
    Start {
        /// Project root directory
        project: PathBuf,
    },
    /// Run one task in the active session
    Task {
        /// Natural-language instruction
        prompt: String,
        /// Model override passed through to the executor
        #[arg(long)]
        model: Option<String>,
        /// Treat the task as read-only information gathering
        #[arg(long)]
        read_info: bool,
    },
    /// Resume a saved session
    Resume {
        /// Session ID (sess-…)
        session: String,
    },
    /// Show the task index, or one task's log
    Logs {
        /// Task ID (task-…); omit for the index
        task: Option<String>,
        /// Expose executor provider/model/token counts and latency
        #[arg(long)]
        full: bool,
    },
    /// Judge QA-gate results for the current run
    Gate {
        /// JSON file holding the gate results
        results: PathBuf,
        /// Expected current run ID
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Store a plan (one task per line) for the active session
    Plan {
        /// Plan file
        file: PathBuf,
    },
    /// Finalize the session and flush pending writes
    Shutdown,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init();

    if let Some(dir) = &cli.directory {
        if let Err(e) = std::env::set_current_dir(dir) {
            eprintln!("pmo: cannot enter {}: {e}", dir.display());
            return ExitStatus::Infrastructure.into();
        }
    }

    let status = match run(cli.command).await {
        Ok(status) => status,
        Err(e) => {
            eprintln!("pmo: {e:#}");
            ExitStatus::Infrastructure
        }
    };
    status.into()
}

async fn run(command: Commands) -> anyhow::Result<ExitStatus> {
    let cwd = std::env::current_dir()?;
    match command {
        Commands::Start { project } => commands::start(&project).await,
        Commands::Task {
            prompt,
            model,
            read_info,
        } => commands::task(&cwd, &prompt, model, read_info).await,
        Commands::Resume { session } => commands::resume(&cwd, &session).await,
        Commands::Logs { task, full } => commands::logs(&cwd, task.as_deref(), full),
        Commands::Gate { results, run_id } => commands::gate(&results, run_id.as_deref()),
        Commands::Plan { file } => commands::plan(&cwd, &file),
        Commands::Shutdown => commands::shutdown(&cwd).await,
    }
}
