// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing setup for the CLI.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the subscriber once: env-filtered to stderr, plus a daily
/// rolling file when `PMO_LOG_DIR` is set. `PMO_LOG` overrides the
/// level.
pub fn init() {
    let filter = EnvFilter::try_from_env("PMO_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let file_layer = std::env::var("PMO_LOG_DIR").ok().map(|dir| {
        let appender = tracing_appender::rolling::daily(dir, "pmo.log");
        fmt::layer().with_writer(appender).with_ansi(false)
    });
    let result = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init();
    // A second init (tests) is fine.
    drop(result);
}
