// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exit codes at the front-end boundary.

use pmo_core::OverallStatus;
use std::process::ExitCode;

/// Process exit classes: 0 success, 1 infrastructure error,
/// 2 session ERROR, 3 INVALID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Infrastructure,
    SessionError,
    Invalid,
}

impl ExitStatus {
    pub fn code(&self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Infrastructure => 1,
            ExitStatus::SessionError => 2,
            ExitStatus::Invalid => 3,
        }
    }
}

impl From<OverallStatus> for ExitStatus {
    fn from(status: OverallStatus) -> Self {
        match status {
            OverallStatus::Complete | OverallStatus::Incomplete => ExitStatus::Success,
            OverallStatus::NoEvidence | OverallStatus::Error => ExitStatus::SessionError,
            OverallStatus::Invalid => ExitStatus::Invalid,
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}
