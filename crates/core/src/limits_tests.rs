// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;

fn ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap()
}

#[test]
fn defaults_match_contract() {
    let limits = Limits::default();
    assert_eq!(limits.max_files, 20);
    assert_eq!(limits.max_tests, 50);
    assert_eq!(limits.max_seconds, 900);
}

#[test]
fn within_limits_yields_no_violation() {
    let limits = Limits::default();
    assert!(limits.check_files(20, ts()).is_none());
    assert!(limits.check_tests(50, ts()).is_none());
    assert!(limits.check_seconds(900, ts()).is_none());
}

#[test]
fn exceeding_limits_yields_violation() {
    let limits = Limits::default();
    let violation = limits.check_files(21, ts()).unwrap();
    assert_eq!(violation.limit, "max_files");
    assert_eq!(violation.actual, 21);
    assert_eq!(violation.max, 20);
    assert!(limits.check_tests(51, ts()).is_some());
    assert!(limits.check_seconds(901, ts()).is_some());
}

#[test]
fn violation_display() {
    let limits = Limits::default();
    let violation = limits.check_seconds(1200, ts()).unwrap();
    assert_eq!(violation.to_string(), "max_seconds exceeded: 1200 > 900");
}

#[test]
fn partial_yaml_fills_defaults() {
    let limits: Limits = serde_json::from_str(r#"{"max_files": 5}"#).unwrap();
    assert_eq!(limits.max_files, 5);
    assert_eq!(limits.max_tests, 50);
    assert_eq!(limits.max_seconds, 900);
}
