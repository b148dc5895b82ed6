// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

#[test]
fn missing_config_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config = load_project_config(dir.path()).unwrap();
    assert_eq!(config.limits.max_files, 20);
    assert_eq!(config.limits.max_tests, 50);
    assert_eq!(config.limits.max_seconds, 900);
}

#[test]
fn limits_load_from_yaml() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(PROJECT_CONFIG_FILE),
        "limits:\n  max_files: 5\n  max_seconds: 120\n",
    )
    .unwrap();
    let config = load_project_config(dir.path()).unwrap();
    assert_eq!(config.limits.max_files, 5);
    assert_eq!(config.limits.max_tests, 50);
    assert_eq!(config.limits.max_seconds, 120);
}

#[test]
fn bad_yaml_is_fatal_configuration_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(PROJECT_CONFIG_FILE), "limits: [not a map").unwrap();
    let err = load_project_config(dir.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Yaml { .. }));
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn pool_defaults_match_contract() {
    let pool = PoolConfig::default();
    assert_eq!(pool.l1_capacity, 9);
    assert_eq!(pool.l2_capacity, 4);
    assert!(pool.l1_queueing);
    assert_eq!(pool.stale_after, Duration::from_secs(300));
}

#[test]
fn snapshot_enumerates_recognized_fields() {
    let options = RunnerOptions::default();
    let snapshot = options.snapshot();
    assert_eq!(snapshot["continue_on_task_failure"], false);
    assert_eq!(snapshot["auto_resolve_llm_provider"], "anthropic");
    assert_eq!(snapshot["l2_capacity"], 4);
    assert!(snapshot.get("executor").is_some());
}

#[test]
fn debug_does_not_require_callback_to_be_debug() {
    let options = RunnerOptions {
        user_response_handler: Some(Arc::new(|_q| Some("yes".to_string()))),
        ..RunnerOptions::default()
    };
    let text = format!("{options:?}");
    assert!(text.contains("RunnerOptions"));
}
