// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::manager::{CallOutcome, EvidenceFile};
use pmo_core::test_support::fixed_time;
use pmo_storage::AtomicWriter;
use serde_json::json;
use serial_test::serial;
use tempfile::TempDir;

const KEY: &str = "ANTHROPIC_API_KEY";

fn with_key<T>(f: impl FnOnce() -> T) -> T {
    std::env::set_var(KEY, "sk-ant-test");
    let result = f();
    std::env::remove_var(KEY);
    result
}

fn manager(dir: &TempDir) -> EvidenceManager {
    EvidenceManager::new(dir.path(), AtomicWriter::with_mode(false))
}

fn record(m: &EvidenceManager, id: &str, success: bool) -> LlmCallId {
    m.record_call(CallOutcome {
        call_id: LlmCallId::new(id),
        provider: Provider::Anthropic,
        model: "claude-sonnet".to_string(),
        request_messages: json!([{"role": "user", "content": "go"}]),
        response_text: success.then(|| "ok".to_string()),
        timestamp: fixed_time(),
        duration_ms: 10,
        success,
        error: None,
    })
    .unwrap()
    .call_id
}

#[test]
#[serial]
fn passes_with_valid_successful_evidence() {
    let dir = TempDir::new().unwrap();
    let m = manager(&dir);
    let id = record(&m, "llm-a-00000001", true);
    let verdict = with_key(|| Sentinel::new(&m, Provider::Anthropic).verify(&[id]));
    assert!(verdict.can_assert_complete);
    assert!(verdict.reasons.is_empty());
}

#[test]
#[serial]
fn key_gate_fails_without_credential() {
    let dir = TempDir::new().unwrap();
    let m = manager(&dir);
    let id = record(&m, "llm-a-00000001", true);
    std::env::remove_var(KEY);
    let verdict = Sentinel::new(&m, Provider::Anthropic).verify(&[id]);
    assert!(!verdict.can_assert_complete);
    assert_eq!(
        verdict.reasons,
        vec![SentinelReason::MissingCredential {
            env_key: KEY.to_string()
        }]
    );
}

#[test]
#[serial]
fn directory_gate_fails_when_missing() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope");
    let m = EvidenceManager::new(&missing, AtomicWriter::with_mode(false));
    let verdict = with_key(|| Sentinel::new(&m, Provider::Anthropic).verify(&[]));
    assert!(!verdict.can_assert_complete);
    assert!(matches!(
        verdict.reasons[0],
        SentinelReason::EvidenceDirMissing { .. }
    ));
}

#[test]
#[serial]
fn integrity_gate_reports_missing_evidence() {
    let dir = TempDir::new().unwrap();
    let m = manager(&dir);
    record(&m, "llm-a-00000001", true);
    let verdict = with_key(|| {
        Sentinel::new(&m, Provider::Anthropic)
            .verify(&[LlmCallId::new("llm-a-00000001"), LlmCallId::new("llm-gone")])
    });
    assert!(!verdict.can_assert_complete);
    assert!(verdict.reasons.contains(&SentinelReason::MissingEvidence {
        call_id: "llm-gone".to_string()
    }));
}

#[test]
#[serial]
fn integrity_gate_detects_tampering() {
    let dir = TempDir::new().unwrap();
    let m = manager(&dir);
    let id = record(&m, "llm-a-00000001", true);

    // Tamper with the stored response without updating the hash.
    let path = dir.path().join("llm-a-00000001.json");
    let mut file: EvidenceFile =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    file.response_text = Some("tampered".to_string());
    std::fs::write(&path, serde_json::to_vec_pretty(&file).unwrap()).unwrap();

    let verdict = with_key(|| Sentinel::new(&m, Provider::Anthropic).verify(&[id]));
    assert!(!verdict.can_assert_complete);
    assert!(verdict.reasons.iter().any(|r| matches!(
        r,
        SentinelReason::HashMismatch { field, .. } if field == "response_hash"
    )));
}

#[test]
#[serial]
fn requires_at_least_one_successful_call() {
    let dir = TempDir::new().unwrap();
    let m = manager(&dir);
    let id = record(&m, "llm-a-00000001", false);
    let verdict = with_key(|| Sentinel::new(&m, Provider::Anthropic).verify(&[id]));
    assert!(!verdict.can_assert_complete);
    assert!(verdict.reasons.contains(&SentinelReason::NoSuccessfulCall));
}

#[test]
#[serial]
fn empty_reference_list_has_no_successful_call() {
    let dir = TempDir::new().unwrap();
    let m = manager(&dir);
    let verdict = with_key(|| Sentinel::new(&m, Provider::Anthropic).verify(&[]));
    assert!(!verdict.can_assert_complete);
    assert_eq!(verdict.reasons, vec![SentinelReason::NoSuccessfulCall]);
}
