// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn signal(reason: ClarificationReason, target: Option<&str>) -> ClarificationSignal {
    ClarificationSignal {
        clarification_needed: true,
        clarification_reason: reason,
        target_file: target.map(PathBuf::from),
        original_prompt: "Create docs/guide.md".to_string(),
    }
}

#[tokio::test]
async fn question_names_the_existing_file() {
    let mediator = DeterministicMediator::new();
    let question = mediator
        .question_for(&signal(
            ClarificationReason::TargetFileExists,
            Some("docs/guide.md"),
        ))
        .await
        .unwrap();
    assert!(question.contains("docs/guide.md"));
    assert!(question.contains("Overwrite"));
}

#[tokio::test]
async fn each_reason_has_a_question() {
    let mediator = DeterministicMediator::new();
    for reason in [
        ClarificationReason::TargetFileExists,
        ClarificationReason::TargetFileAmbiguous,
        ClarificationReason::TargetActionAmbiguous,
        ClarificationReason::MissingRequiredInfo,
    ] {
        let question = mediator.question_for(&signal(reason, None)).await.unwrap();
        assert!(!question.is_empty());
    }
}

#[parameterized(
    overwrite = { "overwrite it please", FollowUpAction::Overwrite },
    replace = { "just replace the file", FollowUpAction::Overwrite },
    japanese_overwrite = { "上書きして", FollowUpAction::Overwrite },
    new_file = { "make a new file instead", FollowUpAction::CreateNew },
    cancel = { "cancel that", FollowUpAction::Cancel },
    never_mind = { "never mind", FollowUpAction::Cancel },
    modify = { "modify the existing one", FollowUpAction::Modify },
    default_create = { "yes go ahead", FollowUpAction::Create },
)]
fn classification(response: &str, expected: FollowUpAction) {
    assert_eq!(classify_response(response), expected);
}

#[tokio::test]
async fn normalize_builds_deterministic_prompt() {
    let mediator = DeterministicMediator::new();
    let task = mediator
        .normalize(
            &signal(ClarificationReason::TargetFileExists, Some("docs/guide.md")),
            "overwrite",
        )
        .await
        .unwrap();
    assert_eq!(task.action, FollowUpAction::Overwrite);
    assert_eq!(task.target_file, Some(PathBuf::from("docs/guide.md")));
    assert!(task.explicit_prompt.contains("Overwrite docs/guide.md"));
    assert_eq!(task.original_context, "Create docs/guide.md");
}

#[tokio::test]
async fn cancel_normalizes_to_empty_prompt() {
    let mediator = DeterministicMediator::new();
    let task = mediator
        .normalize(
            &signal(ClarificationReason::TargetFileExists, Some("docs/guide.md")),
            "cancel",
        )
        .await
        .unwrap();
    assert_eq!(task.action, FollowUpAction::Cancel);
    assert!(task.explicit_prompt.is_empty());
}

#[tokio::test]
async fn normalize_is_stable_across_calls() {
    let mediator = DeterministicMediator::new();
    let s = signal(ClarificationReason::TargetFileExists, Some("docs/guide.md"));
    let a = mediator.normalize(&s, "overwrite").await.unwrap();
    let b = mediator.normalize(&s, "overwrite").await.unwrap();
    assert_eq!(a, b);
}

#[test]
fn action_enum_is_closed_on_the_wire() {
    assert_eq!(
        serde_json::to_string(&FollowUpAction::CreateNew).unwrap(),
        "\"create_new\""
    );
    assert!(serde_json::from_str::<FollowUpAction>("\"delete_all\"").is_err());
}

#[test]
fn extract_json_trims_chatter() {
    let text = "Sure! Here's the JSON:\n{\"action\": \"overwrite\", \"explicit_prompt\": \"x\"}\nHope that helps.";
    let parsed: NormalizedReply = serde_json::from_str(extract_json(text)).unwrap();
    assert_eq!(parsed.action, FollowUpAction::Overwrite);
    assert_eq!(parsed.explicit_prompt, "x");
}
