//! Eligibility matrix for the promotion gate.
//!
//! Exercises every row of the decision table through the classifier so the
//! whole pure front half of a run is covered without any build or network.

use shipgate_core::{
    decide, CheckKind, EventKind, GatePolicy, NoPublishReason, PromotionDecision,
    TriggerClassifier, TriggerInputs, VerificationIssue, VerificationResult,
};

fn policy() -> GatePolicy {
    GatePolicy::new("acme/widget")
}

fn fail() -> VerificationResult {
    VerificationResult::from_issues(vec![VerificationIssue::new(
        CheckKind::Checksums,
        "widget-1.0.0.tar.gz",
        "checksum mismatch",
    )])
}

fn classify(event: &str, git_ref: &str, repo: &str, action: Option<&str>) -> shipgate_core::RunContext {
    TriggerClassifier::classify(&TriggerInputs {
        event_name: event.to_string(),
        git_ref: git_ref.to_string(),
        repository: repo.to_string(),
        lifecycle_action: action.map(str::to_string),
        ..Default::default()
    })
    .expect("classify")
}

#[test]
fn release_published_and_verified_reaches_production() {
    for repo in ["acme/widget", "someone/fork"] {
        let ctx = classify("release", "refs/tags/v1.0.0", repo, Some("published"));
        let decision = decide(&policy(), &ctx, &VerificationResult::Pass);
        assert_eq!(decision, PromotionDecision::StagingAndProduction);
        assert!(decision.publish_to_production());
    }
}

#[test]
fn only_release_published_sets_production() {
    let contexts = [
        classify("push", "refs/heads/main", "acme/widget", None),
        classify("push", "refs/heads/feature", "acme/widget", None),
        classify("push", "refs/tags/v1.0.0", "acme/widget", None),
        classify("push", "refs/heads/main", "someone/fork", None),
        classify("workflow_dispatch", "refs/heads/main", "acme/widget", None),
        classify("workflow_dispatch", "refs/tags/v1.0.0", "acme/widget", None),
    ];
    for ctx in &contexts {
        for verification in [VerificationResult::Pass, fail()] {
            let decision = decide(&policy(), ctx, &verification);
            assert!(
                !decision.publish_to_production(),
                "{:?} reached production",
                ctx
            );
            assert_ne!(ctx.event_kind(), EventKind::ReleasePublished);
        }
    }
}

#[test]
fn trunk_push_on_canonical_repo_goes_to_staging_only() {
    let ctx = classify("push", "refs/heads/main", "acme/widget", None);
    assert_eq!(
        decide(&policy(), &ctx, &VerificationResult::Pass),
        PromotionDecision::StagingOnly
    );
}

#[test]
fn ineligible_push_is_silent_no_publish() {
    let cases = [
        ("refs/heads/main", "someone/fork"),
        ("refs/heads/feature/x", "acme/widget"),
        ("refs/heads/mainline", "acme/widget"),
    ];
    for (git_ref, repo) in cases {
        let ctx = classify("push", git_ref, repo, None);
        for verification in [VerificationResult::Pass, fail()] {
            let decision = decide(&policy(), &ctx, &verification);
            let reason = decision.no_publish_reason().expect("no publish");
            assert!(matches!(reason, NoPublishReason::Ineligible(_)));
            assert!(!reason.is_fatal(), "ineligibility must not fail the run");
        }
    }
}

#[test]
fn verification_failure_dominates_release_eligibility() {
    let ctx = classify("release", "refs/tags/v2.0.0", "acme/widget", Some("published"));
    let decision = decide(&policy(), &ctx, &fail());
    assert!(!decision.publish_to_staging());
    assert!(!decision.publish_to_production());
    let reason = decision.no_publish_reason().expect("no publish");
    assert!(reason.is_fatal());
    assert!(matches!(reason, NoPublishReason::VerificationFailed(issues) if issues.len() == 1));
}

#[test]
fn verification_failure_on_trunk_push_is_fatal() {
    let ctx = classify("push", "main", "acme/widget", None);
    let decision = decide(&policy(), &ctx, &fail());
    assert!(decision.no_publish_reason().unwrap().is_fatal());
}

#[test]
fn manual_dispatch_never_publishes() {
    let ctx = classify("workflow_dispatch", "refs/heads/main", "acme/widget", None);
    for verification in [VerificationResult::Pass, fail()] {
        assert_eq!(
            decide(&policy(), &ctx, &verification),
            PromotionDecision::no_publish(NoPublishReason::ManualDispatch)
        );
    }
}
