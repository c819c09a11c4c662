//! Structured lifecycle events for a promotion run.
//!
//! Every event carries an `event` field (`run.classified`, `gate.decided`,
//! ...) so log pipelines can filter on it. Wrap a run in [`RunSpan`] to tag
//! all of them with the run id.

use tracing::{info, warn};

use crate::domain::context::RunContext;
use crate::domain::decision::{Channel, PromotionDecision, PublishOutcome};
use crate::domain::verification::VerificationResult;
use crate::domain::version::VersionString;

/// RAII guard that enters a run-scoped span.
///
/// ```ignore
/// let _span = RunSpan::enter("3f0c...");
/// // everything logged here carries run_id = "3f0c..."
/// ```
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    pub fn enter(run_id: &str) -> Self {
        let span = tracing::info_span!("shipgate.run", run_id = %run_id);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_run_classified(context: &RunContext) {
    info!(
        event = "run.classified",
        event_kind = %context.event_kind(),
        git_ref = %context.git_ref(),
        repository = %context.repository(),
        is_tag_ref = context.is_tag_ref(),
    );
}

pub fn emit_version_resolved(version: &VersionString, from_tag: bool) {
    info!(
        event = "version.resolved",
        version = %version,
        from_tag = from_tag,
        prerelease = version.is_prerelease(),
    );
}

pub fn emit_build_finished(version: &VersionString, artifact_count: usize, total_bytes: u64) {
    info!(
        event = "build.finished",
        version = %version,
        artifact_count = artifact_count,
        total_bytes = total_bytes,
    );
}

/// Failed verification is logged at warn level, one line per issue.
pub fn emit_verify_finished(result: &VerificationResult) {
    info!(
        event = "verify.finished",
        passed = result.passed(),
        issue_count = result.issues().len(),
    );
    for issue in result.issues() {
        warn!(
            event = "verify.issue",
            check = %issue.check,
            subject = %issue.subject,
            detail = %issue.detail,
        );
    }
}

pub fn emit_gate_decided(decision: &PromotionDecision) {
    info!(
        event = "gate.decided",
        decision = %decision,
        staging = decision.publish_to_staging(),
        production = decision.publish_to_production(),
    );
}

pub fn emit_publish_finished(channel: Channel, outcome: &PublishOutcome) {
    if outcome.is_success() {
        info!(event = "publish.finished", channel = %channel, outcome = %outcome);
    } else {
        warn!(event = "publish.finished", channel = %channel, outcome = %outcome);
    }
}

pub fn emit_run_finished(duration_ms: u64, success: bool) {
    info!(
        event = "run.finished",
        duration_ms = duration_ms,
        success = success,
    );
}

/// Emit event: a run-aborting error (warning level).
pub fn emit_run_aborted(stage: &str, error: &dyn std::fmt::Display) {
    warn!(event = "run.aborted", stage = %stage, error = %error);
}
