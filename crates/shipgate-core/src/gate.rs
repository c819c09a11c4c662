//! Promotion gate.
//!
//! A pure decision table over the run context and the verification verdict:
//!
//! | event             | canonical repo | trunk | verification | decision               |
//! |-------------------|----------------|-------|--------------|------------------------|
//! | release published | any            | -     | pass         | staging and production |
//! | release published | any            | -     | fail         | no publish (fatal)     |
//! | push              | yes            | yes   | pass         | staging only           |
//! | push              | yes            | yes   | fail         | no publish (fatal)     |
//! | push              | otherwise      |       | any          | no publish (ineligible)|
//! | manual dispatch   | any            | any   | any          | no publish             |

use serde::{Deserialize, Serialize};

use crate::domain::context::{EventKind, RunContext};
use crate::domain::decision::{NoPublishReason, PromotionDecision};
use crate::domain::verification::VerificationResult;

/// Default trunk branch.
pub const DEFAULT_TRUNK_BRANCH: &str = "main";

/// Repository and branch that may promote push builds to staging.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatePolicy {
    /// `owner/name` of the canonical repository. Forks never publish.
    pub canonical_repository: String,
    pub trunk_branch: String,
}

impl GatePolicy {
    pub fn new(canonical_repository: impl Into<String>) -> Self {
        Self {
            canonical_repository: canonical_repository.into(),
            trunk_branch: DEFAULT_TRUNK_BRANCH.to_string(),
        }
    }

    pub fn with_trunk_branch(mut self, trunk_branch: impl Into<String>) -> Self {
        self.trunk_branch = trunk_branch.into();
        self
    }

    pub fn is_canonical(&self, repository: &str) -> bool {
        self.canonical_repository
            .trim()
            .eq_ignore_ascii_case(repository.trim())
    }

    /// Whether `git_ref` names the trunk branch, either bare or fully
    /// qualified.
    pub fn is_trunk(&self, git_ref: &str) -> bool {
        let trunk = self.trunk_branch.trim();
        let git_ref = git_ref.trim();
        git_ref == trunk || git_ref.strip_prefix("refs/heads/") == Some(trunk)
    }
}

/// Decide which channels a run may publish to.
pub fn decide(
    policy: &GatePolicy,
    context: &RunContext,
    verification: &VerificationResult,
) -> PromotionDecision {
    let eligible = match context.event_kind() {
        EventKind::ManualDispatch => {
            return PromotionDecision::no_publish(NoPublishReason::ManualDispatch)
        }
        EventKind::ReleasePublished => PromotionDecision::StagingAndProduction,
        EventKind::Push => {
            if !policy.is_canonical(context.repository()) {
                return PromotionDecision::no_publish(NoPublishReason::Ineligible(format!(
                    "repository {} is not {}",
                    context.repository(),
                    policy.canonical_repository
                )));
            }
            if context.is_tag_ref() || !policy.is_trunk(context.git_ref()) {
                return PromotionDecision::no_publish(NoPublishReason::Ineligible(format!(
                    "ref {} is not trunk branch {}",
                    context.git_ref(),
                    policy.trunk_branch
                )));
            }
            PromotionDecision::StagingOnly
        }
    };

    match verification {
        VerificationResult::Pass => eligible,
        VerificationResult::Fail(issues) => {
            PromotionDecision::no_publish(NoPublishReason::VerificationFailed(issues.clone()))
        }
    }
}
