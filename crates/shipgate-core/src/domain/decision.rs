//! Promotion decisions and per-channel publish outcomes.

use serde::{Deserialize, Serialize};

use crate::domain::verification::VerificationIssue;

/// A distribution channel an artifact set can be promoted to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Staging,
    Production,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Staging, Channel::Production];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Staging => "staging",
            Channel::Production => "production",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a run publishes nothing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum NoPublishReason {
    /// The trigger is not eligible for any channel. Not an error.
    Ineligible(String),
    /// Manual runs only build and verify.
    ManualDispatch,
    /// The trigger was eligible but verification failed. Fatal.
    VerificationFailed(Vec<VerificationIssue>),
}

impl NoPublishReason {
    /// Whether this reason must fail the run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, NoPublishReason::VerificationFailed(_))
    }
}

impl std::fmt::Display for NoPublishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoPublishReason::Ineligible(why) => write!(f, "ineligible: {why}"),
            NoPublishReason::ManualDispatch => f.write_str("manual dispatch builds and verifies only"),
            NoPublishReason::VerificationFailed(issues) => {
                write!(f, "verification failed with {} issue(s)", issues.len())
            }
        }
    }
}

/// Terminal state of the promotion gate.
///
/// Production is only reachable through [`PromotionDecision::StagingAndProduction`],
/// which the gate only produces for a verified release-published run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum PromotionDecision {
    NoPublish { reason: NoPublishReason },
    StagingOnly,
    StagingAndProduction,
}

impl PromotionDecision {
    pub fn no_publish(reason: NoPublishReason) -> Self {
        PromotionDecision::NoPublish { reason }
    }

    pub fn publish_to_staging(&self) -> bool {
        matches!(
            self,
            PromotionDecision::StagingOnly | PromotionDecision::StagingAndProduction
        )
    }

    pub fn publish_to_production(&self) -> bool {
        matches!(self, PromotionDecision::StagingAndProduction)
    }

    pub fn allows(&self, channel: Channel) -> bool {
        match channel {
            Channel::Staging => self.publish_to_staging(),
            Channel::Production => self.publish_to_production(),
        }
    }

    /// Channels this decision authorizes, staging first.
    pub fn channels(&self) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|c| self.allows(*c))
            .collect()
    }

    pub fn no_publish_reason(&self) -> Option<&NoPublishReason> {
        match self {
            PromotionDecision::NoPublish { reason } => Some(reason),
            _ => None,
        }
    }
}

impl std::fmt::Display for PromotionDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PromotionDecision::NoPublish { reason } => write!(f, "no publish ({reason})"),
            PromotionDecision::StagingOnly => f.write_str("staging only"),
            PromotionDecision::StagingAndProduction => f.write_str("staging and production"),
        }
    }
}

/// Result of publishing an artifact set to one channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum PublishOutcome {
    Succeeded,
    /// The version was already present and the publish was idempotent.
    SkippedExisting,
    Failed(String),
}

impl PublishOutcome {
    /// Succeeded and SkippedExisting both count as success.
    pub fn is_success(&self) -> bool {
        !matches!(self, PublishOutcome::Failed(_))
    }
}

impl std::fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishOutcome::Succeeded => f.write_str("succeeded"),
            PublishOutcome::SkippedExisting => f.write_str("skipped (already published)"),
            PublishOutcome::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_flags_per_decision() {
        let none = PromotionDecision::no_publish(NoPublishReason::ManualDispatch);
        assert!(!none.publish_to_staging());
        assert!(!none.publish_to_production());
        assert!(none.channels().is_empty());

        let staging = PromotionDecision::StagingOnly;
        assert_eq!(staging.channels(), vec![Channel::Staging]);

        let both = PromotionDecision::StagingAndProduction;
        assert_eq!(both.channels(), vec![Channel::Staging, Channel::Production]);
    }

    #[test]
    fn test_only_verification_failure_is_fatal() {
        assert!(!NoPublishReason::Ineligible("fork".into()).is_fatal());
        assert!(!NoPublishReason::ManualDispatch.is_fatal());
        assert!(NoPublishReason::VerificationFailed(vec![]).is_fatal());
    }

    #[test]
    fn test_skipped_existing_is_success() {
        assert!(PublishOutcome::Succeeded.is_success());
        assert!(PublishOutcome::SkippedExisting.is_success());
        assert!(!PublishOutcome::Failed("403".into()).is_success());
    }

    #[test]
    fn test_decision_serializes_with_tag() {
        let json = serde_json::to_value(PromotionDecision::StagingOnly).unwrap();
        assert_eq!(json["decision"], "staging_only");
    }
}
