//! Error types for shipgate-publish

use shipgate_core::{Channel, PublishOutcome, ShipgateError};
use thiserror::Error;

/// Errors that can occur while publishing to a channel
#[derive(Error, Debug)]
pub enum PublishError {
    /// No credential could be obtained for the channel
    #[error("{channel} credential unavailable: {reason}")]
    CredentialUnavailable { channel: Channel, reason: String },

    /// Runtime workload identity could not be obtained
    #[error("workload identity unavailable: {0}")]
    IdentityUnavailable(String),

    /// Credential was issued for a different channel
    #[error("credential scoped to {actual} cannot publish to {expected}")]
    CredentialScope { expected: Channel, actual: Channel },

    #[error("{channel} credential expired")]
    CredentialExpired { channel: Channel },

    /// Channel refused the credential
    #[error("{channel} rejected the credential (HTTP {status})")]
    CredentialRejected { channel: Channel, status: u16 },

    /// Channel refused an upload for any other reason
    #[error("{channel} rejected {file} (HTTP {status}): {body}")]
    UploadRejected {
        channel: Channel,
        file: String,
        status: u16,
        body: String,
    },

    /// Artifact set cannot be published as-is
    #[error("artifact set cannot be published: {0}")]
    InvalidArtifactSet(String),

    /// No endpoint configured for the channel
    #[error("no endpoint configured for {0}")]
    NoEndpoint(Channel),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for PublishError {
    fn from(err: reqwest::Error) -> Self {
        PublishError::Http(err.to_string())
    }
}

impl PublishError {
    /// Lift into the controller-wide taxonomy, tagged with the channel.
    pub fn into_shipgate(self, channel: Channel) -> ShipgateError {
        ShipgateError::Publish {
            channel,
            reason: self.to_string(),
        }
    }

    /// Fold into a failed channel outcome, prefixed with the error kind the
    /// run report uses (`publish_error: ...`).
    pub fn into_outcome(self, channel: Channel) -> PublishOutcome {
        let err = self.into_shipgate(channel);
        PublishOutcome::Failed(format!("{}: {err}", err.kind()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_outcome_carries_kind_and_channel() {
        let err = PublishError::UploadRejected {
            channel: Channel::Staging,
            file: "widget-1.0.tar.gz".to_string(),
            status: 500,
            body: "boom".to_string(),
        };
        match err.into_outcome(Channel::Staging) {
            PublishOutcome::Failed(reason) => {
                assert!(reason.starts_with("publish_error: publish to staging failed"));
                assert!(reason.contains("HTTP 500"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }
}

/// Result type for publish operations
pub type Result<T> = std::result::Result<T, PublishError>;
