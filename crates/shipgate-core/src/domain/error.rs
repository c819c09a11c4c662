//! Domain-level error taxonomy for Shipgate.

use crate::domain::decision::Channel;
use crate::domain::verification::VerificationIssue;

/// Shipgate domain errors.
///
/// The first four variants are fatal to the whole run and are raised by the
/// sequential prefix (classify, version, build, verify). `Publish` is scoped
/// to a single channel.
#[derive(Debug, thiserror::Error)]
pub enum ShipgateError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("version resolution error: {0}")]
    VersionResolution(String),

    #[error("build error: {0}")]
    Build(String),

    #[error("verification failed with {} issue(s)", issues.len())]
    Verification { issues: Vec<VerificationIssue> },

    #[error("publish to {channel} failed: {reason}")]
    Publish { channel: Channel, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShipgateError {
    /// Short machine-readable label used in logs and run reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ShipgateError::Configuration(_) => "configuration_error",
            ShipgateError::VersionResolution(_) => "version_resolution_error",
            ShipgateError::Build(_) => "build_error",
            ShipgateError::Verification { .. } => "verification_error",
            ShipgateError::Publish { .. } => "publish_error",
            ShipgateError::Serialization(_) => "serialization_error",
            ShipgateError::Io(_) => "io_error",
        }
    }
}

/// Result type for Shipgate domain operations.
pub type Result<T> = std::result::Result<T, ShipgateError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::verification::{CheckKind, VerificationIssue};

    #[test]
    fn test_configuration_error_display() {
        let err = ShipgateError::Configuration("unknown event kind: schedule".to_string());
        assert!(err.to_string().contains("configuration error"));
        assert!(err.to_string().contains("schedule"));
        assert_eq!(err.kind(), "configuration_error");
    }

    #[test]
    fn test_verification_error_counts_issues() {
        let err = ShipgateError::Verification {
            issues: vec![
                VerificationIssue::new(CheckKind::Checksums, "SHA256SUMS", "missing"),
                VerificationIssue::new(CheckKind::Descriptor, "summary", "empty"),
            ],
        };
        assert_eq!(err.to_string(), "verification failed with 2 issue(s)");
    }

    #[test]
    fn test_publish_error_names_channel() {
        let err = ShipgateError::Publish {
            channel: Channel::Production,
            reason: "credential rejected".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("production"));
        assert!(msg.contains("credential rejected"));
    }
}
