//! Verification results.

use serde::{Deserialize, Serialize};

/// Which family of checks produced an issue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// The set has files, each readable and non-empty.
    Contents,
    /// `SHA256SUMS` is present and matches the files.
    Checksums,
    /// File names and descriptor carry the set's version.
    Attribution,
    /// Required descriptor fields are present.
    Descriptor,
    /// The long description is well-formed for its content type.
    Markup,
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CheckKind::Contents => "contents",
            CheckKind::Checksums => "checksums",
            CheckKind::Attribution => "attribution",
            CheckKind::Descriptor => "descriptor",
            CheckKind::Markup => "markup",
        };
        f.write_str(s)
    }
}

/// A single strict-mode finding. There are no warnings: every issue fails.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerificationIssue {
    pub check: CheckKind,
    /// File or field the issue is about.
    pub subject: String,
    pub detail: String,
}

impl VerificationIssue {
    pub fn new(check: CheckKind, subject: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            check,
            subject: subject.into(),
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for VerificationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.check, self.subject, self.detail)
    }
}

/// Outcome of verifying an artifact set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "result", content = "issues", rename_all = "snake_case")]
pub enum VerificationResult {
    Pass,
    Fail(Vec<VerificationIssue>),
}

impl VerificationResult {
    /// Build a result from collected issues; no issues means pass.
    pub fn from_issues(issues: Vec<VerificationIssue>) -> Self {
        if issues.is_empty() {
            VerificationResult::Pass
        } else {
            VerificationResult::Fail(issues)
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self, VerificationResult::Pass)
    }

    pub fn issues(&self) -> &[VerificationIssue] {
        match self {
            VerificationResult::Pass => &[],
            VerificationResult::Fail(issues) => issues,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_issues() {
        assert!(VerificationResult::from_issues(vec![]).passed());
        let fail = VerificationResult::from_issues(vec![VerificationIssue::new(
            CheckKind::Contents,
            "dist",
            "no artifacts",
        )]);
        assert!(!fail.passed());
        assert_eq!(fail.issues().len(), 1);
        assert_eq!(fail.issues()[0].to_string(), "[contents] dist: no artifacts");
    }
}
