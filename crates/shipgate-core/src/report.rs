//! Run report.
//!
//! One [`RunReport`] per run, written as pretty JSON for machines and
//! rendered as Markdown for the job summary. The report distinguishes a
//! channel that was never attempted from one that failed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

use crate::domain::artifact::Artifact;
use crate::domain::context::RunContext;
use crate::domain::decision::{Channel, PromotionDecision, PublishOutcome};
use crate::domain::error::Result;
use crate::domain::verification::VerificationResult;
use crate::domain::version::VersionString;

pub const REPORT_SCHEMA_VERSION: &str = "1.0";

/// Nodes of the run's task graph.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TaskName {
    Classify,
    ResolveVersion,
    Build,
    Verify,
    StagingPublish,
    ProductionPublish,
}

impl TaskName {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskName::Classify => "classify",
            TaskName::ResolveVersion => "resolve_version",
            TaskName::Build => "build",
            TaskName::Verify => "verify",
            TaskName::StagingPublish => "staging_publish",
            TaskName::ProductionPublish => "production_publish",
        }
    }

    pub fn publish(channel: Channel) -> Self {
        match channel {
            Channel::Staging => TaskName::StagingPublish,
            Channel::Production => TaskName::ProductionPublish,
        }
    }

    /// The channel a publish task targets.
    pub fn channel(&self) -> Option<Channel> {
        match self {
            TaskName::StagingPublish => Some(Channel::Staging),
            TaskName::ProductionPublish => Some(Channel::Production),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum TaskStatus {
    Succeeded,
    Failed(String),
    /// Not run because the decision did not authorize it.
    Skipped(String),
    /// Not run because a dependency failed.
    Cancelled,
}

impl TaskStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, TaskStatus::Failed(_))
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Succeeded => f.write_str("succeeded"),
            TaskStatus::Failed(reason) => write!(f, "failed: {reason}"),
            TaskStatus::Skipped(reason) => write!(f, "skipped: {reason}"),
            TaskStatus::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskRecord {
    pub task: TaskName,
    pub status: TaskStatus,
    pub duration_ms: u64,
}

/// Final state of one channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ChannelStatus {
    NotAttempted(String),
    Published(PublishOutcome),
    Failed(String),
    Cancelled,
}

impl ChannelStatus {
    pub fn from_outcome(outcome: PublishOutcome) -> Self {
        match outcome {
            PublishOutcome::Failed(reason) => ChannelStatus::Failed(reason),
            other => ChannelStatus::Published(other),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ChannelStatus::Failed(_) | ChannelStatus::Cancelled)
    }
}

impl std::fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelStatus::NotAttempted(reason) => write!(f, "not attempted ({reason})"),
            ChannelStatus::Published(outcome) => write!(f, "{outcome}"),
            ChannelStatus::Failed(reason) => write!(f, "failed: {reason}"),
            ChannelStatus::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Summary of one promotion run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunReport {
    pub schema_version: String,
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub context: Option<RunContext>,
    pub version: Option<VersionString>,
    pub artifacts: Vec<Artifact>,
    pub verification: Option<VerificationResult>,
    pub decision: Option<PromotionDecision>,
    pub channels: BTreeMap<Channel, ChannelStatus>,
    pub tasks: Vec<TaskRecord>,
    /// Run-aborting error, if any.
    pub error: Option<String>,
}

impl RunReport {
    pub fn new(run_id: Uuid) -> Self {
        let channels = Channel::ALL
            .into_iter()
            .map(|c| (c, ChannelStatus::NotAttempted("gate not reached".to_string())))
            .collect();
        Self {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            context: None,
            version: None,
            artifacts: Vec::new(),
            verification: None,
            decision: None,
            channels,
            tasks: Vec::new(),
            error: None,
        }
    }

    pub fn record_task(&mut self, task: TaskName, status: TaskStatus, duration_ms: u64) {
        self.tasks.push(TaskRecord {
            task,
            status,
            duration_ms,
        });
    }

    pub fn set_channel(&mut self, channel: Channel, status: ChannelStatus) {
        self.channels.insert(channel, status);
    }

    pub fn channel(&self, channel: Channel) -> Option<&ChannelStatus> {
        self.channels.get(&channel)
    }

    pub fn task(&self, task: TaskName) -> Option<&TaskRecord> {
        self.tasks.iter().find(|r| r.task == task)
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn duration_ms(&self) -> u64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds().max(0) as u64
    }

    /// Whether the run should exit zero: nothing aborted, verification
    /// passed, and every attempted channel succeeded or was already present.
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
            && self.verification.as_ref().is_some_and(VerificationResult::passed)
            && !self.channels.values().any(ChannelStatus::is_failure)
            && !self.tasks.iter().any(|t| t.status.is_failure())
    }

    /// Why [`succeeded`](Self::succeeded) is false, or `None` when it is true.
    pub fn failure_reason(&self) -> Option<String> {
        if let Some(error) = &self.error {
            return Some(error.clone());
        }
        match &self.verification {
            None => return Some("verification did not run".to_string()),
            Some(VerificationResult::Fail(issues)) => {
                return Some(format!("verification failed with {} issue(s)", issues.len()))
            }
            Some(VerificationResult::Pass) => {}
        }

        let failed: Vec<String> = self
            .channels
            .iter()
            .filter(|(_, status)| status.is_failure())
            .map(|(channel, status)| format!("{channel}: {status}"))
            .chain(
                self.tasks
                    .iter()
                    .filter(|t| t.status.is_failure())
                    // a failed publish task is already reported by its channel
                    .filter(|t| {
                        t.task.channel().map_or(true, |c| {
                            !self.channels.get(&c).is_some_and(ChannelStatus::is_failure)
                        })
                    })
                    .map(|t| format!("{}: {}", t.task, t.status)),
            )
            .collect();
        (!failed.is_empty()).then(|| failed.join("; "))
    }
}

/// Write the report as pretty JSON.
pub fn write_report_json(path: &Path, report: &RunReport) -> Result<()> {
    let content = serde_json::to_string_pretty(report)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Render the Markdown job summary.
pub fn render_summary_md(report: &RunReport) -> String {
    let mut out = String::new();
    let verdict = if report.succeeded() { "succeeded" } else { "failed" };
    out.push_str(&format!("# Shipgate run {verdict}\n\n"));

    if let Some(ctx) = &report.context {
        out.push_str(&format!(
            "- event: `{}`\n- ref: `{}`\n- repository: `{}`\n",
            ctx.event_kind(),
            ctx.git_ref(),
            ctx.repository()
        ));
    }
    if let Some(version) = &report.version {
        out.push_str(&format!("- version: `{version}`\n"));
    }
    if let Some(decision) = &report.decision {
        out.push_str(&format!("- decision: {decision}\n"));
    }
    if let Some(error) = &report.error {
        out.push_str(&format!("- error: {error}\n"));
    }
    out.push('\n');

    if !report.artifacts.is_empty() {
        out.push_str("## Artifacts\n\n| file | bytes | sha256 |\n|---|---|---|\n");
        for a in &report.artifacts {
            out.push_str(&format!("| `{}` | {} | `{}` |\n", a.file_name, a.size, a.sha256));
        }
        out.push('\n');
    }

    if let Some(verification) = &report.verification {
        out.push_str("## Verification\n\n");
        if verification.passed() {
            out.push_str("All checks passed.\n\n");
        } else {
            for issue in verification.issues() {
                out.push_str(&format!("- {issue}\n"));
            }
            out.push('\n');
        }
    }

    out.push_str("## Channels\n\n| channel | status |\n|---|---|\n");
    for (channel, status) in &report.channels {
        out.push_str(&format!("| {channel} | {status} |\n"));
    }

    if !report.tasks.is_empty() {
        out.push_str("\n## Tasks\n\n| task | status | ms |\n|---|---|---|\n");
        for t in &report.tasks {
            out.push_str(&format!("| {} | {} | {} |\n", t.task, t.status, t.duration_ms));
        }
    }
    out
}

/// Append the Markdown summary to `path`, creating it if needed.
///
/// Job-summary files are shared between steps, so existing content is kept.
pub fn append_summary_md(path: &Path, report: &RunReport) -> Result<()> {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(render_summary_md(report).as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::EventKind;
    use crate::domain::decision::NoPublishReason;
    use crate::domain::verification::{CheckKind, VerificationIssue};

    fn passing_report() -> RunReport {
        let mut report = RunReport::new(Uuid::new_v4());
        report.context = Some(RunContext::new(
            EventKind::Push,
            "refs/heads/main",
            "acme/widget",
            false,
        ));
        report.version = Some(VersionString::parse("1.1.0.dev3").unwrap());
        report.verification = Some(VerificationResult::Pass);
        report.decision = Some(PromotionDecision::StagingOnly);
        report.set_channel(
            Channel::Staging,
            ChannelStatus::from_outcome(PublishOutcome::Succeeded),
        );
        report.set_channel(
            Channel::Production,
            ChannelStatus::NotAttempted("push builds stop at staging".into()),
        );
        report
    }

    #[test]
    fn test_report_schema_has_expected_keys() {
        let raw = serde_json::to_value(passing_report()).unwrap();
        let obj = raw.as_object().unwrap();
        for key in ["schema_version", "run_id", "context", "version", "decision", "channels", "tasks"] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert_eq!(raw["channels"]["staging"]["status"], "published");
        assert_eq!(raw["channels"]["production"]["status"], "not_attempted");
    }

    #[test]
    fn test_not_attempted_is_not_failure() {
        assert!(passing_report().succeeded());
    }

    #[test]
    fn test_failed_channel_fails_run() {
        let mut report = passing_report();
        report.set_channel(
            Channel::Staging,
            ChannelStatus::from_outcome(PublishOutcome::Failed("HTTP 500".into())),
        );
        assert!(!report.succeeded());
        assert!(matches!(
            report.channel(Channel::Staging),
            Some(ChannelStatus::Failed(_))
        ));
    }

    #[test]
    fn test_failed_verification_fails_run_even_without_publish() {
        let mut report = passing_report();
        let issues = vec![VerificationIssue::new(CheckKind::Contents, "x", "empty")];
        report.verification = Some(VerificationResult::from_issues(issues));
        report.decision = Some(PromotionDecision::no_publish(NoPublishReason::ManualDispatch));
        assert!(!report.succeeded());
        let md = render_summary_md(&report);
        assert!(md.contains("[contents] x: empty"));
    }

    #[test]
    fn test_failure_reason_names_what_failed() {
        assert_eq!(passing_report().failure_reason(), None);

        let mut unverified = passing_report();
        let issues = vec![
            VerificationIssue::new(CheckKind::Contents, "a", "empty"),
            VerificationIssue::new(CheckKind::Markup, "b", "unclosed fence"),
        ];
        unverified.verification = Some(VerificationResult::from_issues(issues));
        unverified.decision = Some(PromotionDecision::no_publish(NoPublishReason::ManualDispatch));
        assert_eq!(
            unverified.failure_reason().as_deref(),
            Some("verification failed with 2 issue(s)")
        );

        let mut rejected = passing_report();
        rejected.set_channel(
            Channel::Staging,
            ChannelStatus::from_outcome(PublishOutcome::Failed("HTTP 500".into())),
        );
        let reason = rejected.failure_reason().unwrap();
        assert!(reason.starts_with("staging: "), "{reason}");
        assert!(reason.contains("HTTP 500"));

        let mut aborted = passing_report();
        aborted.error = Some("build_error: compiler exploded".into());
        assert_eq!(
            aborted.failure_reason().as_deref(),
            Some("build_error: compiler exploded")
        );
    }

    #[test]
    fn test_summary_markdown_lists_channels() {
        let md = render_summary_md(&passing_report());
        assert!(md.starts_with("# Shipgate run succeeded"));
        assert!(md.contains("- version: `1.1.0.dev3`"));
        assert!(md.contains("| staging | succeeded |"));
        assert!(md.contains("| production | not attempted (push builds stop at staging) |"));
    }

    #[test]
    fn test_write_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("report.json");
        write_report_json(&json, &passing_report()).unwrap();
        let back: RunReport =
            serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
        assert_eq!(back.decision, Some(PromotionDecision::StagingOnly));

        let md = dir.path().join("summary.md");
        std::fs::write(&md, "previous step\n").unwrap();
        append_summary_md(&md, &passing_report()).unwrap();
        let text = std::fs::read_to_string(&md).unwrap();
        assert!(text.starts_with("previous step\n# Shipgate run"));
    }
}
