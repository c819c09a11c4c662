//! Promotion pipeline orchestration.
//!
//! Task graph:
//!
//! ```text
//! classify -> resolve_version -> build -> verify -+-> staging_publish
//!                                                 +-> production_publish
//! ```
//!
//! The prefix runs strictly in order and any failure there cancels
//! everything after it. The two publish tasks depend only on `verify` and
//! their own decision flag, so they run concurrently and each reports its own
//! outcome. There are no retries.

use futures::future::join_all;
use shipgate_core::obs::{
    emit_build_finished, emit_gate_decided, emit_publish_finished, emit_run_aborted,
    emit_run_classified, emit_run_finished, emit_verify_finished, emit_version_resolved,
};
use shipgate_core::{
    decide, ArtifactBuilder, ArtifactSet, Channel, ChannelStatus, GatePolicy, NoPublishReason,
    PromotionDecision, PublishOutcome, RunContext, RunReport, ShipgateConfig, ShipgateError,
    TaskName, TaskStatus, TriggerClassifier, TriggerInputs, VerificationResult, Verifier,
    VersionResolver, VersionSource,
};
use shipgate_publish::{CredentialIssuer, Publisher};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

const PREFIX: [TaskName; 4] = [
    TaskName::Classify,
    TaskName::ResolveVersion,
    TaskName::Build,
    TaskName::Verify,
];

/// Runs one promotion from trigger inputs to per-channel outcomes.
pub struct PromotionPipeline {
    policy: GatePolicy,
    resolver: VersionResolver<Arc<dyn VersionSource>>,
    builder: Arc<dyn ArtifactBuilder>,
    issuer: Arc<dyn CredentialIssuer>,
    publisher: Publisher,
    idempotent: BTreeMap<Channel, bool>,
}

impl PromotionPipeline {
    pub fn new(
        policy: GatePolicy,
        source: Arc<dyn VersionSource>,
        builder: Arc<dyn ArtifactBuilder>,
        issuer: Arc<dyn CredentialIssuer>,
        publisher: Publisher,
    ) -> Self {
        Self {
            policy,
            resolver: VersionResolver::new(source),
            builder,
            issuer,
            publisher,
            idempotent: Channel::ALL.into_iter().map(|c| (c, true)).collect(),
        }
    }

    /// Wire the pipeline from configuration: command-based version source
    /// and builder, HTTP registry, configured credential issuer.
    pub fn from_config(config: &ShipgateConfig) -> anyhow::Result<Self> {
        let publisher = shipgate_publish::publisher_from_config(config)?;
        let issuer = shipgate_publish::issuer_from_config(config)?;
        let mut pipeline = Self::new(
            config.gate_policy(),
            Arc::new(config.version_source()),
            Arc::new(config.artifact_builder()),
            issuer,
            publisher,
        );
        for channel in Channel::ALL {
            pipeline = pipeline.with_idempotent(channel, config.channels.get(channel).idempotent);
        }
        Ok(pipeline)
    }

    pub fn with_idempotent(mut self, channel: Channel, idempotent: bool) -> Self {
        self.idempotent.insert(channel, idempotent);
        self
    }

    /// Execute the full run. Never returns an error: every failure is
    /// recorded in the report, and [`RunReport::succeeded`] gives the exit
    /// status.
    pub async fn run(&self, inputs: &TriggerInputs) -> RunReport {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("shipgate.run", run_id = %run_id);
        self.run_inner(run_id, inputs).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, inputs: &TriggerInputs) -> RunReport {
        let mut report = RunReport::new(run_id);
        info!(event_name = %inputs.event_name, git_ref = %inputs.git_ref, "Starting promotion run");

        // classify
        let start = Instant::now();
        let context = match TriggerClassifier::classify(inputs) {
            Ok(ctx) => ctx,
            Err(e) => return abort(report, TaskName::Classify, e, start),
        };
        report.record_task(TaskName::Classify, TaskStatus::Succeeded, elapsed_ms(start));
        emit_run_classified(&context);
        report.context = Some(context.clone());

        // resolve version
        let start = Instant::now();
        let version = match self.resolver.resolve(&context).await {
            Ok(v) => v,
            Err(e) => return abort(report, TaskName::ResolveVersion, e, start),
        };
        report.record_task(TaskName::ResolveVersion, TaskStatus::Succeeded, elapsed_ms(start));
        emit_version_resolved(&version, context.is_tag_ref());
        report.version = Some(version.clone());

        // build
        let start = Instant::now();
        let set = match self.builder.build(&version).await {
            Ok(set) => Arc::new(set),
            Err(e) => return abort(report, TaskName::Build, e, start),
        };
        report.record_task(TaskName::Build, TaskStatus::Succeeded, elapsed_ms(start));
        emit_build_finished(&version, set.artifacts().len(), set.total_bytes());
        report.artifacts = set.artifacts().to_vec();

        // verify
        let start = Instant::now();
        let verification = Verifier::verify(&set);
        let verify_status = match &verification {
            VerificationResult::Pass => TaskStatus::Succeeded,
            VerificationResult::Fail(issues) => {
                TaskStatus::Failed(format!("{} verification issue(s)", issues.len()))
            }
        };
        report.record_task(TaskName::Verify, verify_status, elapsed_ms(start));
        emit_verify_finished(&verification);
        report.verification = Some(verification.clone());

        // gate
        let decision = decide(&self.policy, &context, &verification);
        emit_gate_decided(&decision);
        report.decision = Some(decision.clone());
        self.record_unauthorized(&mut report, &context, &decision, verification.passed());

        if let Some(NoPublishReason::VerificationFailed(issues)) = decision.no_publish_reason() {
            let err = ShipgateError::Verification {
                issues: issues.clone(),
            };
            emit_run_aborted(TaskName::Verify.as_str(), &err);
            report.error = Some(format!("{}: {err}", err.kind()));
        }

        // publish
        for (channel, outcome, duration_ms) in self.publish_all(&decision, set).await {
            emit_publish_finished(channel, &outcome);
            let status = match &outcome {
                PublishOutcome::Failed(reason) => TaskStatus::Failed(reason.clone()),
                _ => TaskStatus::Succeeded,
            };
            report.record_task(TaskName::publish(channel), status, duration_ms);
            report.set_channel(channel, ChannelStatus::from_outcome(outcome));
        }

        report.finish();
        emit_run_finished(report.duration_ms(), report.succeeded());
        report
    }

    /// Mark channels the decision does not authorize.
    fn record_unauthorized(
        &self,
        report: &mut RunReport,
        context: &RunContext,
        decision: &PromotionDecision,
        verified: bool,
    ) {
        for channel in Channel::ALL {
            if decision.allows(channel) {
                continue;
            }
            let reason = match decision.no_publish_reason() {
                Some(reason) => reason.to_string(),
                None => format!("{} runs do not publish to {channel}", context.event_kind()),
            };
            let task_status = if verified {
                TaskStatus::Skipped(reason.clone())
            } else {
                TaskStatus::Cancelled
            };
            report.record_task(TaskName::publish(channel), task_status, 0);
            report.set_channel(channel, ChannelStatus::NotAttempted(reason));
        }
    }

    /// Publish to every authorized channel concurrently. Each channel gets
    /// its own freshly issued credential inside its own task.
    async fn publish_all(
        &self,
        decision: &PromotionDecision,
        set: Arc<ArtifactSet>,
    ) -> Vec<(Channel, PublishOutcome, u64)> {
        let channels = decision.channels();
        let mut handles = Vec::with_capacity(channels.len());

        for channel in channels.iter().copied() {
            let issuer = self.issuer.clone();
            let publisher = self.publisher.clone();
            let set = set.clone();
            let idempotent = self.idempotent.get(&channel).copied().unwrap_or(true);

            let task = async move {
                let start = Instant::now();
                let outcome = match issuer.issue(channel).await {
                    Ok(credential) => publisher.publish(channel, &set, credential, idempotent).await,
                    Err(e) => e.into_outcome(channel),
                };
                (outcome, elapsed_ms(start))
            };
            handles.push(tokio::spawn(task.in_current_span()));
        }

        join_all(handles)
            .await
            .into_iter()
            .zip(channels)
            .map(|(joined, channel)| match joined {
                Ok((outcome, ms)) => (channel, outcome, ms),
                Err(e) => {
                    warn!(channel = %channel, error = %e, "publish task did not complete");
                    (channel, PublishOutcome::Failed(format!("publish task aborted: {e}")), 0)
                }
            })
            .collect()
    }
}

/// Record a prefix failure and cancel everything after it.
fn abort(mut report: RunReport, failed: TaskName, err: ShipgateError, start: Instant) -> RunReport {
    emit_run_aborted(failed.as_str(), &err);
    report.record_task(failed, TaskStatus::Failed(err.to_string()), elapsed_ms(start));

    let remaining = PREFIX
        .iter()
        .skip_while(|t| **t != failed)
        .skip(1)
        .copied()
        .chain(Channel::ALL.into_iter().map(TaskName::publish));
    for task in remaining {
        report.record_task(task, TaskStatus::Cancelled, 0);
    }
    for channel in Channel::ALL {
        report.set_channel(
            channel,
            ChannelStatus::NotAttempted(format!("{failed} failed")),
        );
    }

    report.error = Some(format!("{}: {err}", err.kind()));
    report.finish();
    emit_run_finished(report.duration_ms(), false);
    report
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
