//! Shipgate Core - release promotion controller
//!
//! Decides, for one triggering event, which version to stamp on a build,
//! whether the built artifacts pass strict verification, and which
//! distribution channels they may be promoted to.
//!
//! The publish step lives in `shipgate-publish` and the task graph that
//! wires everything together in `shipgate-ci`.

pub mod builder;
pub mod classifier;
pub mod config;
pub mod domain;
pub mod gate;
pub mod obs;
pub mod report;
pub mod telemetry;
pub mod verifier;
pub mod version_resolver;

pub use builder::{ArtifactBuilder, CommandArtifactBuilder, PackageMetadata, OUTPUT_DIR_ENV};
pub use classifier::{TriggerClassifier, TriggerInputs};
pub use config::{
    ChannelConfig, CredentialMode, CredentialsConfig, ShipgateConfig, CONFIG_FILE,
};
pub use domain::{
    Artifact, ArtifactSet, Channel, CheckKind, ChecksumManifest, EventKind, NoPublishReason,
    PackageDescriptor, PromotionDecision, PublishOutcome, Result, RunContext, ShipgateError,
    VerificationIssue, VerificationResult, VersionString,
};
pub use gate::{decide, GatePolicy};
pub use obs::RunSpan;
pub use report::{
    append_summary_md, render_summary_md, write_report_json, ChannelStatus, RunReport,
    TaskName, TaskRecord, TaskStatus,
};
pub use telemetry::init_tracing;
pub use verifier::Verifier;
pub use version_resolver::{
    normalize_candidate, CommandVersionSource, VersionResolver, VersionSource,
};

/// Shipgate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
