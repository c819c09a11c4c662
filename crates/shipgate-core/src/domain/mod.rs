//! Domain models for Shipgate.
//!
//! Canonical definitions for the core entities:
//! - `RunContext`: what triggered the run
//! - `VersionString`: the validated version stamped on a build
//! - `ArtifactSet`: the built files, keyed by version
//! - `VerificationResult`: strict verification verdict
//! - `PromotionDecision` / `PublishOutcome`: gate result and per-channel result

pub mod artifact;
pub mod context;
pub mod decision;
pub mod error;
pub mod verification;
pub mod version;

pub use artifact::{Artifact, ArtifactSet, ChecksumManifest, PackageDescriptor};
pub use context::{EventKind, RunContext};
pub use decision::{Channel, NoPublishReason, PromotionDecision, PublishOutcome};
pub use error::{Result, ShipgateError};
pub use verification::{CheckKind, VerificationIssue, VerificationResult};
pub use version::VersionString;
