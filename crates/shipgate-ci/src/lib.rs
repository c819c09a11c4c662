//! Shipgate CI - promotion pipeline
//!
//! Wires classification, versioning, build, verification, the promotion gate
//! and the concurrent publish phase into one run that always ends in a
//! [`shipgate_core::RunReport`].

pub mod pipeline;

pub use pipeline::PromotionPipeline;
