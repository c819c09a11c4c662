//! Trigger classification.
//!
//! Turns the raw strings supplied by the invoking runtime into a
//! [`RunContext`]. Classification is pure: no I/O and no defaults for
//! anything it does not recognise.

use serde::{Deserialize, Serialize};

use crate::domain::context::{is_qualified_tag_ref, EventKind, RunContext};
use crate::domain::error::{Result, ShipgateError};

/// Lifecycle state a release must be in to be promotable.
pub const PUBLISHED_ACTION: &str = "published";

/// Raw trigger inputs as handed over by the invoking runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriggerInputs {
    /// Runtime event name, e.g. `push`, `release`, `workflow_dispatch`.
    pub event_name: String,
    pub git_ref: String,
    /// `owner/name` identity of the repository the run executes in.
    pub repository: String,
    /// Explicit ref type (`tag` or `branch`) when the runtime provides one.
    pub ref_type: Option<String>,
    /// Release lifecycle action, e.g. `published`.
    pub lifecycle_action: Option<String>,
    pub manual_dispatch: bool,
}

/// Stateless trigger classifier.
pub struct TriggerClassifier;

impl TriggerClassifier {
    /// Classify raw runtime inputs.
    pub fn classify(inputs: &TriggerInputs) -> Result<RunContext> {
        let event_kind = Self::event_kind(inputs)?;

        if inputs.manual_dispatch && event_kind != EventKind::ManualDispatch {
            return Err(ShipgateError::Configuration(format!(
                "manual-dispatch flag set but event is {:?}",
                inputs.event_name
            )));
        }

        let is_tag_ref = match inputs.ref_type.as_deref().map(str::trim) {
            Some("tag") => true,
            Some("branch") => false,
            Some(other) => {
                return Err(ShipgateError::Configuration(format!(
                    "unknown ref type: {other:?}"
                )))
            }
            None => is_qualified_tag_ref(inputs.git_ref.trim()),
        };

        Self::classify_parts(event_kind, &inputs.git_ref, &inputs.repository, is_tag_ref)
    }

    /// Build a context from already-typed parts, rejecting combinations no
    /// runtime can legitimately produce.
    pub fn classify_parts(
        event_kind: EventKind,
        git_ref: &str,
        repository: &str,
        is_tag_ref: bool,
    ) -> Result<RunContext> {
        let git_ref = git_ref.trim();
        let repository = repository.trim();

        if git_ref.is_empty() {
            return Err(ShipgateError::Configuration("ref is empty".to_string()));
        }
        if repository.is_empty() {
            return Err(ShipgateError::Configuration(
                "repository identity is empty".to_string(),
            ));
        }
        if event_kind == EventKind::ReleasePublished && !is_tag_ref {
            return Err(ShipgateError::Configuration(format!(
                "release event must reference a tag, got {git_ref:?}"
            )));
        }

        Ok(RunContext::new(event_kind, git_ref, repository, is_tag_ref))
    }

    fn event_kind(inputs: &TriggerInputs) -> Result<EventKind> {
        let name = inputs.event_name.trim();
        match name {
            "push" => Ok(EventKind::Push),
            "workflow_dispatch" => Ok(EventKind::ManualDispatch),
            "release" => match inputs.lifecycle_action.as_deref().map(str::trim) {
                Some(PUBLISHED_ACTION) => Ok(EventKind::ReleasePublished),
                Some(action) => Err(ShipgateError::Configuration(format!(
                    "release lifecycle state {action:?} is not promotable"
                ))),
                None => Err(ShipgateError::Configuration(
                    "release event without lifecycle state".to_string(),
                )),
            },
            "" if inputs.manual_dispatch => Ok(EventKind::ManualDispatch),
            other => other.parse(),
        }
    }
}
