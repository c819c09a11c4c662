//! Run context: the immutable description of what triggered a run.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::error::ShipgateError;

const TAG_PREFIX: &str = "refs/tags/";
const BRANCH_PREFIX: &str = "refs/heads/";

/// The closed set of trigger kinds a run can be classified into.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A push to a branch or tag.
    Push,
    /// A release reached its `published` lifecycle state.
    ReleasePublished,
    /// A human started the run by hand.
    ManualDispatch,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Push => "push",
            EventKind::ReleasePublished => "release_published",
            EventKind::ManualDispatch => "manual_dispatch",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = ShipgateError;

    /// Parse the canonical names produced by [`EventKind::as_str`].
    ///
    /// Anything else is a configuration error: defaulting an unknown kind
    /// could open a path to a production publish.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "push" => Ok(EventKind::Push),
            "release_published" => Ok(EventKind::ReleasePublished),
            "manual_dispatch" => Ok(EventKind::ManualDispatch),
            other => Err(ShipgateError::Configuration(format!(
                "unknown event kind: {other:?}"
            ))),
        }
    }
}

/// Immutable record created once per invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunContext {
    event_kind: EventKind,
    git_ref: String,
    repository: String,
    is_tag_ref: bool,
}

impl RunContext {
    pub fn new(
        event_kind: EventKind,
        git_ref: impl Into<String>,
        repository: impl Into<String>,
        is_tag_ref: bool,
    ) -> Self {
        Self {
            event_kind,
            git_ref: git_ref.into(),
            repository: repository.into(),
            is_tag_ref,
        }
    }

    pub fn event_kind(&self) -> EventKind {
        self.event_kind
    }

    /// The ref exactly as supplied by the invoking runtime.
    pub fn git_ref(&self) -> &str {
        &self.git_ref
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn is_tag_ref(&self) -> bool {
        self.is_tag_ref
    }

    /// Tag name with any `refs/tags/` prefix removed, for tag refs only.
    pub fn tag_name(&self) -> Option<&str> {
        if !self.is_tag_ref {
            return None;
        }
        Some(
            self.git_ref
                .strip_prefix(TAG_PREFIX)
                .unwrap_or(&self.git_ref),
        )
    }

    /// Branch name with any `refs/heads/` prefix removed, for branch refs only.
    pub fn branch_name(&self) -> Option<&str> {
        if self.is_tag_ref {
            return None;
        }
        Some(
            self.git_ref
                .strip_prefix(BRANCH_PREFIX)
                .unwrap_or(&self.git_ref),
        )
    }
}

/// Whether a raw ref string names a tag by its fully qualified form.
pub fn is_qualified_tag_ref(git_ref: &str) -> bool {
    git_ref.starts_with(TAG_PREFIX)
}
