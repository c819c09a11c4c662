//! Publishing an artifact set to a channel.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::credential::ChannelCredential;
use crate::error::{PublishError, Result};
use crate::registry::{ChannelRegistry, UploadResponse};
use shipgate_core::{ArtifactSet, Channel, PublishOutcome};

/// Publishes artifact sets through a [`ChannelRegistry`].
///
/// Holds no credentials of its own: each call consumes the credential it is
/// handed, so a credential is used for exactly one publish.
#[derive(Clone)]
pub struct Publisher {
    registry: Arc<dyn ChannelRegistry>,
    endpoints: BTreeMap<Channel, String>,
}

impl Publisher {
    pub fn new(registry: Arc<dyn ChannelRegistry>) -> Self {
        Self {
            registry,
            endpoints: BTreeMap::new(),
        }
    }

    pub fn with_endpoint(mut self, channel: Channel, endpoint: impl Into<String>) -> Self {
        self.endpoints.insert(channel, endpoint.into());
        self
    }

    pub fn endpoint(&self, channel: Channel) -> Option<&str> {
        self.endpoints.get(&channel).map(String::as_str)
    }

    /// Publish `set` to `channel`, folding every error into
    /// [`PublishOutcome::Failed`] tagged `publish_error`.
    pub async fn publish(
        &self,
        channel: Channel,
        set: &ArtifactSet,
        credential: ChannelCredential,
        idempotent: bool,
    ) -> PublishOutcome {
        match self.try_publish(channel, set, credential, idempotent).await {
            Ok(outcome) => outcome,
            Err(e) => e.into_outcome(channel),
        }
    }

    /// Publish `set` to `channel`.
    ///
    /// Every artifact is uploaded. If all of them were already present the
    /// outcome is `SkippedExisting`; otherwise `Succeeded`. Without
    /// `idempotent`, an already-present file is `Failed`.
    pub async fn try_publish(
        &self,
        channel: Channel,
        set: &ArtifactSet,
        credential: ChannelCredential,
        idempotent: bool,
    ) -> Result<PublishOutcome> {
        if credential.channel() != channel {
            return Err(PublishError::CredentialScope {
                expected: channel,
                actual: credential.channel(),
            });
        }
        if credential.is_expired_at(Utc::now()) {
            return Err(PublishError::CredentialExpired { channel });
        }
        let endpoint = self
            .endpoint(channel)
            .ok_or(PublishError::NoEndpoint(channel))?;
        if set.is_empty() {
            return Err(PublishError::InvalidArtifactSet(
                "no artifacts to publish".to_string(),
            ));
        }

        let mut created = 0usize;
        let mut existing = 0usize;
        for artifact in set.artifacts() {
            match self
                .registry
                .upload(endpoint, set, artifact, &credential)
                .await?
            {
                UploadResponse::Created => {
                    debug!(channel = %channel, file = %artifact.file_name, "created");
                    created += 1;
                }
                UploadResponse::AlreadyExists if idempotent => {
                    debug!(channel = %channel, file = %artifact.file_name, "already present");
                    existing += 1;
                }
                UploadResponse::AlreadyExists => {
                    return Ok(PublishOutcome::Failed(format!(
                        "{} is already present on {channel}",
                        artifact.file_name
                    )));
                }
            }
        }

        info!(
            channel = %channel,
            version = %set.version(),
            created = created,
            existing = existing,
            "publish complete"
        );
        if created == 0 {
            Ok(PublishOutcome::SkippedExisting)
        } else {
            Ok(PublishOutcome::Succeeded)
        }
    }
}
