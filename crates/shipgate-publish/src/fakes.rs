//! In-memory fakes for the registry and credential traits (testing only)
//!
//! `MemoryChannelRegistry` keeps uploaded files per endpoint and can be told
//! to fail an endpoint or slow every upload down. `StaticCredentialIssuer`
//! hands out fixed tokens and records each request.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::credential::{ChannelCredential, CredentialIssuer};
use crate::error::{PublishError, Result};
use crate::registry::{ChannelRegistry, UploadResponse};
use shipgate_core::{Artifact, ArtifactSet, Channel};

/// One recorded upload attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    pub endpoint: String,
    pub file_name: String,
    pub credential_channel: Channel,
}

/// In-memory registry keyed by `(endpoint, file name)`.
#[derive(Debug, Default)]
pub struct MemoryChannelRegistry {
    files: Mutex<BTreeSet<(String, String)>>,
    failing: Mutex<BTreeMap<String, u16>>,
    attempts: Mutex<Vec<UploadRecord>>,
    delay: Option<Duration>,
}

impl MemoryChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every upload.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Reject every upload to `endpoint` with `status`.
    pub fn fail_endpoint(&self, endpoint: &str, status: u16) {
        self.failing
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), status);
    }

    /// Pretend `file_name` was uploaded to `endpoint` earlier.
    pub fn seed(&self, endpoint: &str, file_name: &str) {
        self.files
            .lock()
            .unwrap()
            .insert((endpoint.to_string(), file_name.to_string()));
    }

    pub fn contains(&self, endpoint: &str, file_name: &str) -> bool {
        self.files
            .lock()
            .unwrap()
            .contains(&(endpoint.to_string(), file_name.to_string()))
    }

    pub fn file_count(&self, endpoint: &str) -> usize {
        self.files
            .lock()
            .unwrap()
            .iter()
            .filter(|(e, _)| e == endpoint)
            .count()
    }

    pub fn attempts(&self) -> Vec<UploadRecord> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelRegistry for MemoryChannelRegistry {
    async fn upload(
        &self,
        endpoint: &str,
        _set: &ArtifactSet,
        artifact: &Artifact,
        credential: &ChannelCredential,
    ) -> Result<UploadResponse> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.attempts.lock().unwrap().push(UploadRecord {
            endpoint: endpoint.to_string(),
            file_name: artifact.file_name.clone(),
            credential_channel: credential.channel(),
        });

        if let Some(status) = self.failing.lock().unwrap().get(endpoint).copied() {
            return Err(PublishError::UploadRejected {
                channel: credential.channel(),
                file: artifact.file_name.clone(),
                status,
                body: "injected failure".to_string(),
            });
        }

        let key = (endpoint.to_string(), artifact.file_name.clone());
        let mut files = self.files.lock().unwrap();
        if files.insert(key) {
            Ok(UploadResponse::Created)
        } else {
            Ok(UploadResponse::AlreadyExists)
        }
    }
}

/// Issues fixed per-channel tokens and records every request.
#[derive(Debug, Default)]
pub struct StaticCredentialIssuer {
    tokens: BTreeMap<Channel, String>,
    issued: Mutex<Vec<Channel>>,
}

impl StaticCredentialIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, channel: Channel, token: impl Into<String>) -> Self {
        self.tokens.insert(channel, token.into());
        self
    }

    /// Channels a credential was requested for, in request order.
    pub fn issued(&self) -> Vec<Channel> {
        self.issued.lock().unwrap().clone()
    }
}

#[async_trait]
impl CredentialIssuer for StaticCredentialIssuer {
    async fn issue(&self, channel: Channel) -> Result<ChannelCredential> {
        self.issued.lock().unwrap().push(channel);
        let token = self
            .tokens
            .get(&channel)
            .ok_or_else(|| PublishError::CredentialUnavailable {
                channel,
                reason: "no token configured".to_string(),
            })?;
        Ok(ChannelCredential::new(channel, token.clone()))
    }
}
