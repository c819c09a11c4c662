//! Channel registries.
//!
//! A registry accepts one file at a time. An upload either creates the file
//! or reports that the same file is already there; everything else is an
//! error.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::credential::ChannelCredential;
use crate::error::{PublishError, Result};
use shipgate_core::{Artifact, ArtifactSet};

/// Successful upload responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadResponse {
    Created,
    AlreadyExists,
}

#[async_trait]
pub trait ChannelRegistry: Send + Sync {
    /// Upload one artifact of `set` to `endpoint`.
    async fn upload(
        &self,
        endpoint: &str,
        set: &ArtifactSet,
        artifact: &Artifact,
        credential: &ChannelCredential,
    ) -> Result<UploadResponse>;
}

/// Uploads over the legacy multipart upload API used by Python package
/// indexes.
pub struct HttpChannelRegistry {
    client: reqwest::Client,
}

impl HttpChannelRegistry {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("shipgate/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    fn form(set: &ArtifactSet, artifact: &Artifact, content: Vec<u8>) -> Result<Form> {
        let descriptor = set.descriptor().ok_or_else(|| {
            PublishError::InvalidArtifactSet("package descriptor is missing".to_string())
        })?;
        let part = Part::bytes(content)
            .file_name(artifact.file_name.clone())
            .mime_str("application/octet-stream")?;

        Ok(Form::new()
            .text(":action", "file_upload")
            .text("protocol_version", "1")
            .text("metadata_version", "2.1")
            .text("name", descriptor.name.clone())
            .text("version", set.version().to_string())
            .text("summary", descriptor.summary.clone())
            .text("description", descriptor.long_description.clone())
            .text(
                "description_content_type",
                descriptor.long_description_content_type.clone(),
            )
            .text("filetype", filetype(&artifact.file_name))
            .text("pyversion", pyversion(&artifact.file_name))
            .text("sha256_digest", artifact.sha256.clone())
            .part("content", part))
    }
}

#[async_trait]
impl ChannelRegistry for HttpChannelRegistry {
    async fn upload(
        &self,
        endpoint: &str,
        set: &ArtifactSet,
        artifact: &Artifact,
        credential: &ChannelCredential,
    ) -> Result<UploadResponse> {
        let channel = credential.channel();
        let content = tokio::fs::read(&artifact.path).await?;
        let form = Self::form(set, artifact, content)?;

        debug!(channel = %channel, file = %artifact.file_name, "uploading");
        let response = self
            .client
            .post(endpoint)
            .basic_auth(credential.username(), Some(credential.expose_secret()))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(UploadResponse::Created);
        }
        let body = response.text().await.unwrap_or_default();
        if is_already_present(status, &body) {
            return Ok(UploadResponse::AlreadyExists);
        }
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(PublishError::CredentialRejected {
                    channel,
                    status: status.as_u16(),
                })
            }
            _ => Err(PublishError::UploadRejected {
                channel,
                file: artifact.file_name.clone(),
                status: status.as_u16(),
                body: body.trim().chars().take(500).collect(),
            }),
        }
    }
}

/// Non-2xx responses that still mean the file is on the channel.
fn is_already_present(status: StatusCode, body: &str) -> bool {
    match status {
        StatusCode::CONFLICT => true,
        StatusCode::BAD_REQUEST => body.to_ascii_lowercase().contains("already exists"),
        _ => false,
    }
}

fn filetype(file_name: &str) -> &'static str {
    if file_name.ends_with(".whl") {
        "bdist_wheel"
    } else {
        "sdist"
    }
}

/// Python tag of a wheel (`name-ver-pytag-abi-platform.whl`), or `source`.
fn pyversion(file_name: &str) -> String {
    match file_name.strip_suffix(".whl") {
        Some(stem) => {
            let parts: Vec<&str> = stem.split('-').collect();
            if parts.len() >= 5 {
                parts[parts.len() - 3].to_string()
            } else {
                "any".to_string()
            }
        }
        None => "source".to_string(),
    }
}
