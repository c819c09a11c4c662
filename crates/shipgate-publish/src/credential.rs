//! Per-channel credentials.
//!
//! A [`ChannelCredential`] is a capability scoped to exactly one channel. It
//! is not `Clone`: it is requested right before a publish, moved into it, and
//! dropped when the publish returns. Staging and production credentials are
//! requested separately and never shared.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{PublishError, Result};
use shipgate_core::Channel;

/// Username registries expect for token authentication.
pub const TOKEN_USERNAME: &str = "__token__";

/// Lifetime assumed for minted tokens that do not state their expiry.
const DEFAULT_MINTED_LIFETIME_MINUTES: i64 = 15;

/// Upload capability for one channel.
pub struct ChannelCredential {
    channel: Channel,
    username: String,
    secret: String,
    expires_at: Option<DateTime<Utc>>,
}

impl ChannelCredential {
    pub fn new(channel: Channel, secret: impl Into<String>) -> Self {
        Self {
            channel,
            username: TOKEN_USERNAME.to_string(),
            secret: secret.into(),
            expires_at: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|t| t <= now)
    }

    /// The raw secret. Only registry implementations should call this.
    pub fn expose_secret(&self) -> &str {
        &self.secret
    }
}

impl std::fmt::Debug for ChannelCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelCredential")
            .field("channel", &self.channel)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Issues a fresh credential for one channel on every call.
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    async fn issue(&self, channel: Channel) -> Result<ChannelCredential>;
}

/// Reads one long-lived token per channel from the environment.
#[derive(Debug, Clone)]
pub struct EnvCredentialIssuer {
    vars: BTreeMap<Channel, String>,
    usernames: BTreeMap<Channel, String>,
}

impl EnvCredentialIssuer {
    pub fn new(staging_var: impl Into<String>, production_var: impl Into<String>) -> Self {
        Self {
            vars: BTreeMap::from([
                (Channel::Staging, staging_var.into()),
                (Channel::Production, production_var.into()),
            ]),
            usernames: BTreeMap::new(),
        }
    }

    pub fn with_username(mut self, channel: Channel, username: impl Into<String>) -> Self {
        self.usernames.insert(channel, username.into());
        self
    }

    fn unavailable(channel: Channel, reason: String) -> PublishError {
        PublishError::CredentialUnavailable { channel, reason }
    }
}

#[async_trait]
impl CredentialIssuer for EnvCredentialIssuer {
    async fn issue(&self, channel: Channel) -> Result<ChannelCredential> {
        let var = self
            .vars
            .get(&channel)
            .ok_or_else(|| Self::unavailable(channel, "no variable configured".to_string()))?;
        let secret = std::env::var(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Self::unavailable(channel, format!("{var} is not set")))?;

        debug!(channel = %channel, var = %var, "issued credential from environment");
        let mut credential = ChannelCredential::new(channel, secret.trim());
        if let Some(username) = self.usernames.get(&channel) {
            credential = credential.with_username(username);
        }
        Ok(credential)
    }
}

/// Exchanges the runtime's workload identity token for a short-lived
/// upload token at each channel's mint endpoint.
pub struct OidcCredentialIssuer {
    client: reqwest::Client,
    request_url: String,
    request_token: String,
    audience: Option<String>,
    mint_urls: BTreeMap<Channel, String>,
}

#[derive(Debug, Deserialize)]
struct IdentityTokenResponse {
    value: String,
}

#[derive(Debug, Deserialize)]
struct MintResponse {
    token: String,
    #[serde(default)]
    expires: Option<DateTime<Utc>>,
}

impl OidcCredentialIssuer {
    pub fn new(
        request_url: impl Into<String>,
        request_token: impl Into<String>,
        mint_urls: BTreeMap<Channel, String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("shipgate/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            request_url: request_url.into(),
            request_token: request_token.into(),
            audience: None,
            mint_urls,
        })
    }

    /// Build from the runtime's identity-request variables.
    pub fn from_env(
        request_url_var: &str,
        request_token_var: &str,
        mint_urls: BTreeMap<Channel, String>,
    ) -> Result<Self> {
        let read = |var: &str| {
            std::env::var(var)
                .map_err(|_| PublishError::IdentityUnavailable(format!("{var} is not set")))
        };
        Self::new(read(request_url_var)?, read(request_token_var)?, mint_urls)
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    async fn identity_token(&self) -> Result<String> {
        let mut request = self
            .client
            .get(&self.request_url)
            .bearer_auth(&self.request_token);
        if let Some(audience) = &self.audience {
            request = request.query(&[("audience", audience)]);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(PublishError::IdentityUnavailable(format!(
                "identity token request returned {}",
                response.status()
            )));
        }
        Ok(response.json::<IdentityTokenResponse>().await?.value)
    }
}

#[async_trait]
impl CredentialIssuer for OidcCredentialIssuer {
    async fn issue(&self, channel: Channel) -> Result<ChannelCredential> {
        let mint_url = self
            .mint_urls
            .get(&channel)
            .ok_or(PublishError::NoEndpoint(channel))?;

        let identity = self.identity_token().await?;
        let response = self
            .client
            .post(mint_url)
            .json(&serde_json::json!({ "token": identity }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::CredentialUnavailable {
                channel,
                reason: format!("token mint returned {status}: {}", body.trim()),
            });
        }

        let minted: MintResponse = response.json().await?;
        let expires_at = minted
            .expires
            .unwrap_or_else(|| Utc::now() + Duration::minutes(DEFAULT_MINTED_LIFETIME_MINUTES));
        debug!(channel = %channel, expires_at = %expires_at, "minted short-lived credential");
        Ok(ChannelCredential::new(channel, minted.token).with_expiry(expires_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_debug_redacts_secret() {
        let credential = ChannelCredential::new(Channel::Staging, "pypi-s3cr3t");
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("s3cr3t"));
        assert!(rendered.contains("<redacted>"));
        assert!(rendered.contains("Staging"));
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let credential =
            ChannelCredential::new(Channel::Production, "x").with_expiry(now - Duration::seconds(1));
        assert!(credential.is_expired_at(now));
        assert!(!ChannelCredential::new(Channel::Production, "x").is_expired_at(now));
    }

    #[tokio::test]
    async fn test_env_issuer_reads_per_channel_variable() {
        std::env::set_var("SHIPGATE_TEST_STAGING_TOKEN_A", " staging-token \n");
        let issuer = EnvCredentialIssuer::new(
            "SHIPGATE_TEST_STAGING_TOKEN_A",
            "SHIPGATE_TEST_PRODUCTION_TOKEN_A",
        )
        .with_username(Channel::Staging, "ci-bot");

        let credential = issuer.issue(Channel::Staging).await.unwrap();
        assert_eq!(credential.channel(), Channel::Staging);
        assert_eq!(credential.expose_secret(), "staging-token");
        assert_eq!(credential.username(), "ci-bot");

        let err = issuer.issue(Channel::Production).await.unwrap_err();
        assert!(matches!(
            err,
            PublishError::CredentialUnavailable {
                channel: Channel::Production,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_oidc_issuer_exchanges_identity_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/identity"))
            .and(header("authorization", "Bearer request-token"))
            .and(query_param("audience", "pypi"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": "jwt-abc"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/staging/mint"))
            .and(body_json(serde_json::json!({ "token": "jwt-abc" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "token": "minted-staging"
            })))
            .mount(&server)
            .await;

        let mint_urls = BTreeMap::from([(
            Channel::Staging,
            format!("{}/staging/mint", server.uri()),
        )]);
        let issuer = OidcCredentialIssuer::new(
            format!("{}/identity", server.uri()),
            "request-token",
            mint_urls,
        )
        .unwrap()
        .with_audience("pypi");

        let credential = issuer.issue(Channel::Staging).await.unwrap();
        assert_eq!(credential.expose_secret(), "minted-staging");
        assert!(credential.expires_at().is_some());
        assert!(!credential.is_expired_at(Utc::now()));

        let err = issuer.issue(Channel::Production).await.unwrap_err();
        assert!(matches!(err, PublishError::NoEndpoint(Channel::Production)));
    }

    #[tokio::test]
    async fn test_oidc_mint_refusal_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/identity"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": "jwt"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/mint"))
            .respond_with(ResponseTemplate::new(422).set_body_string("invalid-publisher"))
            .mount(&server)
            .await;

        let issuer = OidcCredentialIssuer::new(
            format!("{}/identity", server.uri()),
            "t",
            BTreeMap::from([(Channel::Production, format!("{}/mint", server.uri()))]),
        )
        .unwrap();
        let err = issuer.issue(Channel::Production).await.unwrap_err();
        assert!(err.to_string().contains("invalid-publisher"));
    }
}
