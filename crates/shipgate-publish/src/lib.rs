//! Shipgate Publish - channel publishing
//!
//! Uploads verified artifact sets to the staging and production channels.
//! Each publish consumes a credential scoped to its channel; the two
//! channels never share one.

pub mod credential;
pub mod error;
pub mod fakes;
pub mod publisher;
pub mod registry;

pub use credential::{
    ChannelCredential, CredentialIssuer, EnvCredentialIssuer, OidcCredentialIssuer,
    TOKEN_USERNAME,
};
pub use error::{PublishError, Result};
pub use publisher::Publisher;
pub use registry::{ChannelRegistry, HttpChannelRegistry, UploadResponse};

use shipgate_core::{Channel, CredentialMode, ShipgateConfig};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Publisher over HTTP with the configured channel endpoints.
pub fn publisher_from_config(config: &ShipgateConfig) -> Result<Publisher> {
    let registry = Arc::new(HttpChannelRegistry::new()?);
    Ok(Channel::ALL
        .into_iter()
        .fold(Publisher::new(registry), |publisher, channel| {
            publisher.with_endpoint(channel, config.channels.get(channel).url.clone())
        }))
}

/// Credential issuer for the configured credential mode.
pub fn issuer_from_config(config: &ShipgateConfig) -> Result<Arc<dyn CredentialIssuer>> {
    let creds = &config.credentials;
    match creds.mode {
        CredentialMode::Env => {
            let issuer = Channel::ALL.into_iter().fold(
                EnvCredentialIssuer::new(&creds.staging_token_env, &creds.production_token_env),
                |issuer, channel| {
                    issuer.with_username(channel, config.channels.get(channel).username.clone())
                },
            );
            Ok(Arc::new(issuer))
        }
        CredentialMode::Oidc => {
            let mint_urls: BTreeMap<Channel, String> = Channel::ALL
                .into_iter()
                .filter_map(|c| config.channels.get(c).mint_url.clone().map(|u| (c, u)))
                .collect();
            let mut issuer = OidcCredentialIssuer::from_env(
                &creds.oidc_request_url_env,
                &creds.oidc_request_token_env,
                mint_urls,
            )?;
            if let Some(audience) = &creds.oidc_audience {
                issuer = issuer.with_audience(audience);
            }
            Ok(Arc::new(issuer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[repository]
canonical = "acme/widget"

[package]
name = "widget"

[channels.staging]
url = "https://test.example/legacy/"

[channels.production]
url = "https://prod.example/legacy/"
"#;

    #[test]
    fn test_publisher_endpoints_from_config() {
        let config = ShipgateConfig::from_toml_str(CONFIG, ".").unwrap();
        let publisher = publisher_from_config(&config).unwrap();
        assert_eq!(
            publisher.endpoint(Channel::Staging),
            Some("https://test.example/legacy/")
        );
        assert_eq!(
            publisher.endpoint(Channel::Production),
            Some("https://prod.example/legacy/")
        );
    }

    #[test]
    fn test_oidc_without_runtime_identity_fails() {
        let text = CONFIG
            .replace(
                "url = \"https://test.example/legacy/\"",
                "url = \"https://test.example/legacy/\"\nmint_url = \"https://test.example/mint\"",
            )
            .replace(
                "url = \"https://prod.example/legacy/\"",
                "url = \"https://prod.example/legacy/\"\nmint_url = \"https://prod.example/mint\"",
            )
            + "\n[credentials]\nmode = \"oidc\"\noidc_request_url_env = \"SHIPGATE_TEST_UNSET_OIDC_URL\"\n";
        let config = ShipgateConfig::from_toml_str(&text, ".").unwrap();
        let err = issuer_from_config(&config).err().unwrap();
        assert!(matches!(err, PublishError::IdentityUnavailable(_)));
    }
}
