//! `shipgate.toml` configuration.
//!
//! ```toml
//! [repository]
//! canonical = "acme/widget"
//!
//! [package]
//! name = "widget"
//! summary = "Widgets for everyone"
//!
//! [channels.staging]
//! url = "https://test.pypi.org/legacy/"
//!
//! [channels.production]
//! url = "https://upload.pypi.org/legacy/"
//! ```
//!
//! Everything else has a default. Relative paths are resolved against the
//! directory holding the configuration file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::builder::{CommandArtifactBuilder, PackageMetadata};
use crate::domain::decision::Channel;
use crate::domain::error::{Result, ShipgateError};
use crate::gate::{GatePolicy, DEFAULT_TRUNK_BRANCH};
use crate::version_resolver::CommandVersionSource;

/// Default configuration file name.
pub const CONFIG_FILE: &str = "shipgate.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ShipgateConfig {
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub version: VersionConfig,
    #[serde(default)]
    pub build: BuildConfig,
    pub package: PackageConfig,
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    /// Directory relative paths resolve against. Set by [`ShipgateConfig::load`].
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    /// `owner/name` of the repository allowed to publish push builds.
    pub canonical: String,
    #[serde(default = "default_trunk_branch")]
    pub trunk_branch: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct VersionConfig {
    /// Derivation command; its last non-empty stdout line is the candidate.
    #[serde(default = "default_version_command")]
    pub command: Vec<String>,
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            command: default_version_command(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Build command. `{out_dir}` and `{version}` are substituted.
    #[serde(default = "default_build_command")]
    pub command: Vec<String>,
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
    /// Variable the resolved version is exported in for the build command.
    #[serde(default = "default_version_env")]
    pub version_env: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            command: default_build_command(),
            output_root: default_output_root(),
            version_env: default_version_env(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PackageConfig {
    pub name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default = "default_readme")]
    pub readme: Option<PathBuf>,
    #[serde(default = "default_readme_content_type")]
    pub readme_content_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ChannelsConfig {
    pub staging: ChannelConfig,
    pub production: ChannelConfig,
}

impl ChannelsConfig {
    pub fn get(&self, channel: Channel) -> &ChannelConfig {
        match channel {
            Channel::Staging => &self.staging,
            Channel::Production => &self.production,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    /// Upload endpoint.
    pub url: String,
    /// Token mint endpoint used by workload-identity credentials.
    #[serde(default)]
    pub mint_url: Option<String>,
    /// Treat an already-present version as success.
    #[serde(default = "default_true")]
    pub idempotent: bool,
    #[serde(default = "default_username")]
    pub username: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CredentialMode {
    /// Static tokens from environment variables.
    #[default]
    Env,
    /// Short-lived tokens minted from the runtime's workload identity.
    Oidc,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub mode: CredentialMode,
    #[serde(default = "default_staging_token_env")]
    pub staging_token_env: String,
    #[serde(default = "default_production_token_env")]
    pub production_token_env: String,
    /// Variable holding the runtime's identity-token request URL.
    #[serde(default = "default_oidc_request_url_env")]
    pub oidc_request_url_env: String,
    /// Variable holding the bearer token for the identity-token request.
    #[serde(default = "default_oidc_request_token_env")]
    pub oidc_request_token_env: String,
    #[serde(default)]
    pub oidc_audience: Option<String>,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            mode: CredentialMode::default(),
            staging_token_env: default_staging_token_env(),
            production_token_env: default_production_token_env(),
            oidc_request_url_env: default_oidc_request_url_env(),
            oidc_request_token_env: default_oidc_request_token_env(),
            oidc_audience: None,
        }
    }
}

impl CredentialsConfig {
    /// Environment variable holding the static token for `channel`.
    pub fn token_env(&self, channel: Channel) -> &str {
        match channel {
            Channel::Staging => &self.staging_token_env,
            Channel::Production => &self.production_token_env,
        }
    }
}

fn default_trunk_branch() -> String {
    DEFAULT_TRUNK_BRANCH.to_string()
}

fn default_version_command() -> Vec<String> {
    ["python", "-m", "setuptools_scm"]
        .map(String::from)
        .to_vec()
}

fn default_build_command() -> Vec<String> {
    ["python", "-m", "build", "--outdir", "{out_dir}"]
        .map(String::from)
        .to_vec()
}

fn default_output_root() -> PathBuf {
    PathBuf::from("dist")
}

fn default_version_env() -> String {
    "SETUPTOOLS_SCM_PRETEND_VERSION".to_string()
}

fn default_readme() -> Option<PathBuf> {
    Some(PathBuf::from("README.md"))
}

fn default_readme_content_type() -> String {
    "text/markdown".to_string()
}

fn default_true() -> bool {
    true
}

fn default_username() -> String {
    "__token__".to_string()
}

fn default_staging_token_env() -> String {
    "SHIPGATE_STAGING_TOKEN".to_string()
}

fn default_production_token_env() -> String {
    "SHIPGATE_PRODUCTION_TOKEN".to_string()
}

fn default_oidc_request_url_env() -> String {
    "ACTIONS_ID_TOKEN_REQUEST_URL".to_string()
}

fn default_oidc_request_token_env() -> String {
    "ACTIONS_ID_TOKEN_REQUEST_TOKEN".to_string()
}

impl ShipgateConfig {
    /// Read, parse, and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            ShipgateError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::from_toml_str(&text, base_dir)
    }

    /// Parse and validate configuration text.
    pub fn from_toml_str(text: &str, base_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut config: ShipgateConfig = toml::from_str(text)
            .map_err(|e| ShipgateError::Configuration(format!("invalid configuration: {e}")))?;
        config.base_dir = base_dir.into();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(ShipgateError::Configuration(msg)) };

        if self.repository.canonical.trim().is_empty() {
            return invalid("repository.canonical must name the canonical repository".into());
        }
        if self.repository.trunk_branch.trim().is_empty() {
            return invalid("repository.trunk_branch is empty".into());
        }
        if self.version.command.is_empty() {
            return invalid("version.command is empty".into());
        }
        if self.build.command.is_empty() {
            return invalid("build.command is empty".into());
        }
        if self.build.version_env.trim().is_empty() {
            return invalid("build.version_env is empty".into());
        }
        if self.package.name.trim().is_empty() {
            return invalid("package.name is empty".into());
        }
        for channel in Channel::ALL {
            let cfg = self.channels.get(channel);
            if cfg.url.trim().is_empty() {
                return invalid(format!("channels.{channel}.url is empty"));
            }
            if self.credentials.mode == CredentialMode::Oidc && cfg.mint_url.is_none() {
                return invalid(format!(
                    "channels.{channel}.mint_url is required for oidc credentials"
                ));
            }
        }
        if self
            .channels
            .staging
            .url
            .trim_end_matches('/')
            .eq_ignore_ascii_case(self.channels.production.url.trim_end_matches('/'))
        {
            return invalid("staging and production must use different URLs".into());
        }
        if self.credentials.staging_token_env == self.credentials.production_token_env {
            return invalid("staging and production must use different token variables".into());
        }
        Ok(())
    }

    pub fn gate_policy(&self) -> GatePolicy {
        GatePolicy::new(&self.repository.canonical).with_trunk_branch(&self.repository.trunk_branch)
    }

    pub fn version_source(&self) -> CommandVersionSource {
        CommandVersionSource::new(self.version.command.clone(), &self.base_dir)
    }

    pub fn artifact_builder(&self) -> CommandArtifactBuilder {
        CommandArtifactBuilder::new(
            self.build.command.clone(),
            &self.base_dir,
            &self.build.output_root,
            &self.build.version_env,
            PackageMetadata {
                name: self.package.name.clone(),
                summary: self.package.summary.clone(),
                readme: self.package.readme.clone(),
                readme_content_type: self.package.readme_content_type.clone(),
            },
        )
    }

    /// Artifact root with a relative path resolved against `base_dir`.
    pub fn output_root(&self) -> PathBuf {
        if self.build.output_root.is_absolute() {
            self.build.output_root.clone()
        } else {
            self.base_dir.join(&self.build.output_root)
        }
    }
}
