//! Artifact building.
//!
//! The actual compiler/packager is an external command. The controller
//! hands it the resolved version through an environment override so the
//! metadata embedded in the artifacts matches the controller's decision
//! rather than whatever the packager would auto-detect.

use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::domain::artifact::{
    write_checksum_file, write_descriptor_file, ArtifactSet, PackageDescriptor,
};
use crate::domain::error::{Result, ShipgateError};
use crate::domain::version::VersionString;

/// Environment variable exposing the per-version output directory to the
/// build command.
pub const OUTPUT_DIR_ENV: &str = "SHIPGATE_OUTPUT_DIR";

/// Produces a versioned artifact set.
#[async_trait]
pub trait ArtifactBuilder: Send + Sync {
    /// Build artifacts stamped with `version`. Any failure is fatal and no
    /// partial set is returned.
    async fn build(&self, version: &VersionString) -> Result<ArtifactSet>;
}

/// Package metadata used to write the artifact descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMetadata {
    pub name: String,
    pub summary: String,
    /// Long description source, relative to the working directory.
    pub readme: Option<PathBuf>,
    pub readme_content_type: String,
}

/// Builds by running an external command.
///
/// `{out_dir}` and `{version}` in the command arguments are replaced before
/// the command runs. Output lands in `<output_root>/<version>/`, which is
/// recreated for every build.
#[derive(Debug, Clone)]
pub struct CommandArtifactBuilder {
    command: Vec<String>,
    workdir: PathBuf,
    output_root: PathBuf,
    version_env: String,
    package: PackageMetadata,
}

impl CommandArtifactBuilder {
    pub fn new(
        command: Vec<String>,
        workdir: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
        version_env: impl Into<String>,
        package: PackageMetadata,
    ) -> Self {
        let workdir = workdir.into();
        let output_root = output_root.into();
        let output_root = if output_root.is_absolute() {
            output_root
        } else {
            workdir.join(output_root)
        };
        Self {
            command,
            workdir,
            output_root,
            version_env: version_env.into(),
            package,
        }
    }

    /// Directory the artifacts for `version` are written to.
    pub fn output_dir(&self, version: &VersionString) -> PathBuf {
        self.output_root.join(version.as_str())
    }

    fn render_args(&self, out_dir: &Path, version: &VersionString) -> Vec<String> {
        let out_dir = out_dir.to_string_lossy();
        self.command
            .iter()
            .map(|arg| {
                arg.replace("{out_dir}", &out_dir)
                    .replace("{version}", version.as_str())
            })
            .collect()
    }

    fn descriptor(&self, version: &VersionString) -> Result<PackageDescriptor> {
        let long_description = match &self.package.readme {
            Some(readme) => fs::read_to_string(self.workdir.join(readme)).map_err(|e| {
                ShipgateError::Build(format!("failed to read {}: {e}", readme.display()))
            })?,
            None => String::new(),
        };
        Ok(PackageDescriptor {
            name: self.package.name.clone(),
            version: version.to_string(),
            summary: self.package.summary.clone(),
            long_description,
            long_description_content_type: self.package.readme_content_type.clone(),
        })
    }
}

#[async_trait]
impl ArtifactBuilder for CommandArtifactBuilder {
    async fn build(&self, version: &VersionString) -> Result<ArtifactSet> {
        let out_dir = self.output_dir(version);
        if out_dir.exists() {
            fs::remove_dir_all(&out_dir)?;
        }
        fs::create_dir_all(&out_dir)?;

        let args = self.render_args(&out_dir, version);
        let (exe, rest) = args
            .split_first()
            .ok_or_else(|| ShipgateError::Build("build command is empty".to_string()))?;

        info!(version = %version, out_dir = %out_dir.display(), "Running build");
        let output = Command::new(exe)
            .args(rest)
            .current_dir(&self.workdir)
            .env(&self.version_env, version.as_str())
            .env(OUTPUT_DIR_ENV, &out_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ShipgateError::Build(format!("failed to start {exe:?}: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ShipgateError::Build(format!(
                "{exe:?} exited with {}: {}",
                output.status,
                tail(&stderr, 20)
            )));
        }
        debug!(stdout = %tail(&String::from_utf8_lossy(&output.stdout), 5), "build output");

        let produced = ArtifactSet::load(&out_dir, version.clone())?;
        if produced.is_empty() {
            return Err(ShipgateError::Build(format!(
                "build produced no artifacts in {}",
                out_dir.display()
            )));
        }

        write_descriptor_file(&out_dir, &self.descriptor(version)?)?;
        write_checksum_file(&out_dir, produced.artifacts())?;

        ArtifactSet::load(&out_dir, version.clone())
    }
}

/// Last `n` lines of `text`, for compact error messages.
fn tail(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
