//! Built artifacts and their on-disk layout.
//!
//! An [`ArtifactSet`] lives in a directory named after the version that
//! produced it. Besides the distributable files the directory holds two
//! bookkeeping files written by the builder:
//!
//! - `SHA256SUMS`: one `<hex digest>  <file name>` line per artifact
//! - `descriptor.json`: the [`PackageDescriptor`] embedded in the artifacts

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::error::Result;
use crate::domain::version::VersionString;

/// Name of the checksum file written next to the artifacts.
pub const CHECKSUM_FILE: &str = "SHA256SUMS";

/// Name of the package descriptor written next to the artifacts.
pub const DESCRIPTOR_FILE: &str = "descriptor.json";

/// One distributable file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub path: PathBuf,
    pub size: u64,
    /// Lowercase SHA-256 hex digest of the file contents at load time.
    pub sha256: String,
}

/// Package metadata embedded in the artifacts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageDescriptor {
    pub name: String,
    pub version: String,
    pub summary: String,
    pub long_description: String,
    pub long_description_content_type: String,
}

/// The built distributable files of one run, keyed by version.
///
/// Immutable once produced; the verifier and publishers only read it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactSet {
    version: VersionString,
    dir: PathBuf,
    artifacts: Vec<Artifact>,
    descriptor: Option<PackageDescriptor>,
    checksums: Option<ChecksumManifest>,
}

/// Parsed contents of `SHA256SUMS`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChecksumManifest {
    /// Digest per file name.
    pub entries: BTreeMap<String, String>,
    /// Lines that could not be parsed, kept verbatim.
    pub malformed: Vec<String>,
}

impl ArtifactSet {
    /// Load the artifact set stored in `dir` for `version`.
    ///
    /// Every regular file other than the bookkeeping files becomes an
    /// [`Artifact`], hashed as it is read. Missing bookkeeping files are not
    /// an error here; the verifier reports them.
    pub fn load(dir: impl AsRef<Path>, version: VersionString) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let mut artifacts = Vec::new();

        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().to_string();
            if file_name == CHECKSUM_FILE || file_name == DESCRIPTOR_FILE {
                continue;
            }
            let path = entry.path();
            let size = entry.metadata()?.len();
            let sha256 = sha256_file(&path)?;
            artifacts.push(Artifact {
                file_name,
                path,
                size,
                sha256,
            });
        }
        artifacts.sort_by(|a, b| a.file_name.cmp(&b.file_name));

        let checksum_path = dir.join(CHECKSUM_FILE);
        let checksums = if checksum_path.is_file() {
            Some(parse_checksums(&fs::read_to_string(&checksum_path)?))
        } else {
            None
        };

        let descriptor_path = dir.join(DESCRIPTOR_FILE);
        let descriptor = if descriptor_path.is_file() {
            Some(serde_json::from_slice(&fs::read(&descriptor_path)?)?)
        } else {
            None
        };

        Ok(Self {
            version,
            dir,
            artifacts,
            descriptor,
            checksums,
        })
    }

    pub fn version(&self) -> &VersionString {
        &self.version
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn descriptor(&self) -> Option<&PackageDescriptor> {
        self.descriptor.as_ref()
    }

    /// Checksums recorded in `SHA256SUMS`.
    pub fn recorded_checksums(&self) -> Option<&ChecksumManifest> {
        self.checksums.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.artifacts.iter().map(|a| a.size).sum()
    }
}

/// Write `SHA256SUMS` for the given artifacts into `dir`.
pub fn write_checksum_file(dir: &Path, artifacts: &[Artifact]) -> Result<PathBuf> {
    let mut content = String::new();
    for artifact in artifacts {
        content.push_str(&artifact.sha256);
        content.push_str("  ");
        content.push_str(&artifact.file_name);
        content.push('\n');
    }
    let path = dir.join(CHECKSUM_FILE);
    fs::write(&path, content)?;
    Ok(path)
}

/// Write `descriptor.json` into `dir`.
pub fn write_descriptor_file(dir: &Path, descriptor: &PackageDescriptor) -> Result<PathBuf> {
    let path = dir.join(DESCRIPTOR_FILE);
    fs::write(&path, serde_json::to_string_pretty(descriptor)?)?;
    Ok(path)
}

/// Compute the lowercase SHA-256 hex digest of a file.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

fn parse_checksums(content: &str) -> ChecksumManifest {
    let mut manifest = ChecksumManifest::default();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.split_once(char::is_whitespace) {
            Some((digest, name)) if !name.trim().is_empty() => {
                // `sha256sum` marks binary mode with a leading `*` on the name.
                let name = name.trim().trim_start_matches('*');
                manifest
                    .entries
                    .insert(name.to_string(), digest.to_ascii_lowercase());
            }
            _ => manifest.malformed.push(line.to_string()),
        }
    }
    manifest
}
