//! Version resolution.
//!
//! Tag runs use the tag verbatim. Everything else asks a source-control
//! based derivation tool for a candidate and normalizes it:
//!
//! 1. keep only the last non-empty line (derivation tools can be chatty)
//! 2. drop the local-version segment, i.e. everything from the first `+`
//!
//! Registries reject local segments on upload, so a candidate such as
//! `1.2.4.dev3+g4f9a.d20240101` becomes `1.2.4.dev3`.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::domain::context::RunContext;
use crate::domain::error::{Result, ShipgateError};
use crate::domain::version::VersionString;

/// Separator that introduces a local-version segment.
pub const LOCAL_VERSION_SEPARATOR: char = '+';

/// Something that can derive a version candidate from source-control state.
#[async_trait]
pub trait VersionSource: Send + Sync {
    /// Return the raw (possibly multi-line) derivation output.
    async fn derive(&self) -> Result<String>;
}

#[async_trait]
impl<S> VersionSource for std::sync::Arc<S>
where
    S: VersionSource + ?Sized,
{
    async fn derive(&self) -> Result<String> {
        (**self).derive().await
    }
}

/// Runs an external derivation command and captures its stdout.
#[derive(Debug, Clone)]
pub struct CommandVersionSource {
    command: Vec<String>,
    workdir: PathBuf,
}

impl CommandVersionSource {
    pub fn new(command: Vec<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            command,
            workdir: workdir.into(),
        }
    }
}

#[async_trait]
impl VersionSource for CommandVersionSource {
    async fn derive(&self) -> Result<String> {
        let (exe, args) = self.command.split_first().ok_or_else(|| {
            ShipgateError::VersionResolution("derivation command is empty".to_string())
        })?;

        // A missing tool is treated the same as useless output.
        let output = Command::new(exe)
            .args(args)
            .current_dir(&self.workdir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                ShipgateError::VersionResolution(format!(
                    "derivation tool {exe:?} unavailable: {e}"
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ShipgateError::VersionResolution(format!(
                "derivation tool {exe:?} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Reduce raw derivation output to a single public version token.
pub fn normalize_candidate(raw: &str) -> Result<VersionString> {
    let last_line = raw
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .ok_or_else(|| {
            ShipgateError::VersionResolution("derivation produced no output".to_string())
        })?;

    let public = match last_line.split_once(LOCAL_VERSION_SEPARATOR) {
        Some((public, _local)) => public,
        None => last_line,
    };

    VersionString::parse(public)
}

/// Computes the version for a run.
pub struct VersionResolver<S> {
    source: S,
}

impl<S> VersionResolver<S>
where
    S: VersionSource,
{
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Resolve the version for `context`.
    ///
    /// Never falls back to a placeholder: an unversioned artifact must not
    /// be produced.
    pub async fn resolve(&self, context: &RunContext) -> Result<VersionString> {
        if let Some(tag) = context.tag_name() {
            debug!(tag = %tag, "using tag as version");
            return VersionString::parse(tag).map_err(|e| {
                ShipgateError::VersionResolution(format!("tag {tag:?} is not a valid version: {e}"))
            });
        }

        let raw = self.source.derive().await?;
        debug!(raw = %raw.trim(), "derived version candidate");
        normalize_candidate(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::EventKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSource {
        output: String,
        calls: AtomicUsize,
    }

    impl FixedSource {
        fn new(output: &str) -> Self {
            Self {
                output: output.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl VersionSource for FixedSource {
        async fn derive(&self) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.output.clone())
        }
    }

    fn branch_ctx() -> RunContext {
        RunContext::new(EventKind::Push, "refs/heads/main", "acme/widget", false)
    }

    #[test]
    fn test_local_segment_is_stripped() {
        let v = normalize_candidate("1.2.3+g4f9a.d20240101").unwrap();
        assert_eq!(v.as_str(), "1.2.3");
    }

    #[test]
    fn test_only_last_line_is_used() {
        let raw = "WARNING: shallow clone detected\nguessing next version\n1.2.4.dev3+g4f9a\n";
        assert_eq!(normalize_candidate(raw).unwrap().as_str(), "1.2.4.dev3");
    }

    #[test]
    fn test_plus_on_earlier_line_does_not_leak() {
        let raw = "note: a+b\n0.5.0.dev1\n";
        assert_eq!(normalize_candidate(raw).unwrap().as_str(), "0.5.0.dev1");
    }

    #[test]
    fn test_empty_or_malformed_output_fails() {
        for raw in ["", "\n\n  \n", "+g4f9a", "not a version"] {
            let err = normalize_candidate(raw).unwrap_err();
            assert!(matches!(err, ShipgateError::VersionResolution(_)), "{raw:?}");
        }
    }

    #[tokio::test]
    async fn test_tag_ref_uses_tag_without_derivation() {
        let resolver = VersionResolver::new(FixedSource::new("9.9.9"));
        let ctx = RunContext::new(EventKind::ReleasePublished, "refs/tags/v1.4.0", "acme/widget", true);
        let v = resolver.resolve(&ctx).await.unwrap();
        assert_eq!(v.as_str(), "v1.4.0");
        assert_eq!(resolver.source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_tag_fails() {
        let resolver = VersionResolver::new(FixedSource::new("1.0.0"));
        let ctx = RunContext::new(EventKind::ReleasePublished, "nightly", "acme/widget", true);
        assert!(resolver.resolve(&ctx).await.is_err());
    }

    #[tokio::test]
    async fn test_resolution_is_deterministic() {
        let resolver = VersionResolver::new(FixedSource::new("2.1.0.dev4+gabc123\n"));
        let first = resolver.resolve(&branch_ctx()).await.unwrap();
        let second = resolver.resolve(&branch_ctx()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_str(), "2.1.0.dev4");
    }

    #[tokio::test]
    async fn test_command_source_captures_stdout() {
        let source = CommandVersionSource::new(
            vec!["echo".to_string(), "3.0.0.dev1+g1".to_string()],
            ".",
        );
        let resolver = VersionResolver::new(source);
        let v = resolver.resolve(&branch_ctx()).await.unwrap();
        assert_eq!(v.as_str(), "3.0.0.dev1");
    }

    #[tokio::test]
    async fn test_missing_tool_is_resolution_error() {
        let source = CommandVersionSource::new(
            vec!["shipgate-no-such-derivation-tool".to_string()],
            ".",
        );
        let err = source.derive().await.unwrap_err();
        assert!(matches!(err, ShipgateError::VersionResolution(_)));
        assert!(err.to_string().contains("unavailable"));
    }

    #[tokio::test]
    async fn test_failing_tool_is_resolution_error() {
        let source = CommandVersionSource::new(vec!["false".to_string()], ".");
        assert!(source.derive().await.is_err());
    }
}
