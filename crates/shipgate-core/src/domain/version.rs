//! Version identifiers and the packaging version grammar.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::domain::error::{Result, ShipgateError};

/// PEP 440 public version, with the optional leading `v` the grammar
/// tolerates. Local segments (`+...`) are deliberately not accepted.
static PUBLIC_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)^
        v?
        (?:[0-9]+!)?                                  # epoch
        [0-9]+(?:\.[0-9]+)*                           # release segment
        (?:[-_.]?(?:a|b|c|rc|alpha|beta|pre|preview)[-_.]?[0-9]*)?   # pre-release
        (?:-[0-9]+|[-_.]?(?:post|rev|r)[-_.]?[0-9]*)? # post-release
        (?:[-_.]?dev[-_.]?[0-9]*)?                    # dev release
        $",
    )
    .expect("public version pattern is valid")
});

/// Same grammar as [`PUBLIC_VERSION`], split into the parts that
/// normalization rewrites.
static VERSION_PARTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)^
        v?
        (?:(?P<epoch>[0-9]+)!)?
        (?P<release>[0-9]+(?:\.[0-9]+)*)
        (?:[-_.]?(?P<pre_l>alpha|beta|preview|pre|rc|a|b|c)[-_.]?(?P<pre_n>[0-9]+)?)?
        (?:-(?P<post_n1>[0-9]+)|[-_.]?(?:post|rev|r)[-_.]?(?P<post_n2>[0-9]+)?(?P<post_l>))?
        (?:[-_.]?(?P<dev_l>dev)[-_.]?(?P<dev_n>[0-9]+)?)?
        $",
    )
    .expect("version parts pattern is valid")
});

/// A validated version identifier. Every build carries exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionString(String);

impl VersionString {
    /// Validate `raw` against the public version grammar.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ShipgateError::VersionResolution(
                "version string is empty".to_string(),
            ));
        }
        if !PUBLIC_VERSION.is_match(trimmed) {
            return Err(ShipgateError::VersionResolution(format!(
                "{trimmed:?} is not a valid public version"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical public form, the spelling packagers put in file names:
    /// `v1.0.0-RC.1` is `1.0.0rc1`, `1.0-1` is `1.0.post1`,
    /// `2.0-dev` is `2.0.dev0`.
    pub fn canonical(&self) -> String {
        let Some(caps) = VERSION_PARTS.captures(&self.0) else {
            return self.0.trim_start_matches(['v', 'V']).to_ascii_lowercase();
        };
        let number = |name: &str| {
            caps.name(name)
                .map(|m| m.as_str().trim_start_matches('0'))
                .filter(|n| !n.is_empty())
                .unwrap_or("0")
                .to_string()
        };

        let mut out = String::new();
        if caps.name("epoch").is_some() && number("epoch") != "0" {
            out.push_str(&number("epoch"));
            out.push('!');
        }
        let release: Vec<String> = caps["release"]
            .split('.')
            .map(|part| match part.trim_start_matches('0') {
                "" => "0".to_string(),
                digits => digits.to_string(),
            })
            .collect();
        out.push_str(&release.join("."));

        if let Some(label) = caps.name("pre_l") {
            let label = match label.as_str().to_ascii_lowercase().as_str() {
                "a" | "alpha" => "a",
                "b" | "beta" => "b",
                _ => "rc",
            };
            out.push_str(label);
            out.push_str(&number("pre_n"));
        }
        if caps.name("post_n1").is_some() {
            out.push_str(".post");
            out.push_str(&number("post_n1"));
        } else if caps.name("post_l").is_some() {
            out.push_str(".post");
            out.push_str(&number("post_n2"));
        }
        if caps.name("dev_l").is_some() {
            out.push_str(".dev");
            out.push_str(&number("dev_n"));
        }
        out
    }

    /// Whether this is a development or pre-release identifier.
    pub fn is_prerelease(&self) -> bool {
        let lower = self.0.to_ascii_lowercase();
        ["dev", "a", "b", "rc", "alpha", "beta", "pre", "c"]
            .iter()
            .any(|marker| {
                lower
                    .trim_start_matches('v')
                    .split(|c: char| c.is_ascii_digit() || c == '.' || c == '-' || c == '_')
                    .any(|part| part == *marker)
            })
    }
}

impl TryFrom<String> for VersionString {
    type Error = ShipgateError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<VersionString> for String {
    fn from(v: VersionString) -> Self {
        v.0
    }
}

impl std::fmt::Display for VersionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_final_and_prerelease_versions() {
        for v in ["1.2.3", "v1.2.3", "0.9", "2.0.0rc1", "1.2.4.dev3", "1!2.0", "1.0.post2"] {
            assert!(VersionString::parse(v).is_ok(), "{v} should be valid");
        }
    }

    #[test]
    fn test_rejects_local_segment_and_garbage() {
        for v in ["1.2.3+g4f9a", "", "   ", "latest", "1.2.3 extra", "v"] {
            assert!(VersionString::parse(v).is_err(), "{v:?} should be invalid");
        }
    }

    #[test]
    fn test_prerelease_detection() {
        assert!(VersionString::parse("1.2.4.dev3").unwrap().is_prerelease());
        assert!(VersionString::parse("2.0.0rc1").unwrap().is_prerelease());
        assert!(!VersionString::parse("2.0.0").unwrap().is_prerelease());
    }

    #[test]
    fn test_canonical_form() {
        let cases = [
            ("v1.0.0-rc.1", "1.0.0rc1"),
            ("1.0.0RC1", "1.0.0rc1"),
            ("1.0.0c1", "1.0.0rc1"),
            ("1.0.0-preview2", "1.0.0rc2"),
            ("1.0.0-pre", "1.0.0rc0"),
            ("2.0alpha1", "2.0a1"),
            ("2.0.Beta.3", "2.0b3"),
            ("1.0.0-1", "1.0.0.post1"),
            ("1.0-rev2", "1.0.post2"),
            ("1.0r", "1.0.post0"),
            ("1.0.post2", "1.0.post2"),
            ("1.2.4-dev3", "1.2.4.dev3"),
            ("1.2.4dev", "1.2.4.dev0"),
            ("V1.02.0", "1.2.0"),
            ("0!1.0", "1.0"),
            ("1!2.0", "1!2.0"),
            ("1.3.0.dev4", "1.3.0.dev4"),
        ];
        for (raw, canonical) in cases {
            let v = VersionString::parse(raw).unwrap();
            assert_eq!(v.canonical(), canonical, "{raw}");
        }
    }

    #[test]
    fn test_serde_rejects_invalid_version() {
        let ok: VersionString = serde_json::from_str("\"1.0.0\"").unwrap();
        assert_eq!(ok.as_str(), "1.0.0");
        assert!(serde_json::from_str::<VersionString>("\"nope\"").is_err());
    }
}
