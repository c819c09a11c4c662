//! Strict artifact verification.
//!
//! Every finding is an issue and any issue fails the set. Verification runs
//! before any publish, whatever the channel.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

use crate::domain::artifact::{sha256_file, ArtifactSet, PackageDescriptor, CHECKSUM_FILE};
use crate::domain::verification::{CheckKind, VerificationIssue, VerificationResult};
use crate::domain::version::VersionString;

/// Long-description content types the registries render.
pub const KNOWN_CONTENT_TYPES: [&str; 3] = ["text/plain", "text/markdown", "text/x-rst"];

static PROJECT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([A-Z0-9]|[A-Z0-9][A-Z0-9._-]*[A-Z0-9])$")
        .expect("project name pattern is valid")
});

/// Distribution file extensions that may directly follow the version.
const DIST_EXTENSIONS: [&str; 5] = [".tar.gz", ".tar.bz2", ".tar.xz", ".zip", ".whl"];

const RST_ADORNMENT: &str = "=-~^\"'`*+#:._";

/// Stateless strict verifier.
pub struct Verifier;

impl Verifier {
    /// Verify an artifact set.
    pub fn verify(set: &ArtifactSet) -> VerificationResult {
        let mut issues = Vec::new();
        check_contents(set, &mut issues);
        check_checksums(set, &mut issues);
        check_attribution(set, &mut issues);
        match set.descriptor() {
            Some(descriptor) => {
                check_descriptor(descriptor, &mut issues);
                check_markup(descriptor, &mut issues);
            }
            None => issues.push(VerificationIssue::new(
                CheckKind::Descriptor,
                "descriptor.json",
                "package descriptor is missing",
            )),
        }
        VerificationResult::from_issues(issues)
    }
}

fn check_contents(set: &ArtifactSet, issues: &mut Vec<VerificationIssue>) {
    if set.is_empty() {
        issues.push(VerificationIssue::new(
            CheckKind::Contents,
            set.dir().display().to_string(),
            "artifact set is empty",
        ));
        return;
    }
    for artifact in set.artifacts() {
        if artifact.size == 0 {
            issues.push(VerificationIssue::new(
                CheckKind::Contents,
                &artifact.file_name,
                "file is empty",
            ));
        }
        match sha256_file(&artifact.path) {
            Ok(digest) if digest == artifact.sha256 => {}
            Ok(_) => issues.push(VerificationIssue::new(
                CheckKind::Contents,
                &artifact.file_name,
                "file changed after the set was produced",
            )),
            Err(e) => issues.push(VerificationIssue::new(
                CheckKind::Contents,
                &artifact.file_name,
                format!("file is unreadable: {e}"),
            )),
        }
    }
}

fn check_checksums(set: &ArtifactSet, issues: &mut Vec<VerificationIssue>) {
    let Some(manifest) = set.recorded_checksums() else {
        issues.push(VerificationIssue::new(
            CheckKind::Checksums,
            CHECKSUM_FILE,
            "checksum file is missing",
        ));
        return;
    };

    for line in &manifest.malformed {
        issues.push(VerificationIssue::new(
            CheckKind::Checksums,
            CHECKSUM_FILE,
            format!("malformed line: {line:?}"),
        ));
    }

    let mut seen = BTreeSet::new();
    for artifact in set.artifacts() {
        seen.insert(artifact.file_name.as_str());
        match manifest.entries.get(&artifact.file_name) {
            None => issues.push(VerificationIssue::new(
                CheckKind::Checksums,
                &artifact.file_name,
                format!("not listed in {CHECKSUM_FILE}"),
            )),
            Some(recorded) if *recorded != artifact.sha256 => {
                issues.push(VerificationIssue::new(
                    CheckKind::Checksums,
                    &artifact.file_name,
                    format!("checksum mismatch: recorded {recorded}, actual {}", artifact.sha256),
                ))
            }
            Some(_) => {}
        }
    }

    for name in manifest.entries.keys() {
        if !seen.contains(name.as_str()) {
            issues.push(VerificationIssue::new(
                CheckKind::Checksums,
                name,
                format!("listed in {CHECKSUM_FILE} but not present"),
            ));
        }
    }
}

fn check_attribution(set: &ArtifactSet, issues: &mut Vec<VerificationIssue>) {
    let version = set.version();
    let canonical = version.canonical();
    let package = set.descriptor().map(|d| normalize_name(&d.name));

    for artifact in set.artifacts() {
        let name = artifact.file_name.as_str();
        if !contains_version_token(name, &canonical) {
            issues.push(VerificationIssue::new(
                CheckKind::Attribution,
                name,
                format!("file name does not carry version {canonical}"),
            ));
        }
        if let Some(package) = &package {
            if !normalize_name(name).starts_with(package.as_str()) {
                issues.push(VerificationIssue::new(
                    CheckKind::Attribution,
                    name,
                    format!("file name does not belong to package {package}"),
                ));
            }
        }
    }

    if let Some(descriptor) = set.descriptor() {
        let matches = VersionString::parse(&descriptor.version)
            .map(|v| v.canonical() == canonical)
            .unwrap_or(false);
        if !matches {
            issues.push(VerificationIssue::new(
                CheckKind::Attribution,
                "version",
                format!(
                    "descriptor version {:?} does not match set version {version}",
                    descriptor.version
                ),
            ));
        }
    }
}

fn check_descriptor(descriptor: &PackageDescriptor, issues: &mut Vec<VerificationIssue>) {
    if descriptor.name.trim().is_empty() {
        issues.push(VerificationIssue::new(CheckKind::Descriptor, "name", "is empty"));
    } else if !PROJECT_NAME.is_match(&descriptor.name) {
        issues.push(VerificationIssue::new(
            CheckKind::Descriptor,
            "name",
            format!("{:?} is not a valid project name", descriptor.name),
        ));
    }

    if descriptor.summary.trim().is_empty() {
        issues.push(VerificationIssue::new(CheckKind::Descriptor, "summary", "is empty"));
    } else if descriptor.summary.contains('\n') {
        issues.push(VerificationIssue::new(
            CheckKind::Descriptor,
            "summary",
            "must be a single line",
        ));
    }

    if descriptor.long_description.trim().is_empty() {
        issues.push(VerificationIssue::new(
            CheckKind::Descriptor,
            "long_description",
            "is empty",
        ));
    }

    if !KNOWN_CONTENT_TYPES.contains(&content_type(descriptor)) {
        issues.push(VerificationIssue::new(
            CheckKind::Descriptor,
            "long_description_content_type",
            format!(
                "{:?} is not one of {}",
                descriptor.long_description_content_type,
                KNOWN_CONTENT_TYPES.join(", ")
            ),
        ));
    }
}

fn check_markup(descriptor: &PackageDescriptor, issues: &mut Vec<VerificationIssue>) {
    let text = &descriptor.long_description;
    let problems = match content_type(descriptor) {
        "text/markdown" => markdown_problems(text),
        "text/x-rst" => rst_problems(text),
        _ => Vec::new(),
    };
    for problem in problems {
        issues.push(VerificationIssue::new(
            CheckKind::Markup,
            "long_description",
            problem,
        ));
    }
}

/// Media type without parameters such as `; charset=UTF-8`.
fn content_type(descriptor: &PackageDescriptor) -> &str {
    descriptor
        .long_description_content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
}

fn markdown_problems(text: &str) -> Vec<String> {
    // (line, fence char, fence length)
    let mut open: Option<(usize, char, usize)> = None;
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim_start();
        if line.len() - trimmed.len() > 3 {
            continue;
        }
        let Some(ch) = trimmed.chars().next().filter(|c| matches!(c, '`' | '~')) else {
            continue;
        };
        let len = trimmed.chars().take_while(|c| *c == ch).count();
        if len < 3 {
            continue;
        }
        match open {
            None => open = Some((idx + 1, ch, len)),
            // A closing fence carries no info string.
            Some((_, opened, opened_len))
                if opened == ch && len >= opened_len && trimmed[len..].trim().is_empty() =>
            {
                open = None
            }
            Some(_) => {}
        }
    }
    match open {
        Some((line, ch, len)) => {
            let marker: String = std::iter::repeat(ch).take(len).collect();
            vec![format!("code fence {marker} opened on line {line} is never closed")]
        }
        None => Vec::new(),
    }
}

fn rst_problems(text: &str) -> Vec<String> {
    let mut problems = Vec::new();
    let lines: Vec<&str> = text.lines().collect();

    for (idx, pair) in lines.windows(2).enumerate() {
        let (title, underline) = (pair[0].trim_end(), pair[1].trim_end());
        if title.trim().is_empty() || title.starts_with(' ') || is_adornment(title) {
            continue;
        }
        if is_adornment(underline) && underline.chars().count() < title.chars().count() {
            problems.push(format!("title underline too short on line {}", idx + 2));
        }
    }

    for (idx, paragraph) in text.split("\n\n").enumerate() {
        if paragraph.starts_with(' ') || paragraph.starts_with('\t') {
            continue;
        }
        if paragraph.matches("``").count() % 2 != 0 {
            problems.push(format!("unterminated inline literal in paragraph {}", idx + 1));
        }
    }

    problems
}

fn is_adornment(line: &str) -> bool {
    let mut chars = line.chars();
    match chars.next() {
        Some(first) if RST_ADORNMENT.contains(first) => {
            line.chars().count() >= 2 && chars.all(|c| c == first)
        }
        _ => false,
    }
}

/// Lowercase with runs of `-`, `_`, `.` collapsed to `_`, as wheel file
/// names spell project names.
fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_sep = false;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !last_sep {
                out.push('_');
            }
            last_sep = true;
        } else {
            out.extend(c.to_lowercase());
            last_sep = false;
        }
    }
    out
}

/// Whether `version` appears in `file_name` as a whole component: preceded
/// by a separator and followed by another `-` component or a distribution
/// extension. `1.0` matches neither `widget-1.0.1.tar.gz` nor
/// `widget-1.0.dev3.tar.gz`.
fn contains_version_token(file_name: &str, version: &str) -> bool {
    if version.is_empty() {
        return false;
    }
    let lower = file_name.to_ascii_lowercase();
    let version = version.to_ascii_lowercase();
    lower.match_indices(&version).any(|(i, _)| {
        let before_ok = i == 0 || matches!(lower.as_bytes()[i - 1], b'-' | b'_');
        let after = &lower[i + version.len()..];
        let after_ok =
            after.is_empty() || after.starts_with('-') || DIST_EXTENSIONS.contains(&after);
        before_ok && after_ok
    })
}
