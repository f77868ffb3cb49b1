//! Pairing key for archives across two build directories.
//!
//! A build directory holds artifacts named like
//! `artifact-1.2.3-SNAPSHOT-javadoc.jar`; version numbers change between
//! builds but `(artifact id, classifier, type)` does not, so that tuple is
//! the key that pairs a current archive with its last-build counterpart.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::IdentifierError;

lazy_static! {
    /// Trailing `-classifier` run: lowercase letters and hyphens, so
    /// `-test-javadoc` captures as one classifier.
    static ref CLASSIFIER_RE: Regex = Regex::new("-([a-z-]+)$").unwrap();
}

/// Filename suffixes accepted as mergeable archives. Case-insensitive;
/// notably excludes `.pom`.
const ARCHIVE_SUFFIXES: [&str; 4] = [".aar", ".jar", ".war", ".zip"];

/// Whether `file_name` names an archive eligible for merging.
///
/// A trailing-whitespace name never matches (the suffix has to be the very
/// end of the name).
pub fn is_archive_file_name(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    ARCHIVE_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

/// The `type` of an artifact filename: whatever follows the final `.`,
/// required to be one or more ASCII letters (case preserved).
pub fn parse_type(file_name: &str) -> Result<&str, IdentifierError> {
    let err = || IdentifierError::Type {
        file_name: file_name.to_string(),
    };
    let dot = file_name.rfind('.').ok_or_else(err)?;
    let kind = &file_name[dot + 1..];
    if kind.is_empty() || !kind.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(err());
    }
    Ok(kind)
}

/// `(artifact id, classifier, type)` parsed from an archive filename.
///
/// Equality and ordering are case-insensitive on the artifact id and type;
/// the classifier is lowercase by construction.
#[derive(Debug, Clone)]
pub struct ArtifactIdentifier {
    /// Everything before the first `-<digit>` (the version separator)
    pub artifact_id: String,
    /// Trailing lowercase classifier such as `javadoc` or `test-sources`;
    /// empty when the filename carries none
    pub classifier: String,
    /// The filename's type suffix (`jar`, `war`, ...)
    pub kind: String,
}

impl ArtifactIdentifier {
    /// Parse an identifier from an archive filename.
    pub fn parse(file_name: &str) -> Result<Self, IdentifierError> {
        let kind = parse_type(file_name)?;

        let bytes = file_name.as_bytes();
        let version_sep = (0..bytes.len().saturating_sub(1))
            .find(|&i| bytes[i] == b'-' && bytes[i + 1].is_ascii_digit())
            .ok_or_else(|| IdentifierError::ArtifactId {
                file_name: file_name.to_string(),
            })?;
        if version_sep == 0 {
            return Err(IdentifierError::ArtifactId {
                file_name: file_name.to_string(),
            });
        }
        let artifact_id = &file_name[..version_sep];

        // strip ".type", then take the trailing lowercase run as classifier
        let stem = &file_name[..file_name.len() - kind.len() - 1];
        let classifier = CLASSIFIER_RE
            .captures(stem)
            .map(|c| c[1].to_string())
            .unwrap_or_default();

        Ok(Self {
            artifact_id: artifact_id.to_string(),
            classifier,
            kind: kind.to_string(),
        })
    }
}

impl fmt::Display for ArtifactIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.artifact_id)?;
        if !self.classifier.is_empty() {
            write!(f, "-{}", self.classifier)?;
        }
        write!(f, ".{}", self.kind)
    }
}

fn cmp_ignore_ascii_case(a: &str, b: &str) -> Ordering {
    a.bytes()
        .map(|b| b.to_ascii_lowercase())
        .cmp(b.bytes().map(|b| b.to_ascii_lowercase()))
}

impl Ord for ArtifactIdentifier {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_ignore_ascii_case(&self.artifact_id, &other.artifact_id)
            .then_with(|| self.classifier.cmp(&other.classifier))
            .then_with(|| cmp_ignore_ascii_case(&self.kind, &other.kind))
    }
}

impl PartialOrd for ArtifactIdentifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ArtifactIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ArtifactIdentifier {}

impl Hash for ArtifactIdentifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.artifact_id.to_ascii_lowercase().hash(state);
        self.classifier.hash(state);
        self.kind.to_ascii_lowercase().hash(state);
    }
}
