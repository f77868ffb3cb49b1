//! All error types used in this crate

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::identifier::ArtifactIdentifier;
use crate::parse::{Method, MsdosTimestamp};

use super::encoding;

/// Any error produced while analyzing, comparing or patching archives.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Not a valid zip file.
    #[error("format: {0}")]
    Format(#[from] FormatError),

    /// Something is not supported by this crate
    #[error("unsupported: {0}")]
    Unsupported(#[from] UnsupportedError),

    /// The two archives (or their timestamps) cannot be merged.
    #[error("merge: {0}")]
    Merge(#[from] MergeError),

    /// An archive filename could not be paired across directories.
    #[error("identifier: {0}")]
    Identifier(#[from] IdentifierError),

    /// Invalid UTF-8 or any problem encountered while decoding text in general.
    #[error("encoding: {0:?}")]
    Encoding(#[from] encoding::DecodingError),

    /// I/O-related error
    #[error("io: {0}")]
    IO(#[from] std::io::Error),
}

/// Some part of the zip format is not supported by this crate.
#[derive(Debug, thiserror::Error)]
pub enum UnsupportedError {
    /// Zip64 archives are refused outright rather than silently misread.
    #[error("zip64 archives are not supported")]
    Zip64,

    /// An entry carries an extended-timestamp (0x5455) extra field, which
    /// this engine cannot patch in step with the DOS fields.
    #[error("{}: entry {entry:?} carries an extended-timestamp extra field", .archive.display())]
    ExtendedTimestamp {
        /// archive the entry was found in
        archive: PathBuf,
        /// entry name
        entry: String,
    },

    /// The compression method cannot be decompressed for comparison.
    #[error("compression method not supported: {0:?}")]
    MethodNotSupported(Method),

    /// A computed timestamp does not fit the DOS date/time range
    /// (1980..=2107, local wall clock).
    #[error("timestamp not representable as dos date/time: {0}")]
    TimestampOutOfDosRange(DateTime<Utc>),
}

/// Specific zip format errors, mostly due to invalid zip archives but that
/// could also stem from implementation shortcomings.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// The end of central directory record was not found.
    ///
    /// This usually indicates that the file being read is not a zip archive.
    #[error("end of central directory record not found")]
    DirectoryEndSignatureNotFound,

    /// Corrupted/partial zip file: the offset we found for the central
    /// directory points outside of the current file.
    #[error("directory offset points outside of file")]
    DirectoryOffsetPointsOutsideFile,

    /// The central record is corrupted somewhat.
    ///
    /// This can happen when the end of central directory record advertises
    /// a certain number of files, but we weren't able to read the same
    /// number of central directory headers.
    #[error("invalid central record: expected to read {expected} files, got {actual}")]
    InvalidCentralRecord {
        /// expected number of files
        expected: u16,
        /// actual number of files
        actual: u16,
    },

    /// Two central directory entries claim the same local header.
    #[error("duplicate local header offset {offset}")]
    DuplicateLocalHeaderOffset {
        /// absolute offset claimed twice
        offset: u64,
    },

    /// The local file header did not carry the expected signature.
    #[error("invalid local file header at offset {offset}")]
    InvalidLocalHeader {
        /// absolute offset of the attempted read
        offset: u64,
    },

    /// An entry's header offset points outside the file.
    #[error("invalid header offset for entry {entry:?}")]
    InvalidHeaderOffset {
        /// entry name
        entry: String,
    },

    /// An extra field could not be decoded as a record sequence.
    #[error("could not decode extra field of entry {entry:?}")]
    InvalidExtraField {
        /// entry name
        entry: String,
    },

    /// An entry stores the "no time" sentinel instead of a valid DOS
    /// date/time.
    #[error("{}: entry {entry:?} has no timestamp", .archive.display())]
    MissingTimestamp {
        /// archive the entry was found in
        archive: PathBuf,
        /// entry name
        entry: String,
    },

    /// A directory lists the same immediate child twice.
    #[error("{}: directory {directory:?} has duplicate child {child:?}", .archive.display())]
    DuplicateChild {
        /// archive the directory was found in
        archive: PathBuf,
        /// directory entry name
        directory: String,
        /// duplicated child name
        child: String,
    },
}

/// Errors detected while merging timestamps between two archives.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// `build_reproducible` was promised but an entry's timestamp differs
    /// from the output timestamp.
    #[error(
        "{}: entry {entry:?} at {entry_time} is not reproducible (expected {output_timestamp})",
        .archive.display()
    )]
    NotReproducible {
        /// build archive
        archive: PathBuf,
        /// offending entry
        entry: String,
        /// the entry's unpacked timestamp
        entry_time: DateTime<Utc>,
        /// the declared output timestamp, at DOS quantum
        output_timestamp: DateTime<Utc>,
    },

    /// The last-build archive lists the same name more than once.
    #[error("{}: more than one entry named {entry:?}", .archive.display())]
    DuplicateName {
        /// last-build archive
        archive: PathBuf,
        /// duplicated entry name
        entry: String,
    },

    /// The raw filename recorded in the central directory does not match
    /// the local header's raw filename.
    #[error(
        "{}: central directory names {central:?} where the local header names {local:?}",
        .archive.display()
    )]
    CentralDirectoryMismatch {
        /// build archive
        archive: PathBuf,
        /// raw name from the central directory
        central: crate::parse::ZipString,
        /// raw name from the local header
        local: crate::parse::ZipString,
    },

    /// A patch's verification read did not see the expected bytes.
    #[error(
        "{}: expected {expected:?} at offset {offset}, found {actual:?}",
        .archive.display()
    )]
    UnexpectedData {
        /// archive being patched
        archive: PathBuf,
        /// absolute offset of the 4-byte time field
        offset: u64,
        /// value the patch was computed against
        expected: MsdosTimestamp,
        /// value actually on disk
        actual: MsdosTimestamp,
    },
}

/// Errors in deriving or pairing artifact identifiers from filenames.
#[derive(Debug, thiserror::Error)]
pub enum IdentifierError {
    /// No `-<digit>` separator, or nothing before it.
    #[error("cannot determine artifact id from {file_name:?}")]
    ArtifactId {
        /// offending filename
        file_name: String,
    },

    /// No `.type` suffix, or the suffix isn't ASCII letters.
    #[error("cannot determine artifact type from {file_name:?}")]
    Type {
        /// offending filename
        file_name: String,
    },

    /// Two archives in the same directory resolve to the same identifier.
    #[error("duplicate identifier {identifier} for {} and {}", .first.display(), .second.display())]
    Duplicate {
        /// the shared identifier
        identifier: ArtifactIdentifier,
        /// first archive
        first: PathBuf,
        /// second archive
        second: PathBuf,
    },

    /// The two directories do not contain the same set of archives.
    #[error(
        "archive sets do not match: missing in build: [{missing_in_build}], missing in last build: [{missing_in_last_build}]"
    )]
    NotOneToOne {
        /// identifiers present in the last build but absent from the build
        missing_in_build: IdentifierList,
        /// identifiers present in the build but absent from the last build
        missing_in_last_build: IdentifierList,
    },
}

/// A displayable list of identifiers, for [IdentifierError::NotOneToOne].
#[derive(Debug)]
pub struct IdentifierList(pub Vec<ArtifactIdentifier>);

impl fmt::Display for IdentifierList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{id}")?;
        }
        Ok(())
    }
}

impl From<Error> for std::io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::IO(e) => e,
            e => std::io::Error::new(std::io::ErrorKind::Other, e),
        }
    }
}
