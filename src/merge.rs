//! The merge driver: makes one archive's timestamps tell the truth about
//! what changed since the last build.
//!
//! A merge is two passes over the build archive. Pass A establishes (or
//! verifies) reproducibility: every entry carries the declared output
//! timestamp. Pass B then walks the entries, pairs them by name with the
//! last build, and rewinds the timestamp of every entry whose content is
//! unchanged — so downstream consumers only ever see a new timestamp on
//! content that actually changed.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::{
    archive::{Entry, FileArchive, LocalHeaderView},
    compare,
    error::{Error, FormatError, MergeError, UnsupportedError},
    parse::{
        contains_tag, round_down_to_dos_quantum, DirectoryHeader, DosZone, ExtraFieldRecord,
        LocalFileHeader, MsdosTimestamp,
    },
    patch::{PatchSet, TimePatch},
};

/// Configuration for a merge run.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// The one timestamp every entry of a reproducible build carries, and
    /// the timestamp genuinely new content keeps.
    pub output_timestamp: DateTime<Utc>,

    /// When true (the default), the build archive is *verified* to be
    /// reproducible and a mismatch is fatal. When false, the build archive
    /// is first patched to the output timestamp.
    pub build_reproducible: bool,

    /// When true (the default), [crate::directory::merge_directory]
    /// requires the two directories to contain exactly the same set of
    /// artifact identifiers.
    pub require_last_build: bool,

    /// The wall-clock zone DOS timestamps are encoded in.
    pub dos_zone: DosZone,
}

impl MergeOptions {
    /// Options with the defaults: verify reproducibility, require a
    /// one-to-one archive pairing, encode times in the local zone.
    pub fn new(output_timestamp: DateTime<Utc>) -> Self {
        Self {
            output_timestamp,
            build_reproducible: true,
            require_last_build: true,
            dos_zone: DosZone::Local,
        }
    }
}

/// What a merge did, mostly for logging and idempotence checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOutcome {
    /// Entries examined in the build archive
    pub entries: usize,
    /// Patches applied by Pass A to reach reproducibility
    pub reproducibility_patches: usize,
    /// Patches applied by Pass B to carry timestamps over
    pub merge_patches: usize,
}

/// Merge timestamps from `last_build` into `build`, using the current wall
/// time for "content changed recently" decisions.
pub fn merge_file(
    options: &MergeOptions,
    last_build: &Path,
    build: &Path,
) -> Result<MergeOutcome, Error> {
    merge_file_at(options, Utc::now(), last_build, build)
}

/// [merge_file] with an explicit clock.
///
/// All time decisions for one archive (and, through the directory merger,
/// one whole run) derive from the single `now` snapshot.
pub fn merge_file_at(
    options: &MergeOptions,
    now: DateTime<Utc>,
    last_build: &Path,
    build: &Path,
) -> Result<MergeOutcome, Error> {
    info!(
        build = %build.display(),
        last_build = %last_build.display(),
        "merging zip timestamps"
    );
    let reproducibility_patches = ensure_reproducible(options, build)?;
    let mut outcome = merge_entries(options, now, last_build, build)?;
    outcome.reproducibility_patches = reproducibility_patches;
    info!(
        build = %build.display(),
        entries = outcome.entries,
        reproducibility_patches = outcome.reproducibility_patches,
        merge_patches = outcome.merge_patches,
        "merged zip timestamps"
    );
    Ok(outcome)
}

/// Pass A: leave the build archive with every entry at the output
/// timestamp, or prove it already is.
fn ensure_reproducible(options: &MergeOptions, build_path: &Path) -> Result<usize, Error> {
    let mode = if options.build_reproducible {
        "validate reproducible"
    } else {
        "patch to reproducible"
    };
    debug!(build = %build_path.display(), mode, "reproducibility pass");

    let output_rounded = round_down_to_dos_quantum(options.output_timestamp);
    let build = FileArchive::open(build_path)?;
    let mut patches = PatchSet::new();

    for entry in build.entries() {
        let local = build.local_header(entry)?;
        refuse_extended_timestamp(build_path, entry, &local)?;

        let entry_time = local
            .modified
            .to_utc(options.dos_zone)
            .ok_or_else(|| FormatError::MissingTimestamp {
                archive: build_path.to_owned(),
                entry: entry.name.clone(),
            })?;

        if options.build_reproducible {
            if entry_time != output_rounded {
                return Err(MergeError::NotReproducible {
                    archive: build_path.to_owned(),
                    entry: entry.name.clone(),
                    entry_time,
                    output_timestamp: output_rounded,
                }
                .into());
            }
        } else {
            let replacement = pack(options.output_timestamp, options.dos_zone)?;
            if local.modified != replacement {
                push_entry_patches(&mut patches, entry, local.modified, replacement);
            }
        }
    }

    let count = patches.len();
    drop(build);
    patches.apply(build_path)?;
    Ok(count)
}

/// Pass B: carry per-entry timestamps over from the last build.
fn merge_entries(
    options: &MergeOptions,
    now: DateTime<Utc>,
    last_build_path: &Path,
    build_path: &Path,
) -> Result<MergeOutcome, Error> {
    let now_rounded = round_down_to_dos_quantum(now);

    // reopen: pass A may have rewritten time fields
    let build = FileArchive::open(build_path)?;
    let last_build = FileArchive::open(last_build_path)?;

    let mut last_by_name: HashMap<&str, Vec<&Entry>> = HashMap::new();
    for entry in last_build.entries() {
        last_by_name.entry(entry.name.as_str()).or_default().push(entry);
    }

    let mut patches = PatchSet::new();
    for entry in build.entries() {
        let Some(last_entries) = last_by_name.get(entry.name.as_str()) else {
            debug!(entry = %entry.name, "new entry, keeping output timestamp");
            continue;
        };
        if last_entries.len() > 1 {
            return Err(MergeError::DuplicateName {
                archive: last_build_path.to_owned(),
                entry: entry.name.clone(),
            }
            .into());
        }
        let last_entry = last_entries[0];
        // names match exactly, and the trailing slash is part of the name
        debug_assert_eq!(entry.is_directory(), last_entry.is_directory());

        let local = build.local_header(entry)?;
        let last_local = last_build.local_header(last_entry)?;
        let entry_time = unpack(build_path, entry, local.modified, options.dos_zone)?;
        let last_time = unpack(last_build_path, last_entry, last_local.modified, options.dos_zone)?;

        if entry_time > now_rounded {
            warn!(entry = %entry.name, %entry_time, %now_rounded, "build entry timestamp is in the future");
        }
        if last_time > now_rounded {
            warn!(entry = %entry.name, last_time = %last_time, %now_rounded, "last-build entry timestamp is in the future");
        }

        let updated = compare::entry_updated(&build, entry, &last_build, last_entry)?;
        let expected_time = if updated {
            if last_time < entry_time {
                // last build was older: the output timestamp already marks
                // the change
                entry_time
            } else {
                // never move backwards in time
                now_rounded
            }
        } else {
            // unchanged content keeps its previous timestamp, even a
            // future one
            last_time
        };
        debug!(
            entry = %entry.name,
            updated,
            %entry_time,
            %last_time,
            %expected_time,
            "entry decision"
        );

        if entry_time != expected_time {
            let replacement = pack(expected_time, options.dos_zone)?;
            if replacement == local.modified {
                // distinct instants, same packing (same DOS quantum):
                // already correct, no patch
                continue;
            }
            if entry.raw_name != local.raw_name {
                return Err(MergeError::CentralDirectoryMismatch {
                    archive: build_path.to_owned(),
                    central: entry.raw_name.clone(),
                    local: local.raw_name.clone(),
                }
                .into());
            }
            push_entry_patches(&mut patches, entry, local.modified, replacement);
        }
    }

    let outcome = MergeOutcome {
        entries: build.entries().len(),
        reproducibility_patches: 0,
        merge_patches: patches.len(),
    };
    drop(build);
    drop(last_build);
    patches.apply(build_path)?;
    Ok(outcome)
}

/// Queue the LOCTIM and CENTIM patches for one entry. Both share the same
/// expected bytes: the two on-disk copies of the time must agree, and patch
/// verification enforces it.
fn push_entry_patches(
    patches: &mut PatchSet,
    entry: &Entry,
    expected: MsdosTimestamp,
    replacement: MsdosTimestamp,
) {
    patches.push(TimePatch {
        offset: entry.local_header_offset + LocalFileHeader::MODIFIED_OFFSET,
        expected,
        replacement,
    });
    patches.push(TimePatch {
        offset: entry.central_header_offset + DirectoryHeader::MODIFIED_OFFSET,
        expected,
        replacement,
    });
}

fn refuse_extended_timestamp(
    archive: &Path,
    entry: &Entry,
    local: &LocalHeaderView,
) -> Result<(), Error> {
    for extra in [&entry.extra, &local.extra] {
        let found = contains_tag(&extra.0, ExtraFieldRecord::EXTENDED_TIMESTAMP_TAG).ok_or_else(
            || FormatError::InvalidExtraField {
                entry: entry.name.clone(),
            },
        )?;
        if found {
            return Err(UnsupportedError::ExtendedTimestamp {
                archive: archive.to_owned(),
                entry: entry.name.clone(),
            }
            .into());
        }
    }
    Ok(())
}

fn pack(timestamp: DateTime<Utc>, zone: DosZone) -> Result<MsdosTimestamp, Error> {
    MsdosTimestamp::from_utc(timestamp, zone)
        .ok_or_else(|| UnsupportedError::TimestampOutOfDosRange(timestamp).into())
}

fn unpack(
    archive: &Path,
    entry: &Entry,
    modified: MsdosTimestamp,
    zone: DosZone,
) -> Result<DateTime<Utc>, Error> {
    modified.to_utc(zone).ok_or_else(|| {
        FormatError::MissingTimestamp {
            archive: archive.to_owned(),
            entry: entry.name.clone(),
        }
        .into()
    })
}