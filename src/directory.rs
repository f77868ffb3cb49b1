//! Drives the merge over a pair of build-output directories.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::{
    error::{Error, IdentifierError, IdentifierList},
    identifier::{is_archive_file_name, ArtifactIdentifier},
    merge::{merge_file_at, MergeOptions, MergeOutcome},
};

/// Merge timestamps for every archive in `build_dir` from its counterpart
/// in `last_build_dir`.
///
/// Archives are paired by [ArtifactIdentifier]; with
/// `options.require_last_build` the pairing must be one-to-one, otherwise
/// an unpaired build archive is merely warned about and left as built.
/// Returns the outcome per identifier, in identifier order — which is also
/// the processing order, so runs are deterministic.
pub fn merge_directory(
    options: &MergeOptions,
    last_build_dir: &Path,
    build_dir: &Path,
) -> Result<Vec<(ArtifactIdentifier, MergeOutcome)>, Error> {
    if !build_dir.is_dir() {
        return Err(Error::IO(io::Error::new(
            io::ErrorKind::NotFound,
            format!("build directory {} does not exist", build_dir.display()),
        )));
    }
    if options.require_last_build && !last_build_dir.is_dir() {
        return Err(Error::IO(io::Error::new(
            io::ErrorKind::NotFound,
            format!(
                "last build directory {} does not exist",
                last_build_dir.display()
            ),
        )));
    }

    let build_archives = scan_archives(build_dir)?;
    let last_build_archives = scan_archives(last_build_dir)?;

    if options.require_last_build {
        let missing_in_build: Vec<_> = last_build_archives
            .keys()
            .filter(|id| !build_archives.contains_key(*id))
            .cloned()
            .collect();
        let missing_in_last_build: Vec<_> = build_archives
            .keys()
            .filter(|id| !last_build_archives.contains_key(*id))
            .cloned()
            .collect();
        if !missing_in_build.is_empty() || !missing_in_last_build.is_empty() {
            return Err(IdentifierError::NotOneToOne {
                missing_in_build: IdentifierList(missing_in_build),
                missing_in_last_build: IdentifierList(missing_in_last_build),
            }
            .into());
        }
    }

    // one clock snapshot for every decision in this run
    let now = Utc::now();
    let mut outcomes = Vec::with_capacity(build_archives.len());
    for (identifier, build_path) in &build_archives {
        match last_build_archives.get(identifier) {
            Some(last_build_path) => {
                let outcome = merge_file_at(options, now, last_build_path, build_path)?;
                outcomes.push((identifier.clone(), outcome));
            }
            None => {
                // reachable only when require_last_build is off
                warn!(
                    identifier = %identifier,
                    build = %build_path.display(),
                    "no last-build archive, leaving timestamps as built"
                );
            }
        }
    }
    info!(
        build_dir = %build_dir.display(),
        merged = outcomes.len(),
        "merged directory"
    );
    Ok(outcomes)
}

/// Eligible archives of one directory, keyed by identifier.
fn scan_archives(dir: &Path) -> Result<BTreeMap<ArtifactIdentifier, PathBuf>, Error> {
    let mut archives = BTreeMap::new();
    if !dir.is_dir() {
        return Ok(archives);
    }
    for dir_entry in fs::read_dir(dir)? {
        let dir_entry = dir_entry?;
        if !dir_entry.file_type()?.is_file() {
            continue;
        }
        let file_name = dir_entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if !is_archive_file_name(file_name) {
            debug!(file = file_name, "not an archive, skipping");
            continue;
        }
        let identifier = ArtifactIdentifier::parse(file_name)?;
        if let Some(first) = archives.insert(identifier.clone(), dir_entry.path()) {
            return Err(IdentifierError::Duplicate {
                identifier,
                first,
                second: dir_entry.path(),
            }
            .into());
        }
    }
    Ok(archives)
}
