//! Surgical in-place patches to DOS time fields.
//!
//! A patch set is the only thing in this crate that ever writes to an
//! archive. Each patch overwrites exactly 4 bytes — one DOS date/time
//! field — and is verified against the bytes it expects to replace before
//! anything is written, so a patch computed against a stale view of the
//! file fails loudly instead of corrupting it.

use std::fs::OpenOptions;
use std::path::Path;

use positioned_io::{ReadAt, WriteAt};
use tracing::{debug, trace};

use crate::{
    error::{Error, MergeError},
    parse::MsdosTimestamp,
};

/// A single pending 4-byte overwrite of a DOS time field.
#[derive(Debug, Clone, Copy)]
pub struct TimePatch {
    /// Absolute offset of the field (LOCTIM or CENTIM of some entry)
    pub offset: u64,
    /// Timestamp the field is expected to hold right now
    pub expected: MsdosTimestamp,
    /// Timestamp to store
    pub replacement: MsdosTimestamp,
}

/// An ordered collection of [TimePatch]es, applied in discovery order under
/// a single read-write handle.
#[derive(Default)]
pub struct PatchSet {
    patches: Vec<TimePatch>,
}

impl PatchSet {
    /// An empty patch set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a patch. No-op patches are a caller bug.
    pub fn push(&mut self, patch: TimePatch) {
        debug_assert_ne!(patch.expected, patch.replacement);
        trace!(
            offset = patch.offset,
            expected = ?patch.expected,
            replacement = ?patch.replacement,
            "queued patch"
        );
        self.patches.push(patch);
    }

    /// Number of queued patches.
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    /// Whether no patches are queued.
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Apply every patch to `path`, in order, verifying each field before
    /// overwriting it.
    ///
    /// An empty set never opens the file, so an already-converged archive
    /// is left untouched down to its mtime.
    pub fn apply(&self, path: &Path) -> Result<(), Error> {
        if self.patches.is_empty() {
            return Ok(());
        }

        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        for patch in &self.patches {
            let mut current = [0u8; 4];
            file.read_exact_at(patch.offset, &mut current)?;
            if current != patch.expected.to_bytes() {
                return Err(MergeError::UnexpectedData {
                    archive: path.to_owned(),
                    offset: patch.offset,
                    expected: patch.expected,
                    actual: MsdosTimestamp::from_bytes(current),
                }
                .into());
            }
            file.write_all_at(patch.offset, &patch.replacement.to_bytes())?;
        }
        debug!(patches = self.patches.len(), path = %path.display(), "patched");
        Ok(())
    }
}
