//! Decides whether an entry's content changed between two archives.
//!
//! The decision never decompresses more than it has to: equal sizes and
//! equal raw (compressed) bytes prove equality outright when both sides
//! used the same method, and STORED entries are settled on raw bytes alone.
//! Only when the raw comparison is inconclusive — different methods, or a
//! compressor that encoded the same data differently — do the decompressed
//! streams get compared.

use std::collections::BTreeSet;
use std::io::Read;

use tracing::debug;

use crate::{
    archive::{Archive, Entry, FileArchive},
    error::{Error, FormatError},
    parse::Method,
};

/// Directory whose child set gets the sitemap carve-out.
const META_INF: &str = "META-INF/";

/// A sitemap generator downstream adds this entry after the merge runs, so
/// its absence from the current build must not count as a change to
/// `META-INF/`. Only the removal side is forgiven; an *added*
/// `sitemap-index.xml` still marks the directory updated.
const SITEMAP_INDEX: &str = "sitemap-index.xml";

/// Returns whether the build entry's content differs from the last build's.
///
/// Both entries must have the same name; the caller guarantees it.
pub fn entry_updated(
    build: &FileArchive,
    build_entry: &Entry,
    last_build: &FileArchive,
    last_build_entry: &Entry,
) -> Result<bool, Error> {
    if build_entry.uncompressed_size != last_build_entry.uncompressed_size {
        debug!(
            entry = %build_entry.name,
            build_size = build_entry.uncompressed_size,
            last_build_size = last_build_entry.uncompressed_size,
            "size differs"
        );
        return Ok(true);
    }

    if build_entry.is_directory() && last_build_entry.is_directory() {
        return directory_updated(build, build_entry, last_build, last_build_entry);
    }

    // same method: raw byte equality proves content equality
    if build_entry.method == last_build_entry.method {
        if readers_equal(
            build.raw_reader(build_entry)?,
            last_build.raw_reader(last_build_entry)?,
        )? {
            return Ok(false);
        }
        if build_entry.method == Method::Store {
            // raw comparison is authoritative for uncompressed entries
            return Ok(true);
        }
    }

    // raw comparison was inconclusive (different methods, or a compressor
    // producing a different encoding of the same bytes)
    let equal = readers_equal(
        build.decompressed_reader(build_entry)?,
        last_build.decompressed_reader(last_build_entry)?,
    )?;
    Ok(!equal)
}

fn directory_updated(
    build: &FileArchive,
    build_entry: &Entry,
    last_build: &FileArchive,
    last_build_entry: &Entry,
) -> Result<bool, Error> {
    let build_children = immediate_children(build, build_entry)?;
    let mut last_build_children = immediate_children(last_build, last_build_entry)?;

    if build_entry.name == META_INF && !build_children.contains(SITEMAP_INDEX) {
        last_build_children.remove(SITEMAP_INDEX);
    }

    if build_children != last_build_children {
        debug!(
            directory = %build_entry.name,
            added = ?build_children.difference(&last_build_children).collect::<Vec<_>>(),
            removed = ?last_build_children.difference(&build_children).collect::<Vec<_>>(),
            "child set differs"
        );
        return Ok(true);
    }
    Ok(false)
}

/// The names of `dir`'s immediate children: entries whose name extends the
/// directory's by a single fragment with no further `/`. Subdirectory
/// entries carry their own trailing slash and are compared through their
/// own timestamps, not through the parent's child set.
fn immediate_children(
    archive: &FileArchive,
    dir: &Entry,
) -> Result<BTreeSet<String>, Error> {
    let inner: &Archive = archive;
    let mut children = BTreeSet::new();
    for entry in inner.entries() {
        let Some(fragment) = entry.name.strip_prefix(&dir.name) else {
            continue;
        };
        if fragment.is_empty() || fragment.contains('/') {
            continue;
        }
        if !children.insert(fragment.to_string()) {
            return Err(FormatError::DuplicateChild {
                archive: archive.path().to_owned(),
                directory: dir.name.clone(),
                child: fragment.to_string(),
            }
            .into());
        }
    }
    Ok(children)
}

/// Byte-by-byte equality of two readers.
fn readers_equal(mut a: impl Read, mut b: impl Read) -> std::io::Result<bool> {
    let mut buf_a = [0u8; 8 * 1024];
    let mut buf_b = [0u8; 8 * 1024];
    loop {
        let len_a = read_full(&mut a, &mut buf_a)?;
        let len_b = read_full(&mut b, &mut buf_b)?;
        if len_a != len_b || buf_a[..len_a] != buf_b[..len_b] {
            return Ok(false);
        }
        if len_a == 0 {
            return Ok(true);
        }
    }
}

/// Like `read_exact`, but a clean EOF short of the buffer is fine.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readers_compare_across_chunk_boundaries() {
        let a = vec![7u8; 20_000];
        let b = vec![7u8; 20_000];
        assert!(readers_equal(&a[..], &b[..]).unwrap());

        let mut c = b.clone();
        c[19_999] = 8;
        assert!(!readers_equal(&a[..], &c[..]).unwrap());

        assert!(!readers_equal(&a[..], &b[..19_999]).unwrap());
        assert!(readers_equal(&[][..], &[][..]).unwrap());
    }
}
