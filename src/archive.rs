//! Structural access to zip archives: locating the end-of-central-directory
//! record, walking the central directory, and serving per-entry views with
//! the byte offsets the patch engine needs.
//!
//! Everything here is read-only; mutation happens exclusively through
//! [crate::patch::PatchSet].

use std::fs::File;
use std::io::Read;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use positioned_io::{Cursor, ReadAt};
use tracing::trace;
use winnow::{
    stream::{AsBytes, Offset},
    Parser, Partial,
};

use crate::{
    encoding::Encoding,
    error::{Error, FormatError, UnsupportedError},
    parse::{
        DirectoryHeader, EndOfCentralDirectory, EndOfCentralDirectoryRecord, LocalFileHeader,
        Method, MsdosTimestamp, ZipBytes, ZipString,
    },
};

/// One entry of an archive, as recorded in the central directory, with the
/// absolute offsets of both of its on-disk headers.
pub struct Entry {
    /// Decoded name, `/`-separated; a trailing `/` marks a directory
    pub name: String,
    /// Name exactly as stored in the central directory
    pub raw_name: ZipString,
    /// Compression method
    pub method: Method,
    /// DOS timestamp recorded in the central directory
    pub modified: MsdosTimestamp,
    /// Compressed size in bytes
    pub compressed_size: u32,
    /// Uncompressed size in bytes
    pub uncompressed_size: u32,
    /// Absolute offset of the local file header
    pub local_header_offset: u64,
    /// Absolute offset of this entry's central directory header
    pub central_header_offset: u64,
    /// Raw central-directory extra field data
    pub extra: ZipBytes,
}

impl Entry {
    /// Directories are marked by a trailing slash, straight from the
    /// APPNOTE.
    pub fn is_directory(&self) -> bool {
        self.name.ends_with('/')
    }
}

/// A parsed central directory: every entry of the archive in physical
/// (local-header-offset) order.
pub struct Archive {
    size: u64,
    global_offset: i64,
    entries: Vec<Entry>,
}

impl Archive {
    /// The end-of-central-directory record is at most ~65KiB from the end
    /// of the file (comment length is a u16).
    const EOCD_HAYSTACK: u64 = 65 * 1024;

    /// Parse the central directory of `reader`, a random-access view of
    /// `size` bytes.
    pub fn read<R: ReadAt>(reader: &R, size: u64) -> Result<Self, Error> {
        let haystack_size = size.min(Self::EOCD_HAYSTACK);
        let mut haystack = vec![0u8; haystack_size as usize];
        reader.read_exact_at(size - haystack_size, &mut haystack)?;

        let mut located = EndOfCentralDirectoryRecord::find_in_block(&haystack)
            .ok_or(FormatError::DirectoryEndSignatureNotFound)?;
        located.offset += size - haystack_size;
        let eocd = EndOfCentralDirectory::new(size, located)?;

        let mut directory = vec![0u8; eocd.dir.directory_size as usize];
        reader.read_exact_at(eocd.directory_offset, &mut directory)?;

        let mut entries = Vec::with_capacity(eocd.dir.directory_records as usize);
        let start = directory.as_slice();
        let mut input = Partial::new(start);
        while !input.is_empty() {
            let record_offset = input.as_bytes().offset_from(&start) as u64;
            match DirectoryHeader::parser.parse_next(&mut input) {
                Ok(header) => {
                    let entry = entry_from_header(
                        header,
                        eocd.directory_offset + record_offset,
                        eocd.global_offset,
                        size,
                    )?;
                    entries.push(entry);
                }
                Err(_) => break,
            }
        }

        if entries.len() != eocd.dir.directory_records as usize {
            return Err(FormatError::InvalidCentralRecord {
                expected: eocd.dir.directory_records,
                actual: entries.len() as u16,
            }
            .into());
        }

        // physical order; every local header must be claimed exactly once
        entries.sort_by_key(|e| e.local_header_offset);
        for pair in entries.windows(2) {
            if pair[0].local_header_offset == pair[1].local_header_offset {
                return Err(FormatError::DuplicateLocalHeaderOffset {
                    offset: pair[0].local_header_offset,
                }
                .into());
            }
        }

        trace!(
            entries = entries.len(),
            global_offset = eocd.global_offset,
            "parsed central directory"
        );
        Ok(Self {
            size,
            global_offset: eocd.global_offset,
            entries,
        })
    }

    /// All entries, in physical order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Size of the archive file in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Bias of the first local file header (non-zero for embedded archives).
    pub fn global_offset(&self) -> i64 {
        self.global_offset
    }
}

fn entry_from_header(
    header: DirectoryHeader,
    central_header_offset: u64,
    global_offset: i64,
    size: u64,
) -> Result<Entry, Error> {
    // a non-zip64 eocd can still hide zip64 entries behind sentinel fields
    if header.compressed_size == u32::MAX
        || header.uncompressed_size == u32::MAX
        || header.header_offset == u32::MAX
    {
        return Err(UnsupportedError::Zip64.into());
    }

    let name = Encoding::detect(&header.name.0, header.flags).decode(&header.name.0)?;

    let local_header_offset = header.header_offset as i64 + global_offset;
    if local_header_offset < 0 || local_header_offset as u64 >= size {
        return Err(FormatError::InvalidHeaderOffset { entry: name }.into());
    }

    Ok(Entry {
        name,
        raw_name: header.name,
        method: header.method,
        modified: header.modified,
        compressed_size: header.compressed_size,
        uncompressed_size: header.uncompressed_size,
        local_header_offset: local_header_offset as u64,
        central_header_offset,
        extra: header.extra,
    })
}

/// An entry's local file header, re-read from disk on demand.
///
/// The local header carries its own copy of the name, extra data and DOS
/// timestamp; the timestamp here is the one all merge decisions are made
/// from, and the raw name is cross-checked against the central directory
/// before any patch is emitted.
pub struct LocalHeaderView {
    /// DOS timestamp stored in the local header (the LOCTIM field)
    pub modified: MsdosTimestamp,
    /// Name exactly as stored in the local header
    pub raw_name: ZipString,
    /// Raw local extra field data
    pub extra: ZipBytes,
    /// Absolute offset of the entry's (possibly compressed) data
    pub data_offset: u64,
}

/// An archive bundled with its open (read-only) file handle.
pub struct FileArchive {
    path: PathBuf,
    file: File,
    archive: Archive,
}

impl Deref for FileArchive {
    type Target = Archive;

    fn deref(&self) -> &Self::Target {
        &self.archive
    }
}

impl FileArchive {
    /// Open `path` read-only and parse its central directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_owned();
        let file = File::open(&path)?;
        let size = file.metadata()?.len();
        let archive = Archive::read(&file, size)?;
        Ok(Self {
            path,
            file,
            archive,
        })
    }

    /// The path this archive was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read and validate `entry`'s local file header.
    pub fn local_header(&self, entry: &Entry) -> Result<LocalHeaderView, Error> {
        let offset = entry.local_header_offset;
        let mut fixed = [0u8; LocalFileHeader::FIXED_LENGTH];
        self.file.read_exact_at(offset, &mut fixed)?;

        let mut input = Partial::new(&fixed[..]);
        let header = LocalFileHeader::parser
            .parse_next(&mut input)
            .map_err(|_| FormatError::InvalidLocalHeader { offset })?;

        let mut variable = vec![0u8; header.variable_length() as usize];
        self.file
            .read_exact_at(offset + LocalFileHeader::FIXED_LENGTH as u64, &mut variable)?;
        let extra = variable.split_off(header.name_len as usize);

        Ok(LocalHeaderView {
            modified: header.modified,
            raw_name: ZipString(variable),
            extra: ZipBytes(extra),
            data_offset: offset
                + LocalFileHeader::FIXED_LENGTH as u64
                + header.variable_length(),
        })
    }

    /// A reader over the entry's data exactly as stored (compressed).
    pub fn raw_reader(&self, entry: &Entry) -> Result<impl Read + '_, Error> {
        let local = self.local_header(entry)?;
        Ok(Cursor::new_pos(&self.file, local.data_offset).take(entry.compressed_size as u64))
    }

    /// A reader over the entry's decompressed data.
    ///
    /// STORED entries pass through; DEFLATE entries decompress through
    /// flate2. Anything else cannot be compared decompressed and returns
    /// [UnsupportedError::MethodNotSupported].
    pub fn decompressed_reader(&self, entry: &Entry) -> Result<Box<dyn Read + '_>, Error> {
        let raw = self.raw_reader(entry)?;
        match entry.method {
            Method::Store => Ok(Box::new(raw)),
            Method::Deflate => Ok(Box::new(flate2::read::DeflateDecoder::new(raw))),
            method => Err(UnsupportedError::MethodNotSupported(method).into()),
        }
    }
}
