use crate::{
    error::{Error, FormatError, UnsupportedError},
    parse::ZipString,
};
use tracing::trace;
use winnow::{
    binary::{le_u16, le_u32, length_take},
    seq,
    token::tag,
    PResult, Parser, Partial,
};

/// 4.3.16  End of central directory record:
#[derive(Debug)]
pub struct EndOfCentralDirectoryRecord {
    /// number of this disk
    pub disk_nbr: u16,
    /// number of the disk with the start of the central directory
    pub dir_disk_nbr: u16,
    /// total number of entries in the central directory on this disk
    pub dir_records_this_disk: u16,
    /// total number of entries in the central directory
    pub directory_records: u16,
    /// size of the central directory
    pub directory_size: u32,
    /// offset of start of central directory with respect to the starting disk number
    pub directory_offset: u32,
    /// .ZIP file comment
    pub comment: ZipString,
}

impl EndOfCentralDirectoryRecord {
    /// Size of the record with an empty comment
    const MIN_LENGTH: usize = 22;
    const SIGNATURE: &'static str = "PK\x05\x06";

    /// Scan backward through a block for the end-of-central-directory
    /// signature, returning the record and its offset within the block.
    pub fn find_in_block(b: &[u8]) -> Option<Located<Self>> {
        if b.len() < Self::MIN_LENGTH {
            return None;
        }
        for i in (0..=(b.len() - Self::MIN_LENGTH)).rev() {
            let mut input = Partial::new(&b[i..]);
            if let Ok(directory) = Self::parser.parse_next(&mut input) {
                return Some(Located {
                    offset: i as u64,
                    inner: directory,
                });
            }
        }
        None
    }

    /// Parser for the end of central directory record
    pub fn parser(i: &mut Partial<&'_ [u8]>) -> PResult<Self> {
        let _ = tag(Self::SIGNATURE).parse_next(i)?;
        seq! {Self {
            disk_nbr: le_u16,
            dir_disk_nbr: le_u16,
            dir_records_this_disk: le_u16,
            directory_records: le_u16,
            directory_size: le_u32,
            directory_offset: le_u32,
            comment: length_take(le_u16).map(ZipString::from),
        }}
        .parse_next(i)
    }

    /// A directory offset of 0xFFFFFFFF means the real offset lives in a
    /// zip64 end-of-central-directory record, which this crate refuses to
    /// read.
    pub fn is_zip64(&self) -> bool {
        self.directory_offset == u32::MAX
    }
}

/// A value, and the byte offset it was found at.
#[derive(Debug)]
pub struct Located<T> {
    /// Absolute byte offset within the file
    pub offset: u64,
    /// The located value
    pub inner: T,
}

impl<T> std::ops::Deref for Located<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// The end-of-central-directory record, resolved against the actual file:
/// carries the effective central directory offset and the bias of the first
/// local file header.
pub struct EndOfCentralDirectory {
    /// The located record
    pub dir: Located<EndOfCentralDirectoryRecord>,
    /// Effective absolute offset of the central directory
    pub directory_offset: u64,
    /// Bias applied to every relative local-header offset. Non-zero when
    /// the zip is appended to some other file (installer stubs, padded
    /// artifacts).
    pub global_offset: i64,
}

impl EndOfCentralDirectory {
    /// Resolve a located record against the file size.
    ///
    /// Pure .zip files look like this:
    ///
    /// ```text
    ///                     <------directory_size----->
    /// [ Data 1 ][ Data 2 ][    Central directory    ][ EOCD ]
    /// ^                   ^                          ^
    /// 0                   directory_offset           dir.offset
    /// ```
    ///
    /// But there exist valid archives with padding at the beginning. The
    /// offset found by scanning accounts for the padding and the recorded
    /// one does not, so the difference between `dir.offset -
    /// directory_size` and the recorded offset is the bias of every
    /// relative offset in the archive.
    pub fn new(size: u64, dir: Located<EndOfCentralDirectoryRecord>) -> Result<Self, Error> {
        if dir.is_zip64() {
            return Err(UnsupportedError::Zip64.into());
        }

        let recorded_offset = dir.directory_offset as u64;
        let mut res = Self {
            directory_offset: recorded_offset,
            global_offset: 0,
            dir,
        };

        let computed_offset = res
            .dir
            .offset
            .checked_sub(res.dir.directory_size as u64)
            .ok_or(FormatError::DirectoryOffsetPointsOutsideFile)?;

        // did we find a valid offset that's different from the recorded one?
        if (0..size).contains(&computed_offset) && computed_offset != recorded_offset {
            // then assume the whole file is offset
            res.global_offset = computed_offset as i64 - recorded_offset as i64;
            res.directory_offset = computed_offset;
        }

        trace!(
            directory_offset = res.directory_offset,
            global_offset = res.global_offset,
            size,
            "resolved end of central directory"
        );
        if !(0..size).contains(&res.directory_offset) {
            return Err(FormatError::DirectoryOffsetPointsOutsideFile.into());
        }

        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eocd_bytes(records: u16, dir_size: u32, dir_offset: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"PK\x05\x06");
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&records.to_le_bytes());
        out.extend_from_slice(&records.to_le_bytes());
        out.extend_from_slice(&dir_size.to_le_bytes());
        out.extend_from_slice(&dir_offset.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out
    }

    #[test]
    fn finds_record_at_end_of_block() {
        let mut block = vec![0u8; 100];
        block.extend(eocd_bytes(3, 120, 400));
        let located = EndOfCentralDirectoryRecord::find_in_block(&block).unwrap();
        assert_eq!(located.offset, 100);
        assert_eq!(located.directory_records, 3);
    }

    #[test]
    fn refuses_zip64_sentinel() {
        let block = eocd_bytes(1, 40, u32::MAX);
        let located = EndOfCentralDirectoryRecord::find_in_block(&block).unwrap();
        assert!(located.is_zip64());
        assert!(matches!(
            EndOfCentralDirectory::new(1000, located),
            Err(Error::Unsupported(UnsupportedError::Zip64))
        ));
    }

    #[test]
    fn computes_bias_for_embedded_archive() {
        // archive claims its directory at 400, but the eocd was found at
        // 550 with a 120-byte directory: everything is shifted by 30
        let mut block = vec![0u8; 550];
        block.extend(eocd_bytes(2, 120, 400));
        let located = EndOfCentralDirectoryRecord::find_in_block(&block).unwrap();
        let eocd = EndOfCentralDirectory::new(block.len() as u64, located).unwrap();
        assert_eq!(eocd.directory_offset, 430);
        assert_eq!(eocd.global_offset, 30);
    }
}
