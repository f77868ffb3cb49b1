use crate::parse::{Method, MsdosTimestamp};
use winnow::{
    binary::{le_u16, le_u32},
    token::tag,
    PResult, Parser, Partial,
};

/// 4.3.7 Local file header, fixed-size prefix only.
///
/// The name and extra bytes that follow are read separately (their lengths
/// come from this prefix); entry data starts right after them. This engine
/// never streams past entry data, so data descriptors are irrelevant here.
pub struct LocalFileHeader {
    /// version needed to extract
    pub reader_version: u16,
    /// general purpose bit flag
    pub flags: u16,
    /// compression method
    pub method: Method,
    /// last mod file datetime
    pub modified: MsdosTimestamp,
    /// crc-32
    pub crc32: u32,
    /// compressed size
    pub compressed_size: u32,
    /// uncompressed size
    pub uncompressed_size: u32,
    /// file name length
    pub name_len: u16,
    /// extra field length
    pub extra_len: u16,
}

impl LocalFileHeader {
    /// The signature for a local file header
    pub const SIGNATURE: &'static str = "PK\x03\x04";

    /// Length of the fixed-size prefix, including the signature.
    pub const FIXED_LENGTH: usize = 30;

    /// Byte offset of the DOS date/time within this record (LOCTIM).
    pub const MODIFIED_OFFSET: u64 = 10;

    /// Parser for the fixed-size prefix of the local file header
    pub fn parser(i: &mut Partial<&'_ [u8]>) -> PResult<Self> {
        let _ = tag(Self::SIGNATURE).parse_next(i)?;
        let reader_version = le_u16.parse_next(i)?;
        let flags = le_u16.parse_next(i)?;
        let method = Method::parser.parse_next(i)?;
        let modified = MsdosTimestamp::parser.parse_next(i)?;
        let crc32 = le_u32.parse_next(i)?;
        let compressed_size = le_u32.parse_next(i)?;
        let uncompressed_size = le_u32.parse_next(i)?;
        let name_len = le_u16.parse_next(i)?;
        let extra_len = le_u16.parse_next(i)?;

        Ok(Self {
            reader_version,
            flags,
            method,
            modified,
            crc32,
            compressed_size,
            uncompressed_size,
            name_len,
            extra_len,
        })
    }

    /// Bytes of name + extra data between the prefix and the entry data.
    pub fn variable_length(&self) -> u64 {
        self.name_len as u64 + self.extra_len as u64
    }
}
