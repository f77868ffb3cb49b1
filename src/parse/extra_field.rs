use winnow::{
    binary::{le_u16, length_take},
    seq, PResult, Parser, Partial,
};

/// 4.4.28 extra field: (Variable)
///
/// Extra data is a sequence of `(tag, length, payload)` records. This engine
/// never rewrites extra fields; it only scans them to refuse archives that
/// carry timestamps it cannot patch.
pub struct ExtraFieldRecord<'a> {
    /// Header id of the record
    pub tag: u16,
    /// Raw payload, `length` bytes
    pub payload: &'a [u8],
}

impl<'a> ExtraFieldRecord<'a> {
    /// Extended timestamp (mtime/atime/ctime in Unix seconds). Patching
    /// these in step with the DOS fields is unsupported; their presence is
    /// fatal.
    pub const EXTENDED_TIMESTAMP_TAG: u16 = 0x5455;

    /// Zip64 extended information.
    pub const ZIP64_TAG: u16 = 0x0001;

    /// Parser for a single extra-field record
    pub fn parser(i: &mut Partial<&'a [u8]>) -> PResult<Self> {
        seq! {Self {
            tag: le_u16,
            payload: length_take(le_u16),
        }}
        .parse_next(i)
    }
}

/// Walks all records in an extra-field blob looking for `tag`.
///
/// Returns `None` when the blob does not parse as a record sequence; callers
/// turn that into a format error with the entry's name attached.
pub fn contains_tag(extra: &[u8], tag: u16) -> Option<bool> {
    let mut slice = Partial::new(extra);
    while !slice.is_empty() {
        match ExtraFieldRecord::parser.parse_next(&mut slice) {
            Ok(record) if record.tag == tag => return Some(true),
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
    Some(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tag: u16, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn finds_tag_among_records() {
        let mut extra = record(0x7875, &[1, 4, 0, 0, 0, 0, 4, 0, 0, 0, 0]);
        extra.extend(record(
            ExtraFieldRecord::EXTENDED_TIMESTAMP_TAG,
            &[1, 0, 0, 0, 0],
        ));
        assert_eq!(
            contains_tag(&extra, ExtraFieldRecord::EXTENDED_TIMESTAMP_TAG),
            Some(true)
        );
        assert_eq!(contains_tag(&extra, ExtraFieldRecord::ZIP64_TAG), Some(false));
    }

    #[test]
    fn empty_blob_has_no_tags() {
        assert_eq!(contains_tag(&[], ExtraFieldRecord::EXTENDED_TIMESTAMP_TAG), Some(false));
    }

    #[test]
    fn truncated_blob_is_malformed() {
        let extra = record(0x0001, &[0; 8]);
        assert_eq!(contains_tag(&extra[..extra.len() - 1], 0x0001), None);
        assert_eq!(contains_tag(&[0x55], 0x0001), None);
    }
}
