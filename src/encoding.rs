//! Character encodings used in ZIP files.
//!
//! ZIP entry paths may be encoded in a variety of character encodings:
//! historically, CP-437 was used, but many modern zip files use UTF-8 with an
//! optional UTF-8 flag.
//!
//! Decoded names are only used for pairing entries and comparing directory
//! child sets; the raw bytes stay around for the byte-level checks.

use std::fmt;

/// Encodings supported by this crate
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Encoding {
    /// [UTF-8](https://en.wikipedia.org/wiki/UTF-8), opt-in for ZIP files.
    Utf8,

    /// [Codepage 437](https://en.wikipedia.org/wiki/Code_page_437), also known as
    /// OEM-US, PC-8, or DOS Latin US.
    ///
    /// This is the fallback if UTF-8 is not specified. It was the original
    /// encoding of the zip format.
    Cp437,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Encoding as T;
        match self {
            T::Utf8 => write!(f, "utf-8"),
            T::Cp437 => write!(f, "cp-437"),
        }
    }
}

/// Errors encountered while converting text to UTF-8.
#[derive(Debug)]
pub enum DecodingError {
    /// Text claimed to be UTF-8, but wasn't (as far as we can tell).
    Utf8Error(std::str::Utf8Error),
}

impl From<std::str::Utf8Error> for DecodingError {
    fn from(e: std::str::Utf8Error) -> Self {
        DecodingError::Utf8Error(e)
    }
}

impl fmt::Display for DecodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utf8Error(utf8) => write!(f, "invalid utf-8: {utf8}"),
        }
    }
}

impl std::error::Error for DecodingError {}

impl Encoding {
    /// Pick the encoding for an entry from its general-purpose flags and
    /// name bytes. The EFS flag (bit 11) opts into UTF-8; we also require
    /// the bytes to actually validate, since some writers set the flag
    /// carelessly.
    pub fn detect(name: &[u8], flags: u16) -> Self {
        let efs = flags & 0x800 != 0;
        if efs && detect_utf8(name).0 {
            Encoding::Utf8
        } else if !efs && detect_utf8(name) == (true, false) {
            // plain single-byte runes that mean the same thing in both
            Encoding::Utf8
        } else {
            Encoding::Cp437
        }
    }

    pub(crate) fn decode(&self, i: &[u8]) -> Result<String, DecodingError> {
        match self {
            Encoding::Utf8 => {
                let s = std::str::from_utf8(i)?;
                Ok(s.to_string())
            }
            Encoding::Cp437 => Ok(oem_cp::decode_string_complete_table(
                i,
                &oem_cp::code_table::DECODING_TABLE_CP437,
            )),
        }
    }
}

// detect_utf8 reports whether s is a valid UTF-8 string, and whether the string
// must be considered UTF-8 encoding (i.e., not compatible with CP-437, ASCII,
// or any other common encoding).
pub(crate) fn detect_utf8(input: &[u8]) -> (bool, bool) {
    match std::str::from_utf8(input) {
        Err(_) => {
            // not valid utf-8
            (false, false)
        }
        Ok(s) => {
            let mut require = false;

            // Officially, ZIP uses CP-437, but many readers use the system's
            // local character encoding. Most encoding are compatible with a large
            // subset of CP-437, which itself is ASCII-like.
            //
            // Forbid 0x7e and 0x5c since EUC-KR and Shift-JIS replace those
            // characters with localized currency and overline characters.
            for c in s.chars() {
                if c < 0x20 as char || c > 0x7d as char || c == 0x5c as char {
                    require = true
                }
            }
            (true, require)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_decodes_either_way() {
        assert_eq!(Encoding::detect(b"META-INF/MANIFEST.MF", 0), Encoding::Utf8);
        assert_eq!(
            Encoding::Utf8.decode(b"META-INF/MANIFEST.MF").unwrap(),
            "META-INF/MANIFEST.MF"
        );
    }

    #[test]
    fn efs_flag_opts_into_utf8() {
        let name = "r\u{e9}sum\u{e9}.txt".as_bytes();
        assert_eq!(Encoding::detect(name, 0x800), Encoding::Utf8);
        // without the flag, multi-byte runes fall back to cp-437
        assert_eq!(Encoding::detect(name, 0), Encoding::Cp437);
    }

    #[test]
    fn invalid_utf8_falls_back_even_with_flag() {
        assert_eq!(Encoding::detect(&[0x66, 0xFF, 0x6F], 0x800), Encoding::Cp437);
    }
}
