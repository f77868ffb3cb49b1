//! Winnow parsers for the on-disk ZIP records this engine touches: the
//! end-of-central-directory record, central directory file headers, local
//! file header prefixes, extra-field records, and the MS-DOS timestamp
//! encoding itself.
//!
//! All parsers are based off of the PKWARE appnote.txt.

mod date_time;
pub use date_time::*;

mod directory_header;
pub use directory_header::*;

mod eocd;
pub use eocd::*;

mod extra_field;
pub use extra_field::*;

mod local;
pub use local::*;

mod method;
pub use method::*;

mod raw;
pub use raw::*;
