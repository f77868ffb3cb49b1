#![warn(missing_docs)]

//! zipstamp preserves meaningful per-entry timestamps inside
//! aar/jar/war/zip archives across successive reproducible builds.
//!
//! A reproducible build stamps every archive entry with one declared
//! instant, which makes web crawlers, HTTP caches and sitemap generators
//! believe everything changed on every build. This crate compares the
//! fresh archive with the previous build's, entry by entry, and patches
//! the 4-byte DOS time fields — in both the local and central directory
//! headers, in place, without rewriting the archive — so that:
//!
//!   * unchanged content keeps its previous timestamp,
//!   * changed content moves forward (never backward) in time,
//!   * genuinely new content keeps the declared build timestamp.
//!
//! The entry points are [merge::merge_file] for one archive pair and
//! [directory::merge_directory] for two directories of artifacts paired by
//! [identifier::ArtifactIdentifier].
//!
//! ```no_run
//! use zipstamp::{merge::{merge_file, MergeOptions}, error::Error};
//!
//! fn main() -> Result<(), Error> {
//!     let options = MergeOptions::new("2023-09-07T01:38:34Z".parse().unwrap());
//!     merge_file(
//!         &options,
//!         "last-build/app-1.2.2.jar".as_ref(),
//!         "build/app-1.2.3.jar".as_ref(),
//!     )?;
//!     Ok(())
//! }
//! ```
//!
//! Logging goes through [tracing]'s `debug`/`info`/`warn` levels; messages
//! are only ever formatted when a subscriber listens, and never affect
//! control flow.

pub mod archive;
pub mod compare;
pub mod directory;
pub mod encoding;
pub mod error;
pub mod identifier;
pub mod merge;
pub mod parse;
pub mod patch;

pub use directory::merge_directory;
pub use error::Error;
pub use merge::{merge_file, merge_file_at, MergeOptions};
