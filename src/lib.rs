//! Streaming metadata embedding for MP4/M4A audio files.
//!
//! This crate writes iTunes-style tags (title, artist, album, year, cover art)
//! into ISO base media files and copies already-progressive files through
//! unchanged.
//!
//! # Design Principles
//!
//! - **Streaming**: Only the movie box is held in memory; everything else is
//!   copied through a fixed-size buffer
//! - **Byte preservation**: Boxes other than `moov` are written back verbatim
//! - **Sizes are derived**: The movie box is rebuilt as a tree and every size
//!   is recomputed on serialization
//! - **Non-destructive**: The input is never modified and failed writes leave
//!   no partial output behind
//!
//! # Quick Start
//!
//! ```no_run
//! use mp4_meta_io::{embed_metadata_with, read_tags, Tags, WriteOptions};
//!
//! # fn main() -> mp4_meta_io::Result<()> {
//! let tags = Tags::new()
//!     .title("Café")
//!     .artist("Somebody")
//!     .artwork(std::fs::read("cover.jpg")?);
//!
//! let summary = embed_metadata_with("in.m4a", "out.m4a", &tags, &WriteOptions::default())?;
//! println!("wrote {} tags, {} bytes", summary.tags_written, summary.bytes_written);
//!
//! assert_eq!(read_tags("out.m4a")?.title.as_deref(), Some("Café"));
//! # Ok(())
//! # }
//! ```
//!
//! # Boolean API
//!
//! [`embed_metadata`] and [`defragment_file`] report success as `bool` and log
//! the reason for a failure through `tracing`:
//!
//! ```no_run
//! use mp4_meta_io::{defragment_file, embed_metadata};
//!
//! let ok = embed_metadata("in.m4a", "out.m4a", None, Some("Title"), None, None, Some("2024"));
//! let copied = defragment_file("in.m4a", "progressive.m4a");
//! # let _ = (ok, copied);
//! ```
//!
//! # Stream API
//!
//! ```no_run
//! use mp4_meta_io::{embed, Tags, WriteOptions};
//! use std::fs::File;
//!
//! # fn main() -> mp4_meta_io::Result<()> {
//! let mut input = File::open("in.m4a")?;
//! let mut output = File::create("out.m4a")?;
//! embed(&mut input, &mut output, &Tags::new().album("Album"), &WriteOptions::default())?;
//! # Ok(())
//! # }
//! ```

mod box_type;
pub mod builder;
mod defrag;
mod error;
mod file;
mod header;
mod metadata;
mod options;
mod range;
pub mod rewriter;
mod scanner;
mod tree;

pub use box_type::BoxType;
pub use defrag::defragment;
pub use error::{Error, Result};
pub use file::{
    defragment_file, defragment_file_with, embed, embed_metadata, embed_metadata_with, read_tags,
};
pub use header::{BoxHeader, HEADER_SIZE, HEADER_SIZE_LARGE};
pub use metadata::{
    ImageFormat, MetadataValue, Tags, TypedValue, TYPE_IMPLICIT, TYPE_JPEG, TYPE_PNG, TYPE_UTF8,
};
pub use options::WriteOptions;
pub use range::{ByteRange, DEFAULT_CHUNK_SIZE, MAX_MOVIE_BOX_SIZE};
pub use rewriter::WriteSummary;
pub use scanner::{BoxEntry, BoxIndex};
pub use tree::{BoxNode, Payload};

// Test utilities - only compiled for tests or when explicitly enabled
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
