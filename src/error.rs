//! Error types for mp4-meta-io

use std::{io, path::PathBuf};

/// Result type for mp4-meta-io operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while scanning, rebuilding or rewriting a file
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Source could not be opened or destination could not be created
    #[error("Cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// I/O error during a read or write
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file has no top-level movie (`moov`) box
    #[error("No movie box (moov) found")]
    MissingMovieBox,

    /// Invalid file format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// A box header or payload is malformed
    #[error("Invalid box at offset {offset}: {reason}")]
    InvalidBox { offset: u64, reason: String },

    /// The movie box is too large to be rebuilt in memory
    #[error("Movie box too large: {size} bytes (max: {max})")]
    MovieBoxTooLarge { size: u64, max: u64 },

    /// A relocated 32-bit chunk offset no longer fits
    #[error("Chunk offset {offset} shifted by {delta} does not fit in 32 bits")]
    OffsetOverflow { offset: u64, delta: i64 },

    /// Input and output resolve to the same path without atomic output
    #[error("Input and output are the same file: {}", .0.display())]
    SamePath(PathBuf),
}

impl Error {
    pub(crate) fn invalid_box(offset: u64, reason: impl Into<String>) -> Self {
        Error::InvalidBox {
            offset,
            reason: reason.into(),
        }
    }

    /// Coarse classification matching the boolean boundary's log categories
    pub fn category(&self) -> &'static str {
        match self {
            Error::Open { .. } | Error::SamePath(_) => "open",
            Error::Io(_) => "io",
            Error::MissingMovieBox
            | Error::InvalidFormat(_)
            | Error::InvalidBox { .. }
            | Error::MovieBoxTooLarge { .. }
            | Error::OffsetOverflow { .. } => "format",
        }
    }
}
