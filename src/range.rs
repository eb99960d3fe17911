//! Byte ranges and bounded chunked copying

use crate::error::Result;
use std::io::{Read, Seek, SeekFrom, Write};

/// A byte range in a file (offset and size)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// Offset from start of file
    pub offset: u64,
    /// Size in bytes
    pub size: u64,
}

impl ByteRange {
    /// Create a new byte range
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// Get the end offset of this range
    pub fn end_offset(&self) -> u64 {
        self.offset + self.size
    }

    /// Check if this range is immediately followed by another (contiguous)
    pub fn is_contiguous_with(&self, other: &ByteRange) -> bool {
        self.end_offset() == other.offset
    }
}

/// Transfer buffer size for streaming copies (64KB)
pub const DEFAULT_CHUNK_SIZE: usize = 65536;

/// Maximum size of a movie box that will be loaded and rebuilt (256 MB)
///
/// The movie box is the only region held in memory. Real audio files keep it
/// in the kilobyte to low megabyte range; anything past this limit is
/// rejected instead of allocated.
pub const MAX_MOVIE_BOX_SIZE: u64 = 256 * 1024 * 1024;

/// Copy exactly `range.size` bytes starting at `range.offset` to `writer`
///
/// `buffer` bounds memory use; its length is the chunk size.
pub(crate) fn copy_range<R: Read + Seek + ?Sized, W: Write + ?Sized>(
    source: &mut R,
    writer: &mut W,
    range: ByteRange,
    buffer: &mut [u8],
) -> Result<u64> {
    source.seek(SeekFrom::Start(range.offset))?;

    let mut remaining = range.size;
    while remaining > 0 {
        let to_read = remaining.min(buffer.len() as u64) as usize;
        source.read_exact(&mut buffer[..to_read])?;
        writer.write_all(&buffer[..to_read])?;
        remaining -= to_read as u64;
    }

    Ok(range.size)
}
