//! Write options
//!
//! Defaults match what callers almost always want; use the builder methods to
//! override individual settings.

use crate::range::DEFAULT_CHUNK_SIZE;

/// Options controlling how an output file is produced
///
/// # Example
///
/// ```
/// use mp4_meta_io::WriteOptions;
///
/// let options = WriteOptions::new()
///     .chunk_size(16 * 1024)
///     .atomic(false);
/// assert_eq!(options.chunk_size, 16 * 1024);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Transfer buffer size for copying untouched boxes
    pub chunk_size: usize,

    /// Write to a temporary file next to the destination and rename it into
    /// place only after every byte has been written
    pub atomic: bool,

    /// Shift `stco`/`co64` chunk offsets that point past the movie box by
    /// the amount the movie box grew or shrank
    pub relocate_chunk_offsets: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            atomic: true,
            relocate_chunk_offsets: true,
        }
    }
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the transfer buffer size (clamped to at least 1 byte)
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn atomic(mut self, atomic: bool) -> Self {
        self.atomic = atomic;
        self
    }

    pub fn relocate_chunk_offsets(mut self, relocate: bool) -> Self {
        self.relocate_chunk_offsets = relocate;
        self
    }
}
