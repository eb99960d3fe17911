//! Progressive-file passthrough
//!
//! A file that already carries a top-level movie box is copied verbatim.
//! Reassembling movie fragments into a single movie box is not attempted;
//! input without a movie box is reported as unsupported.

use crate::{
    box_type::BoxType,
    error::Result,
    options::WriteOptions,
    range::{copy_range, ByteRange},
    rewriter::read_movie_box,
    scanner::BoxIndex,
};
use std::io::{Read, Seek, Write};
use tracing::{debug, warn};

/// Copy `source` to `writer` if it has a parseable movie box, returning the
/// bytes copied
///
/// Fails before writing anything with [`crate::Error::MissingMovieBox`] when
/// there is no movie box, and with a format error when the top-level boxes do
/// not partition the stream or the movie box does not parse.
pub fn defragment<R, W>(source: &mut R, writer: &mut W, options: &WriteOptions) -> Result<u64>
where
    R: Read + Seek + ?Sized,
    W: Write + ?Sized,
{
    let index = check_progressive(source)?;
    copy_stream(source, writer, &index, options)
}

/// Index `source` and confirm it has a movie box that parses
pub(crate) fn check_progressive<R: Read + Seek + ?Sized>(source: &mut R) -> Result<BoxIndex> {
    let index = BoxIndex::scan(source)?;
    let movie = *index.require_movie_box()?;
    let moov = read_movie_box(source, &movie)?;

    if index.is_fragmented() {
        warn!(
            fragments = index.count(BoxType::MoofBox),
            "movie fragments present; copying them through unchanged"
        );
    }
    debug!(
        movie_offset = movie.offset,
        movie_size = movie.size,
        children = moov.children().len(),
        "progressive file"
    );
    Ok(index)
}

/// Copy the whole indexed stream through a bounded buffer
pub(crate) fn copy_stream<R, W>(
    source: &mut R,
    writer: &mut W,
    index: &BoxIndex,
    options: &WriteOptions,
) -> Result<u64>
where
    R: Read + Seek + ?Sized,
    W: Write + ?Sized,
{
    let mut buffer = vec![0u8; options.chunk_size.max(1)];
    let copied = copy_range(
        source,
        writer,
        ByteRange::new(0, index.file_size()),
        &mut buffer,
    )?;
    writer.flush()?;
    Ok(copied)
}
