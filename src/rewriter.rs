//! Streaming container rewrite
//!
//! Top-level boxes are emitted in their original order. The movie box is
//! replaced by the serialized tree; every other box is copied verbatim through
//! a bounded buffer, so memory use is the movie box plus one chunk.

use crate::{
    box_type::BoxType,
    error::{Error, Result},
    options::WriteOptions,
    range::{copy_range, MAX_MOVIE_BOX_SIZE},
    scanner::{BoxEntry, BoxIndex},
    tree::{BoxNode, Payload},
};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, SeekFrom, Write};
use tracing::{debug, warn};

/// Outcome of a rewrite
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Tag items written into `ilst`
    pub tags_written: usize,
    /// Movie box size in the input
    pub movie_box_before: u64,
    /// Movie box size in the output
    pub movie_box_after: u64,
    /// `stco`/`co64` entries shifted to follow the movie box size change
    pub chunk_offsets_relocated: usize,
    /// Total bytes written to the output
    pub bytes_written: u64,
}

/// Load and parse the movie box described by `entry`
pub fn read_movie_box<R: Read + Seek + ?Sized>(
    source: &mut R,
    entry: &BoxEntry,
) -> Result<BoxNode> {
    if entry.size > MAX_MOVIE_BOX_SIZE {
        return Err(Error::MovieBoxTooLarge {
            size: entry.size,
            max: MAX_MOVIE_BOX_SIZE,
        });
    }

    source.seek(SeekFrom::Start(entry.offset))?;
    let mut bytes = vec![0u8; entry.size as usize];
    source.read_exact(&mut bytes)?;

    let moov = BoxNode::parse(&bytes, entry.offset)?;
    debug!(
        offset = entry.offset,
        size = entry.size,
        children = moov.children().len(),
        "parsed movie box"
    );
    Ok(moov)
}

/// Shift every `stco`/`co64` entry at or beyond `threshold` by `delta`
///
/// Returns the number of entries changed. Table lengths never change, so the
/// size of `moov` is the same before and after.
pub fn relocate_chunk_offsets(moov: &mut BoxNode, threshold: u64, delta: i64) -> Result<usize> {
    if delta == 0 {
        return Ok(0);
    }

    let mut relocated = 0;
    moov.visit_mut(&mut |node| {
        let wide = match node.box_type {
            BoxType::StcoBox => false,
            BoxType::Co64Box => true,
            _ => return Ok(()),
        };
        if let Payload::Leaf(table) = &mut node.payload {
            relocated += shift_table(table, wide, threshold, delta)?;
        }
        Ok(())
    })?;

    debug!(threshold, delta, relocated, "relocated chunk offsets");
    Ok(relocated)
}

fn shift_table(table: &mut [u8], wide: bool, threshold: u64, delta: i64) -> Result<usize> {
    let entry_len = if wide { 8 } else { 4 };
    if table.len() < 8 {
        return Err(Error::InvalidFormat(
            "chunk offset table shorter than its header".to_string(),
        ));
    }
    let count = (&table[4..8]).read_u32::<BigEndian>()? as usize;
    let needed = count
        .checked_mul(entry_len)
        .and_then(|n| n.checked_add(8))
        .filter(|n| *n <= table.len())
        .ok_or_else(|| {
            Error::InvalidFormat(format!(
                "chunk offset table declares {} entries but holds {} bytes",
                count,
                table.len()
            ))
        })?;

    let mut relocated = 0;
    for slot in table[8..needed].chunks_exact_mut(entry_len) {
        let offset = if wide {
            (&slot[..]).read_u64::<BigEndian>()?
        } else {
            (&slot[..]).read_u32::<BigEndian>()? as u64
        };
        if offset < threshold {
            continue;
        }

        let shifted = offset
            .checked_add_signed(delta)
            .ok_or(Error::OffsetOverflow { offset, delta })?;
        if wide {
            (&mut slot[..]).write_u64::<BigEndian>(shifted)?;
        } else {
            let narrow =
                u32::try_from(shifted).map_err(|_| Error::OffsetOverflow { offset, delta })?;
            (&mut slot[..]).write_u32::<BigEndian>(narrow)?;
        }
        relocated += 1;
    }
    Ok(relocated)
}

/// Write `source` to `writer`, substituting `moov` for the original movie box
///
/// Fails with [`Error::MissingMovieBox`] before writing anything when the
/// index has no movie box. When chunk-offset relocation is enabled `moov` is
/// adjusted in place before it is written.
pub fn rewrite<R, W>(
    source: &mut R,
    writer: &mut W,
    index: &BoxIndex,
    moov: &mut BoxNode,
    options: &WriteOptions,
) -> Result<WriteSummary>
where
    R: Read + Seek + ?Sized,
    W: Write + ?Sized,
{
    let movie = *index.require_movie_box()?;
    let new_size = moov.size();
    let delta = new_size as i64 - movie.size as i64;

    let mut summary = WriteSummary {
        movie_box_before: movie.size,
        movie_box_after: new_size,
        ..Default::default()
    };

    if options.relocate_chunk_offsets {
        summary.chunk_offsets_relocated =
            relocate_chunk_offsets(moov, movie.range().end_offset(), delta)?;
    } else if delta != 0 {
        warn!(delta, "movie box size changed; chunk offsets left untouched");
    }

    let mut buffer = vec![0u8; options.chunk_size.max(1)];
    for entry in index.entries() {
        let written = if entry.offset == movie.offset {
            moov.serialize_to(writer)?
        } else {
            copy_range(source, writer, entry.range(), &mut buffer)?
        };
        summary.bytes_written += written;
    }

    writer.flush()?;
    debug!(
        bytes = summary.bytes_written,
        movie_box_before = summary.movie_box_before,
        movie_box_after = summary.movie_box_after,
        "rewrite complete"
    );
    Ok(summary)
}
