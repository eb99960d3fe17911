//! Top-level box scanner
//!
//! One linear pass over the file that records every top-level box as an
//! offset/length entry. Nothing but headers is read; payloads are skipped by
//! seeking.

use crate::{
    box_type::BoxType,
    error::{Error, Result},
    header::BoxHeader,
    range::ByteRange,
};
use atree::{Arena, Token};
use std::io::{Read, Seek, SeekFrom};
use tracing::debug;

/// Location of one top-level box
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoxEntry {
    pub box_type: BoxType,
    /// Offset of the first header byte
    pub offset: u64,
    /// Total size including the header
    pub size: u64,
    /// Header length (8, or 16 for the 64-bit form)
    pub header_len: u64,
}

impl BoxEntry {
    pub fn range(&self) -> ByteRange {
        ByteRange::new(self.offset, self.size)
    }
}

/// Ordered index of the top-level boxes of a file
///
/// Entries live in an arena under a synthetic root spanning the whole file.
pub struct BoxIndex {
    arena: Arena<BoxEntry>,
    root: Token,
    movie: Option<Token>,
    file_size: u64,
}

impl BoxIndex {
    /// Scan all top-level boxes of `reader`
    ///
    /// Fails if any header is unreadable or a box does not fit in the file;
    /// a partial index is never returned. A missing movie box is not an error
    /// here, see [`BoxIndex::movie_box`].
    pub fn scan<R: Read + Seek + ?Sized>(reader: &mut R) -> Result<Self> {
        let file_size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        let root_entry = BoxEntry {
            box_type: BoxType::UnknownBox(0),
            offset: 0,
            size: file_size,
            header_len: 0,
        };
        let (mut arena, root) = Arena::with_data(root_entry);
        let mut movie = None;

        let mut pos = 0u64;
        while pos < file_size {
            reader.seek(SeekFrom::Start(pos))?;
            let header = BoxHeader::read(reader, file_size)?;

            let entry = BoxEntry {
                box_type: header.box_type,
                offset: pos,
                size: header.size,
                header_len: header.header_len,
            };
            debug!(
                box_type = %entry.box_type,
                offset = entry.offset,
                size = entry.size,
                "top-level box"
            );

            let token = root.append(&mut arena, entry);
            if header.box_type == BoxType::MoovBox && movie.is_none() {
                movie = Some(token);
            }

            pos += header.size;
        }

        let index = Self {
            arena,
            root,
            movie,
            file_size,
        };
        debug!(
            boxes = index.len(),
            file_size,
            has_movie = index.movie.is_some(),
            "scanned top-level boxes"
        );
        Ok(index)
    }

    /// Top-level entries in file order
    pub fn entries(&self) -> impl Iterator<Item = &BoxEntry> + '_ {
        self.root.children(&self.arena).map(|node| &node.data)
    }

    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }

    /// Total length of the scanned stream
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// The first top-level movie box, if any
    pub fn movie_box(&self) -> Option<&BoxEntry> {
        self.movie.map(|token| &self.arena[token].data)
    }

    /// Like [`BoxIndex::movie_box`] but reports absence as a format error
    pub fn require_movie_box(&self) -> Result<&BoxEntry> {
        self.movie_box().ok_or(Error::MissingMovieBox)
    }

    /// Number of top-level boxes of the given type
    pub fn count(&self, box_type: BoxType) -> usize {
        self.entries().filter(|e| e.box_type == box_type).count()
    }

    /// True when the file carries movie fragments (`moof`)
    pub fn is_fragmented(&self) -> bool {
        self.count(BoxType::MoofBox) > 0
    }
}
