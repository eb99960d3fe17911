//! Box header codec
//!
//! A box starts with a 4 byte big-endian size and a 4 byte type. A size of 1
//! means a 64-bit size follows the type; a size of 0 means the box runs to the
//! end of its enclosing region (the file, for top-level boxes).

use crate::{
    box_type::BoxType,
    error::{Error, Result},
};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, Write};

/// 4 byte size + 4 byte type
pub const HEADER_SIZE: u64 = 8;
/// 4 byte size + 4 byte type + 8 byte large size
pub const HEADER_SIZE_LARGE: u64 = 16;

/// Parsed box header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoxHeader {
    pub box_type: BoxType,
    /// Total box size including this header, with size 0 already resolved
    pub size: u64,
    /// Bytes taken by the header itself (8 or 16)
    pub header_len: u64,
}

impl BoxHeader {
    /// Header for a box carrying `payload_len` bytes after the header
    ///
    /// Uses the 64-bit form only when the total does not fit in 32 bits.
    pub fn for_payload(box_type: BoxType, payload_len: u64) -> Self {
        let header_len = if payload_len + HEADER_SIZE > u32::MAX as u64 {
            HEADER_SIZE_LARGE
        } else {
            HEADER_SIZE
        };
        Self {
            box_type,
            size: header_len + payload_len,
            header_len,
        }
    }

    /// Read a header at the current position of `reader`
    ///
    /// `end` is the absolute end of the enclosing region; it resolves size 0
    /// and bounds every box so that children can never overrun their parent.
    pub fn read<R: Read + Seek + ?Sized>(reader: &mut R, end: u64) -> Result<Self> {
        let start = reader.stream_position()?;
        if start + HEADER_SIZE > end {
            return Err(Error::invalid_box(start, "truncated box header"));
        }

        let size32 = reader.read_u32::<BigEndian>()?;
        let box_type = BoxType::from(reader.read_u32::<BigEndian>()?);

        let (size, header_len) = match size32 {
            1 => {
                if start + HEADER_SIZE_LARGE > end {
                    return Err(Error::invalid_box(start, "truncated extended size"));
                }
                (reader.read_u64::<BigEndian>()?, HEADER_SIZE_LARGE)
            }
            // special case to indicate the box extends to the end of the region
            0 => (end - start, HEADER_SIZE),
            s => (s as u64, HEADER_SIZE),
        };

        if size < header_len {
            return Err(Error::invalid_box(
                start,
                format!("{} box size {} is smaller than its header", box_type, size),
            ));
        }
        match start.checked_add(size) {
            Some(box_end) if box_end <= end => {}
            _ => {
                return Err(Error::invalid_box(
                    start,
                    format!(
                        "{} box of {} bytes extends past end of region ({})",
                        box_type, size, end
                    ),
                ))
            }
        }

        Ok(Self {
            box_type,
            size,
            header_len,
        })
    }

    /// Size of the payload following the header
    pub fn payload_len(&self) -> u64 {
        self.size - self.header_len
    }

    /// Write this header, returning the number of bytes written
    pub fn write<W: Write + ?Sized>(&self, writer: &mut W) -> Result<u64> {
        if self.header_len == HEADER_SIZE_LARGE {
            writer.write_u32::<BigEndian>(1)?;
            writer.write_u32::<BigEndian>(self.box_type.into())?;
            writer.write_u64::<BigEndian>(self.size)?;
            Ok(HEADER_SIZE_LARGE)
        } else {
            writer.write_u32::<BigEndian>(self.size as u32)?;
            writer.write_u32::<BigEndian>(self.box_type.into())?;
            Ok(HEADER_SIZE)
        }
    }
}
