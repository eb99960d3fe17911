//! Typed metadata values and the `data` box payload codec
//!
//! Every iTunes-style tag box holds a `data` box whose payload is:
//!
//! ```text
//! type indicator (4, big-endian; high byte is the type set, 0 = well-known)
//! locale         (4)
//! value bytes    (rest)
//! ```

use crate::{
    box_type::BoxType,
    error::{Error, Result},
};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Write;

/// Well-known type indicator: implicit / binary
pub const TYPE_IMPLICIT: u32 = 0;
/// Well-known type indicator: UTF-8 text without terminator
pub const TYPE_UTF8: u32 = 1;
/// Well-known type indicator: JPEG image
pub const TYPE_JPEG: u32 = 13;
/// Well-known type indicator: PNG image
pub const TYPE_PNG: u32 = 14;

const PNG_SIGNATURE: [u8; 4] = [0x89, 0x50, 0x4E, 0x47];

/// Image subtype carried by a cover-art value
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    /// Binary image data without a declared format
    Generic,
}

impl ImageFormat {
    /// Type indicator written to the `data` box
    pub fn type_code(self) -> u32 {
        match self {
            ImageFormat::Jpeg => TYPE_JPEG,
            ImageFormat::Png => TYPE_PNG,
            ImageFormat::Generic => TYPE_IMPLICIT,
        }
    }

    /// Guess the format from the leading bytes
    ///
    /// Only the PNG signature is checked; everything else is assumed to be
    /// JPEG. This is a labelling heuristic, not a validator.
    pub fn sniff(data: &[u8]) -> Self {
        if data.starts_with(&PNG_SIGNATURE) {
            ImageFormat::Png
        } else {
            ImageFormat::Jpeg
        }
    }
}

/// A decoded metadata value
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MetadataValue {
    Text(String),
    Image { format: ImageFormat, data: Vec<u8> },
    /// Any other type indicator, or text that is not valid UTF-8, kept as-is
    Raw { type_code: u32, data: Vec<u8> },
}

impl MetadataValue {
    pub fn type_code(&self) -> u32 {
        match self {
            MetadataValue::Text(_) => TYPE_UTF8,
            MetadataValue::Image { format, .. } => format.type_code(),
            MetadataValue::Raw { type_code, .. } => *type_code,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            MetadataValue::Text(s) => s.as_bytes(),
            MetadataValue::Image { data, .. } | MetadataValue::Raw { data, .. } => data,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Payload of a `data` box: a value plus its locale field
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypedValue {
    pub value: MetadataValue,
    pub locale: u32,
}

impl TypedValue {
    pub fn new(value: MetadataValue) -> Self {
        Self { value, locale: 0 }
    }

    pub fn text(text: &str) -> Self {
        Self::new(MetadataValue::Text(text.to_string()))
    }

    /// Image value labelled with the sniffed format
    pub fn image(data: &[u8]) -> Self {
        Self::new(MetadataValue::Image {
            format: ImageFormat::sniff(data),
            data: data.to_vec(),
        })
    }

    /// Decode a `data` box payload
    ///
    /// `item` is the tag box holding the `data` box; implicit-typed payloads
    /// are only read as images under `covr`.
    pub fn decode(payload: &[u8], item: BoxType, offset: u64) -> Result<Self> {
        if payload.len() < 8 {
            return Err(Error::invalid_box(offset, "data box payload shorter than 8 bytes"));
        }
        let mut head = &payload[..8];
        let type_code = head.read_u32::<BigEndian>()?;
        let locale = head.read_u32::<BigEndian>()?;
        let data = &payload[8..];

        let value = match (type_code, item) {
            (TYPE_UTF8, _) => match std::str::from_utf8(data) {
                Ok(s) => MetadataValue::Text(s.to_string()),
                Err(_) => MetadataValue::Raw {
                    type_code,
                    data: data.to_vec(),
                },
            },
            (TYPE_JPEG, _) => MetadataValue::Image {
                format: ImageFormat::Jpeg,
                data: data.to_vec(),
            },
            (TYPE_PNG, _) => MetadataValue::Image {
                format: ImageFormat::Png,
                data: data.to_vec(),
            },
            (TYPE_IMPLICIT, BoxType::CovrBox) => MetadataValue::Image {
                format: ImageFormat::Generic,
                data: data.to_vec(),
            },
            _ => MetadataValue::Raw {
                type_code,
                data: data.to_vec(),
            },
        };

        Ok(Self { value, locale })
    }

    /// Payload length in bytes (without the box header)
    pub fn payload_len(&self) -> u64 {
        8 + self.value.bytes().len() as u64
    }

    /// Write the payload (without the box header)
    pub fn encode<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<BigEndian>(self.value.type_code())?;
        writer.write_u32::<BigEndian>(self.locale)?;
        writer.write_all(self.value.bytes())?;
        Ok(())
    }
}

/// Tag fields to embed
///
/// Absent or empty fields leave whatever the file already has untouched.
///
/// # Example
///
/// ```
/// use mp4_meta_io::Tags;
///
/// let tags = Tags::new()
///     .title("Café")
///     .artist("Somebody")
///     .artwork(vec![0xFF, 0xD8, 0xFF, 0xE0]);
/// assert!(!tags.is_empty());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<String>,
    pub artwork: Option<Vec<u8>>,
}

impl Tags {
    /// Create an empty set of tags (no changes)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn year(mut self, year: impl Into<String>) -> Self {
        self.year = Some(year.into());
        self
    }

    pub fn artwork(mut self, artwork: Vec<u8>) -> Self {
        self.artwork = Some(artwork);
        self
    }

    /// Text fields paired with the tag box type that stores them
    pub fn text_fields(&self) -> [(BoxType, Option<&str>); 4] {
        [
            (BoxType::CNamBox, self.title.as_deref()),
            (BoxType::CArtBox, self.artist.as_deref()),
            (BoxType::CAlbBox, self.album.as_deref()),
            (BoxType::CDayBox, self.year.as_deref()),
        ]
    }

    /// True when applying these tags would change nothing
    pub fn is_empty(&self) -> bool {
        self.text_fields()
            .iter()
            .all(|(_, v)| v.map_or(true, str::is_empty))
            && self.artwork.as_ref().map_or(true, Vec::is_empty)
    }
}
