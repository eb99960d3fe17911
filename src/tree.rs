//! In-memory box tree
//!
//! The movie box is parsed into a tree of owned nodes, edited, and written
//! back. Sizes are never stored; they are recomputed bottom-up whenever a
//! node is measured or serialized, so edits cannot leave a stale size behind.

use crate::{
    box_type::BoxType,
    error::{Error, Result},
    header::{BoxHeader, HEADER_SIZE},
    metadata::TypedValue,
};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Write};
use tracing::debug;

/// Nesting limit for parsing; real movie boxes stay far below it
const MAX_DEPTH: usize = 32;

/// Content of a box
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    /// Ordered child boxes, optionally preceded by a version/flags word
    Container {
        version_flags: Option<u32>,
        children: Vec<BoxNode>,
        /// Zero bytes after the last child, too short to be a box (the
        /// QuickTime 32-bit `udta` terminator); written back verbatim
        trailer: Vec<u8>,
    },
    /// Opaque payload copied verbatim
    Leaf(Vec<u8>),
    /// Typed metadata value of a `data` box
    Value(TypedValue),
}

/// One box and everything below it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoxNode {
    pub box_type: BoxType,
    pub payload: Payload,
}

/// What the parser expects to find in a region
#[derive(Clone, Copy)]
enum Context {
    Plain,
    /// Children of `ilst`: every child is a tag item
    ItemList,
    /// Children of a tag item: `data` boxes carry values
    Item(BoxType),
}

impl BoxNode {
    /// An empty plain container
    pub fn container(box_type: BoxType) -> Self {
        Self {
            box_type,
            payload: Payload::Container {
                version_flags: None,
                children: Vec::new(),
                trailer: Vec::new(),
            },
        }
    }

    /// An empty container with a version/flags prefix (a "full box")
    pub fn full_container(box_type: BoxType, version: u8, flags: u32) -> Self {
        Self {
            box_type,
            payload: Payload::Container {
                version_flags: Some(((version as u32) << 24) | (flags & 0x00FF_FFFF)),
                children: Vec::new(),
                trailer: Vec::new(),
            },
        }
    }

    pub fn leaf(box_type: BoxType, data: Vec<u8>) -> Self {
        Self {
            box_type,
            payload: Payload::Leaf(data),
        }
    }

    /// A `data` box holding `value`
    pub fn data(value: TypedValue) -> Self {
        Self {
            box_type: BoxType::DataBox,
            payload: Payload::Value(value),
        }
    }

    /// A tag item (`©nam`, `covr`, ...) holding exactly one `data` box
    pub fn tag(box_type: BoxType, value: TypedValue) -> Self {
        Self {
            box_type,
            payload: Payload::Container {
                version_flags: None,
                children: vec![BoxNode::data(value)],
                trailer: Vec::new(),
            },
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self.payload, Payload::Container { .. })
    }

    /// Child boxes; empty for leaves and values
    pub fn children(&self) -> &[BoxNode] {
        match &self.payload {
            Payload::Container { children, .. } => children,
            _ => &[],
        }
    }

    pub fn find_child(&self, box_type: BoxType) -> Option<&BoxNode> {
        self.children().iter().find(|c| c.box_type == box_type)
    }

    pub fn find_child_mut(&mut self, box_type: BoxType) -> Option<&mut BoxNode> {
        match &mut self.payload {
            Payload::Container { children, .. } => {
                children.iter_mut().find(|c| c.box_type == box_type)
            }
            _ => None,
        }
    }

    /// Follow a chain of first-match child lookups
    pub fn find_path(&self, path: &[BoxType]) -> Option<&BoxNode> {
        path.iter()
            .try_fold(self, |node, box_type| node.find_child(*box_type))
    }

    /// Append `child` as the last child and return it
    pub fn add_child(&mut self, child: BoxNode) -> Result<&mut BoxNode> {
        let box_type = self.box_type;
        match &mut self.payload {
            Payload::Container { children, .. } => {
                children.push(child);
                let last = children.len() - 1;
                Ok(&mut children[last])
            }
            _ => Err(Error::InvalidFormat(format!(
                "{} box is not a container",
                box_type
            ))),
        }
    }

    /// Insert `child` at `index` (clamped to the child count)
    pub fn insert_child(&mut self, index: usize, child: BoxNode) -> Result<&mut BoxNode> {
        let box_type = self.box_type;
        match &mut self.payload {
            Payload::Container { children, .. } => {
                let index = index.min(children.len());
                children.insert(index, child);
                Ok(&mut children[index])
            }
            _ => Err(Error::InvalidFormat(format!(
                "{} box is not a container",
                box_type
            ))),
        }
    }

    /// Remove every child of the given type, returning how many were removed
    pub fn delete_child(&mut self, box_type: BoxType) -> usize {
        match &mut self.payload {
            Payload::Container { children, .. } => {
                let before = children.len();
                children.retain(|c| c.box_type != box_type);
                before - children.len()
            }
            _ => 0,
        }
    }

    /// Return the child of the given type, appending `make()` if absent
    pub fn child_or_insert_with(
        &mut self,
        box_type: BoxType,
        make: impl FnOnce() -> BoxNode,
    ) -> Result<&mut BoxNode> {
        let box_name = self.box_type;
        match &mut self.payload {
            Payload::Container { children, .. } => {
                let index = match children.iter().position(|c| c.box_type == box_type) {
                    Some(index) => index,
                    None => {
                        children.push(make());
                        children.len() - 1
                    }
                };
                Ok(&mut children[index])
            }
            _ => Err(Error::InvalidFormat(format!(
                "{} box is not a container",
                box_name
            ))),
        }
    }

    /// Visit this node and all descendants depth-first
    pub fn visit_mut<F>(&mut self, f: &mut F) -> Result<()>
    where
        F: FnMut(&mut BoxNode) -> Result<()>,
    {
        f(self)?;
        if let Payload::Container { children, .. } = &mut self.payload {
            for child in children {
                child.visit_mut(f)?;
            }
        }
        Ok(())
    }

    fn payload_len(&self) -> u64 {
        match &self.payload {
            Payload::Container {
                version_flags,
                children,
                trailer,
            } => {
                let prefix = if version_flags.is_some() { 4 } else { 0 };
                prefix + children.iter().map(BoxNode::size).sum::<u64>() + trailer.len() as u64
            }
            Payload::Leaf(data) => data.len() as u64,
            Payload::Value(value) => value.payload_len(),
        }
    }

    /// Total serialized size including the header
    pub fn size(&self) -> u64 {
        BoxHeader::for_payload(self.box_type, self.payload_len()).size
    }

    /// Write this box and its children, returning the bytes written
    pub fn serialize_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<u64> {
        let header = BoxHeader::for_payload(self.box_type, self.payload_len());
        header.write(writer)?;

        match &self.payload {
            Payload::Container {
                version_flags,
                children,
                trailer,
            } => {
                if let Some(vf) = version_flags {
                    writer.write_u32::<BigEndian>(*vf)?;
                }
                for child in children {
                    child.serialize_to(writer)?;
                }
                writer.write_all(trailer)?;
            }
            Payload::Leaf(data) => writer.write_all(data)?,
            Payload::Value(value) => value.encode(writer)?,
        }

        Ok(header.size)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.size() as usize);
        self.serialize_to(&mut out)?;
        Ok(out)
    }

    /// Parse one box spanning all of `bytes`
    ///
    /// `base` is the file offset of `bytes[0]`, used in error reports.
    pub fn parse(bytes: &[u8], base: u64) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let end = bytes.len() as u64;
        let node = parse_node(&mut cursor, end, Context::Plain, base, 0)?;
        if cursor.position() != end {
            return Err(Error::invalid_box(
                base + cursor.position(),
                "trailing bytes after box",
            ));
        }
        Ok(node)
    }
}

fn rebase(err: Error, base: u64) -> Error {
    match err {
        Error::InvalidBox { offset, reason } => Error::InvalidBox {
            offset: offset + base,
            reason,
        },
        other => other,
    }
}

fn parse_node<'a>(
    cursor: &mut Cursor<&'a [u8]>,
    end: u64,
    context: Context,
    base: u64,
    depth: usize,
) -> Result<BoxNode> {
    let start = cursor.position();
    if depth > MAX_DEPTH {
        return Err(Error::invalid_box(base + start, "boxes nested too deeply"));
    }

    let header = BoxHeader::read(cursor, end).map_err(|e| rebase(e, base))?;
    let payload_start = start + header.header_len;
    let box_end = start + header.size;
    let bytes: &'a [u8] = *cursor.get_ref();
    let payload_bytes = &bytes[payload_start as usize..box_end as usize];

    let node = match context {
        Context::Item(item) if header.box_type == BoxType::DataBox => BoxNode::data(
            TypedValue::decode(payload_bytes, item, base + start)?,
        ),
        Context::ItemList => {
            // Tag items are containers by convention; keep anything odd verbatim
            let parsed = parse_container(
                cursor,
                header.box_type,
                payload_start,
                box_end,
                Context::Item(header.box_type),
                base,
                depth,
            );
            match parsed {
                Ok(node) => node,
                Err(err) => {
                    debug!(
                        box_type = %header.box_type,
                        error = %err,
                        "keeping unparsable tag item as opaque"
                    );
                    BoxNode::leaf(header.box_type, payload_bytes.to_vec())
                }
            }
        }
        _ if header.box_type == BoxType::IlstBox => parse_container(
            cursor,
            header.box_type,
            payload_start,
            box_end,
            Context::ItemList,
            base,
            depth,
        )?,
        _ if header.box_type.is_container() => parse_container(
            cursor,
            header.box_type,
            payload_start,
            box_end,
            Context::Plain,
            base,
            depth,
        )?,
        _ => BoxNode::leaf(header.box_type, payload_bytes.to_vec()),
    };

    cursor.set_position(box_end);
    Ok(node)
}

fn parse_container<'a>(
    cursor: &mut Cursor<&'a [u8]>,
    box_type: BoxType,
    payload_start: u64,
    box_end: u64,
    child_context: Context,
    base: u64,
    depth: usize,
) -> Result<BoxNode> {
    let bytes: &'a [u8] = *cursor.get_ref();
    let payload = &bytes[payload_start as usize..box_end as usize];

    // ISO `meta` is a full box; the QuickTime flavour starts straight with
    // its first child (usually `hdlr`, sometimes `keys` or `ilst`).
    let quicktime_hdlr = payload.len() >= 8 && &payload[4..8] == b"hdlr";
    if box_type == BoxType::MetaBox && !quicktime_hdlr {
        if payload.len() < 4 {
            return Err(Error::invalid_box(
                base + payload_start,
                "meta box too short for version and flags",
            ));
        }
        let version_flags = (&payload[..4]).read_u32::<BigEndian>()?;
        let parsed = parse_children(cursor, payload_start + 4, box_end, child_context, base, depth);
        match parsed {
            Ok((children, trailer)) => {
                return Ok(BoxNode {
                    box_type,
                    payload: Payload::Container {
                        version_flags: Some(version_flags),
                        children,
                        trailer,
                    },
                })
            }
            Err(err) if starts_with_box_header(payload) => {
                debug!(error = %err, "meta is not a full box; reading it as QuickTime meta");
            }
            Err(err) => return Err(err),
        }
    }

    let (children, trailer) =
        parse_children(cursor, payload_start, box_end, child_context, base, depth)?;
    Ok(BoxNode {
        box_type,
        payload: Payload::Container {
            version_flags: None,
            children,
            trailer,
        },
    })
}

/// Parse the child boxes in `start..box_end`
///
/// Fewer than 8 zero bytes at the end are returned as the trailer instead of
/// being read as a header.
fn parse_children<'a>(
    cursor: &mut Cursor<&'a [u8]>,
    start: u64,
    box_end: u64,
    context: Context,
    base: u64,
    depth: usize,
) -> Result<(Vec<BoxNode>, Vec<u8>)> {
    let bytes: &'a [u8] = *cursor.get_ref();
    let mut pos = start;
    let mut children = Vec::new();

    while pos < box_end {
        let rest = &bytes[pos as usize..box_end as usize];
        if (rest.len() as u64) < HEADER_SIZE && rest.iter().all(|b| *b == 0) {
            return Ok((children, rest.to_vec()));
        }
        cursor.set_position(pos);
        children.push(parse_node(cursor, box_end, context, base, depth + 1)?);
        pos = cursor.position();
    }

    Ok((children, Vec::new()))
}

/// True when `payload` begins with a child box header that fits inside it
fn starts_with_box_header(payload: &[u8]) -> bool {
    if payload.len() < HEADER_SIZE as usize {
        return false;
    }
    let declared = (&payload[..4]).read_u32::<BigEndian>().unwrap_or(0) as usize;
    declared >= HEADER_SIZE as usize && declared <= payload.len()
}
