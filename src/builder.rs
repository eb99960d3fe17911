//! Metadata sub-tree builder
//!
//! Locates or creates `moov/udta/meta/ilst` and upserts tag items:
//!
//! ```text
//! moov
//!   └── udta
//!       └── meta (full box)
//!           ├── hdlr (handler 'mdir')
//!           └── ilst
//!               ├── ©nam ── data (UTF-8)
//!               ├── ©ART ── data (UTF-8)
//!               ├── ©alb ── data (UTF-8)
//!               ├── ©day ── data (UTF-8)
//!               └── covr ── data (JPEG | PNG)
//! ```

use crate::{
    box_type::BoxType,
    error::{Error, Result},
    metadata::{ImageFormat, MetadataValue, Tags, TypedValue},
    tree::{BoxNode, Payload},
};
use tracing::debug;

const ILST_PATH: [BoxType; 3] = [BoxType::UdtaBox, BoxType::MetaBox, BoxType::IlstBox];

/// Handler reference declaring the iTunes metadata dialect
fn metadata_handler() -> BoxNode {
    let mut payload = Vec::with_capacity(25);
    payload.extend_from_slice(&[0, 0, 0, 0]); // version and flags
    payload.extend_from_slice(&[0, 0, 0, 0]); // pre_defined
    payload.extend_from_slice(b"mdir"); // handler_type
    payload.extend_from_slice(&[0u8; 12]); // reserved
    payload.push(0); // empty name
    BoxNode::leaf(BoxType::HdlrBox, payload)
}

fn metadata_container() -> BoxNode {
    BoxNode {
        box_type: BoxType::MetaBox,
        payload: Payload::Container {
            version_flags: Some(0),
            children: vec![metadata_handler()],
            trailer: Vec::new(),
        },
    }
}

/// Find or create the `ilst` box under `moov`
pub fn item_list_mut(moov: &mut BoxNode) -> Result<&mut BoxNode> {
    if moov.box_type != BoxType::MoovBox {
        return Err(Error::InvalidFormat(format!(
            "expected a moov box, got {}",
            moov.box_type
        )));
    }

    let udta = moov.child_or_insert_with(BoxType::UdtaBox, || {
        debug!("creating udta box");
        BoxNode::container(BoxType::UdtaBox)
    })?;

    let meta = udta.child_or_insert_with(BoxType::MetaBox, || {
        debug!("creating meta box with hdlr");
        metadata_container()
    })?;
    if meta.find_child(BoxType::HdlrBox).is_none() {
        debug!("adding missing hdlr to existing meta box");
        meta.insert_child(0, metadata_handler())?;
    }

    meta.child_or_insert_with(BoxType::IlstBox, || {
        debug!("creating ilst box");
        BoxNode::container(BoxType::IlstBox)
    })
}

/// Replace every `item` tag in `ilst` with a single one holding `value`
fn upsert(ilst: &mut BoxNode, item: BoxType, value: TypedValue) -> Result<()> {
    let removed = ilst.delete_child(item);
    debug!(item = %item, replaced = removed, "writing tag");
    ilst.add_child(BoxNode::tag(item, value))?;
    Ok(())
}

/// Apply `tags` to a movie box tree, returning the number of items written
///
/// Present, non-empty fields replace any existing item of the same type;
/// absent or empty fields leave existing items alone.
pub fn apply_tags(moov: &mut BoxNode, tags: &Tags) -> Result<usize> {
    let ilst = item_list_mut(moov)?;
    let mut written = 0;

    for (item, value) in tags.text_fields() {
        if let Some(text) = value.filter(|t| !t.is_empty()) {
            upsert(ilst, item, TypedValue::text(text))?;
            written += 1;
        }
    }

    if let Some(artwork) = tags.artwork.as_deref().filter(|a| !a.is_empty()) {
        let value = TypedValue::image(artwork);
        debug!(
            bytes = artwork.len(),
            format = ?ImageFormat::sniff(artwork),
            "writing cover art"
        );
        upsert(ilst, BoxType::CovrBox, value)?;
        written += 1;
    }

    Ok(written)
}

/// First value stored under `item`, if any
pub fn item_value(moov: &BoxNode, item: BoxType) -> Option<&MetadataValue> {
    moov.find_path(&ILST_PATH)?
        .find_child(item)?
        .children()
        .iter()
        .find_map(|child| match &child.payload {
            Payload::Value(v) if child.box_type == BoxType::DataBox => Some(&v.value),
            _ => None,
        })
}

/// Cover art stored under `covr`, with the format it is labelled as
pub fn cover_art(moov: &BoxNode) -> Option<(ImageFormat, &[u8])> {
    match item_value(moov, BoxType::CovrBox)? {
        MetadataValue::Image { format, data } => Some((*format, data.as_slice())),
        _ => None,
    }
}

/// Read the fields this crate writes back out of a movie box tree
pub fn read_tags(moov: &BoxNode) -> Tags {
    let text = |item| {
        item_value(moov, item)
            .and_then(MetadataValue::as_text)
            .map(str::to_string)
    };

    Tags {
        title: text(BoxType::CNamBox),
        artist: text(BoxType::CArtBox),
        album: text(BoxType::CAlbBox),
        year: text(BoxType::CDayBox),
        artwork: item_value(moov, BoxType::CovrBox).map(|v| v.bytes().to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PNG: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    fn bare_moov() -> BoxNode {
        let mut moov = BoxNode::container(BoxType::MoovBox);
        moov.add_child(BoxNode::leaf(BoxType::MvhdBox, vec![0u8; 100]))
            .unwrap();
        moov
    }

    fn ilst(moov: &BoxNode) -> &BoxNode {
        moov.find_path(&ILST_PATH).unwrap()
    }

    fn count(moov: &BoxNode, item: BoxType) -> usize {
        ilst(moov)
            .children()
            .iter()
            .filter(|c| c.box_type == item)
            .count()
    }

    #[test]
    fn test_creates_hierarchy_once() {
        let mut moov = bare_moov();
        apply_tags(&mut moov, &Tags::new().title("A")).unwrap();
        apply_tags(&mut moov, &Tags::new().title("B")).unwrap();

        assert_eq!(moov.children().len(), 2);
        let udta = moov.find_child(BoxType::UdtaBox).unwrap();
        assert_eq!(udta.children().len(), 1);
        let meta = udta.find_child(BoxType::MetaBox).unwrap();
        let kinds: Vec<_> = meta.children().iter().map(|c| c.box_type).collect();
        assert_eq!(kinds, vec![BoxType::HdlrBox, BoxType::IlstBox]);

        let hdlr = meta.find_child(BoxType::HdlrBox).unwrap();
        match &hdlr.payload {
            Payload::Leaf(data) => assert_eq!(&data[8..12], b"mdir"),
            other => panic!("unexpected hdlr payload {:?}", other),
        }
        assert_eq!(hdlr.size(), 33);
    }

    #[test]
    fn test_upsert_replaces_instead_of_appending() {
        let mut moov = bare_moov();
        let tags = Tags::new()
            .title("Café")
            .artist("Artist")
            .album("Album")
            .year("2024")
            .artwork(vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3]);

        assert_eq!(apply_tags(&mut moov, &tags).unwrap(), 5);
        assert_eq!(apply_tags(&mut moov, &tags).unwrap(), 5);

        for item in [
            BoxType::CNamBox,
            BoxType::CArtBox,
            BoxType::CAlbBox,
            BoxType::CDayBox,
            BoxType::CovrBox,
        ] {
            assert_eq!(count(&moov, item), 1, "{}", item);
        }
        assert_eq!(read_tags(&moov), tags);
    }

    #[test]
    fn test_absent_and_empty_fields_leave_existing_tags() {
        let mut moov = bare_moov();
        apply_tags(&mut moov, &Tags::new().title("Keep me").year("1999")).unwrap();

        let written = apply_tags(&mut moov, &Tags::new().title("").artwork(PNG.to_vec())).unwrap();
        assert_eq!(written, 1);

        let read = read_tags(&moov);
        assert_eq!(read.title.as_deref(), Some("Keep me"));
        assert_eq!(read.year.as_deref(), Some("1999"));
        assert_eq!(count(&moov, BoxType::CovrBox), 1);
    }

    #[test]
    fn test_cover_art_label_follows_sniff() {
        let mut moov = bare_moov();
        apply_tags(&mut moov, &Tags::new().artwork(PNG.to_vec())).unwrap();
        assert_eq!(cover_art(&moov).unwrap().0, ImageFormat::Png);

        apply_tags(&mut moov, &Tags::new().artwork(vec![0xFF, 0xD8, 0xFF])).unwrap();
        let (format, data) = cover_art(&moov).unwrap();
        assert_eq!(format, ImageFormat::Jpeg);
        assert_eq!(data, &[0xFF, 0xD8, 0xFF]);
        assert_eq!(count(&moov, BoxType::CovrBox), 1);
    }

    #[test]
    fn test_existing_meta_without_handler_gets_one() {
        let mut moov = bare_moov();
        let udta = moov.add_child(BoxNode::container(BoxType::UdtaBox)).unwrap();
        udta.add_child(BoxNode::full_container(BoxType::MetaBox, 0, 0))
            .unwrap();

        apply_tags(&mut moov, &Tags::new().album("X")).unwrap();
        let meta = moov
            .find_path(&[BoxType::UdtaBox, BoxType::MetaBox])
            .unwrap();
        assert_eq!(meta.children()[0].box_type, BoxType::HdlrBox);
        assert_eq!(
            meta.children()
                .iter()
                .filter(|c| c.box_type == BoxType::HdlrBox)
                .count(),
            1
        );
    }

    #[test]
    fn test_other_items_survive() {
        let mut moov = bare_moov();
        let list = item_list_mut(&mut moov).unwrap();
        list.add_child(BoxNode::leaf(BoxType::UnknownBox(0x74726b6e), vec![0; 24]))
            .unwrap();

        apply_tags(&mut moov, &Tags::new().title("T")).unwrap();
        let kinds: Vec<_> = ilst(&moov).children().iter().map(|c| c.box_type).collect();
        assert_eq!(kinds, vec![BoxType::UnknownBox(0x74726b6e), BoxType::CNamBox]);
    }

    #[test]
    fn test_rejects_non_movie_root() {
        let mut node = BoxNode::container(BoxType::TrakBox);
        assert!(apply_tags(&mut node, &Tags::new().title("x")).is_err());
    }
}
