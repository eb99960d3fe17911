//! Test utilities for building MP4 fixtures.
//!
//! Fixtures are synthesized in memory from a few box builders, so the test
//! suite needs no binary files:
//! - Box builders (`ftyp_box`, `moov_box`, `mdat_box`, ...) for ad-hoc layouts
//! - Named fixtures registered with [`fixture_bytes`] / [`create_test_streams`]
//! - Real files from a custom directory (via `MP4_META_TEST_FIXTURES` env var)
//!
//! # Usage
//!
//! ```no_run
//! use mp4_meta_io::test_utils::*;
//!
//! # fn example() -> mp4_meta_io::Result<()> {
//! // Use predefined fixture constants
//! let bytes = fixture_bytes(PROGRESSIVE)?;
//!
//! // Or get test streams
//! let (format, input, output) = create_test_streams(TAGGED)?;
//!
//! // Or lay out boxes by hand
//! let file = build_file(&[ftyp_box(), moov_box(512), mdat_box(4096)]);
//! # Ok(())
//! # }
//! ```

use std::{
    collections::HashMap,
    fs,
    io::Cursor,
    path::PathBuf,
    sync::LazyLock,
};

use crate::{
    box_type::BoxType,
    tree::{BoxNode, Payload},
    Error, Result,
};

/// Type alias for test stream tuples: (format, input_cursor, output_cursor)
pub type TestStreams = (&'static str, Cursor<Vec<u8>>, Cursor<Vec<u8>>);

type FixtureBuilder = fn() -> Vec<u8>;

/// Macro to define fixtures backed by builder functions
macro_rules! define_fixtures {
    ($($name:ident => ($file:expr, $builder:path)),* $(,)?) => {
        $(
            #[allow(dead_code)]
            pub const $name: &str = $file;
        )*

        static SYNTHETIC_FIXTURES: LazyLock<HashMap<&'static str, FixtureBuilder>> =
            LazyLock::new(|| {
                let mut map: HashMap<&'static str, FixtureBuilder> = HashMap::new();
                $(
                    map.insert($file, $builder as FixtureBuilder);
                )*
                map
            });

        /// Get the synthetic fixtures registry
        pub fn get_registry() -> &'static HashMap<&'static str, FixtureBuilder> {
            &SYNTHETIC_FIXTURES
        }

        /// List all defined fixtures
        pub fn list_all_fixtures() -> Vec<&'static str> {
            vec![$($file),*]
        }
    };
}

define_fixtures!(
    PROGRESSIVE => ("progressive.m4a", progressive_file),     // ftyp, moov, mdat
    TAGGED => ("tagged.m4a", tagged_file),                    // ilst with title, year, trkn
    CHUNK_OFFSETS => ("chunk_offsets.m4a", chunk_offset_file), // stco/co64 pointing into mdat
    FRAGMENTED => ("fragmented.m4a", fragmented_file),        // moof + mdat, no moov
    SCENARIO => ("scenario.m4a", scenario_file),              // ftyp 32B, moov 9000B, mdat 5MB
);

/// Mime type reported for every fixture
pub const MP4_AUDIO: &str = "audio/mp4";

/// A box with a 32-bit header around `payload`
pub fn raw_box(fourcc: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 8);
    out.extend_from_slice(&((payload.len() + 8) as u32).to_be_bytes());
    out.extend_from_slice(fourcc);
    out.extend_from_slice(payload);
    out
}

/// A 32-byte `ftyp` for an M4A file
pub fn ftyp_box() -> Vec<u8> {
    let mut payload = Vec::with_capacity(24);
    payload.extend_from_slice(b"M4A ");
    payload.extend_from_slice(&0u32.to_be_bytes());
    for brand in [b"M4A ", b"mp42", b"isom", b"\0\0\0\0"] {
        payload.extend_from_slice(brand);
    }
    raw_box(b"ftyp", &payload)
}

/// A `moov` of exactly `total_size` bytes holding one padded `mvhd`
///
/// Sizes below 16 are raised to 16.
pub fn moov_box(total_size: usize) -> Vec<u8> {
    let mvhd_payload = vec![0u8; total_size.saturating_sub(16)];
    raw_box(b"moov", &raw_box(b"mvhd", &mvhd_payload))
}

/// An `mdat` with `payload_len` bytes of a repeating pattern
pub fn mdat_box(payload_len: usize) -> Vec<u8> {
    let payload: Vec<u8> = (0..payload_len).map(|i| (i % 251) as u8).collect();
    raw_box(b"mdat", &payload)
}

fn track_with(table_type: &[u8; 4], table: &[u8]) -> Vec<u8> {
    let stbl = raw_box(b"stbl", &raw_box(table_type, table));
    let minf = raw_box(b"minf", &stbl);
    let mdia = raw_box(b"mdia", &minf);
    raw_box(b"trak", &mdia)
}

/// A `moov` with an `stco` track and, if `co64` is non-empty, a `co64` track
pub fn moov_with_chunk_offsets(stco: &[u32], co64: &[u64]) -> Vec<u8> {
    let mut children = raw_box(b"mvhd", &[0u8; 100]);

    let mut table = vec![0u8; 4];
    table.extend_from_slice(&(stco.len() as u32).to_be_bytes());
    for offset in stco {
        table.extend_from_slice(&offset.to_be_bytes());
    }
    children.extend(track_with(b"stco", &table));

    if !co64.is_empty() {
        let mut table = vec![0u8; 4];
        table.extend_from_slice(&(co64.len() as u32).to_be_bytes());
        for offset in co64 {
            table.extend_from_slice(&offset.to_be_bytes());
        }
        children.extend(track_with(b"co64", &table));
    }

    raw_box(b"moov", &children)
}

/// Concatenate top-level boxes into a file image
pub fn build_file(boxes: &[Vec<u8>]) -> Vec<u8> {
    boxes.concat()
}

/// JPEG-looking bytes (SOI/APP0 marker prefix, EOI suffix)
pub fn sample_jpeg(len: usize) -> Vec<u8> {
    let mut data: Vec<u8> = (0..len).map(|i| (i % 200) as u8 + 20).collect();
    for (slot, byte) in data.iter_mut().zip([0xFF, 0xD8, 0xFF, 0xE0]) {
        *slot = byte;
    }
    if len >= 6 {
        data[len - 2] = 0xFF;
        data[len - 1] = 0xD9;
    }
    data
}

/// PNG-looking bytes (8-byte signature prefix)
pub fn sample_png(len: usize) -> Vec<u8> {
    let mut data: Vec<u8> = (0..len).map(|i| (i % 97) as u8).collect();
    for (slot, byte) in data
        .iter_mut()
        .zip([0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A])
    {
        *slot = byte;
    }
    data
}

fn data_box(type_code: u32, value: &[u8]) -> Vec<u8> {
    let mut payload = type_code.to_be_bytes().to_vec();
    payload.extend_from_slice(&[0, 0, 0, 0]);
    payload.extend_from_slice(value);
    raw_box(b"data", &payload)
}

/// Movie chunk offsets (`stco` then `co64` entries, in tree order)
pub fn chunk_offsets(moov: &BoxNode) -> Vec<u64> {
    let mut offsets = Vec::new();
    collect_offsets(moov, &mut offsets);
    offsets
}

fn collect_offsets(node: &BoxNode, offsets: &mut Vec<u64>) {
    if let Payload::Leaf(table) = &node.payload {
        let width = match node.box_type {
            BoxType::StcoBox => 4,
            BoxType::Co64Box => 8,
            _ => return,
        };
        for entry in table.get(8..).unwrap_or_default().chunks_exact(width) {
            let mut wide = [0u8; 8];
            wide[8 - width..].copy_from_slice(entry);
            offsets.push(u64::from_be_bytes(wide));
        }
    }
    for child in node.children() {
        collect_offsets(child, offsets);
    }
}

/// ftyp, a 1 KiB moov and an 8 KiB mdat
pub fn progressive_file() -> Vec<u8> {
    build_file(&[ftyp_box(), moov_box(1024), mdat_box(8192)])
}

/// A file whose movie box already carries iTunes metadata
pub fn tagged_file() -> Vec<u8> {
    let mut hdlr = vec![0u8; 8];
    hdlr.extend_from_slice(b"mdir");
    hdlr.extend_from_slice(&[0u8; 13]);

    let mut items = raw_box(&[0xA9, b'n', b'a', b'm'], &data_box(1, b"Existing Title"));
    items.extend(raw_box(&[0xA9, b'd', b'a', b'y'], &data_box(1, b"2001")));
    items.extend(raw_box(b"trkn", &data_box(0, &[0, 0, 0, 3, 0, 12, 0, 0])));

    let mut meta = vec![0u8; 4];
    meta.extend(raw_box(b"hdlr", &hdlr));
    meta.extend(raw_box(b"ilst", &items));

    let mut moov = raw_box(b"mvhd", &[0u8; 100]);
    moov.extend(raw_box(b"udta", &raw_box(b"meta", &meta)));

    build_file(&[ftyp_box(), raw_box(b"moov", &moov), mdat_box(4096)])
}

/// A file whose chunk offsets point into the mdat after the movie box
pub fn chunk_offset_file() -> Vec<u8> {
    let ftyp = ftyp_box();
    let mdat_payload = (ftyp.len() + moov_with_chunk_offsets(&[0; 3], &[0]).len() + 8) as u64;
    let moov = moov_with_chunk_offsets(
        &[
            mdat_payload as u32,
            mdat_payload as u32 + 1000,
            mdat_payload as u32 + 2000,
        ],
        &[mdat_payload + 3000],
    );
    build_file(&[ftyp, moov, mdat_box(4000)])
}

/// Movie fragments only, no top-level movie box
pub fn fragmented_file() -> Vec<u8> {
    build_file(&[ftyp_box(), raw_box(b"moof", &[0u8; 64]), mdat_box(2048)])
}

/// ftyp (32 bytes), moov (9000 bytes), mdat (5,000,000 bytes)
pub fn scenario_file() -> Vec<u8> {
    build_file(&[ftyp_box(), moov_box(9000), mdat_box(5_000_000 - 8)])
}

/// Get path to an on-disk fixture in `MP4_META_TEST_FIXTURES`
pub fn fixture_path(file_name: &str) -> Option<PathBuf> {
    let dir = std::env::var("MP4_META_TEST_FIXTURES").ok()?;
    let path = PathBuf::from(dir).join(file_name);
    path.exists().then_some(path)
}

/// Create test streams - synthetic or file-based
///
/// Returns: (format, input_cursor, output_cursor)
pub fn create_test_streams(fixture_name: &str) -> Result<TestStreams> {
    let input = fixture_bytes(fixture_name)?;
    Ok((MP4_AUDIO, Cursor::new(input), Cursor::new(Vec::new())))
}

/// Helper to get fixture data as bytes
pub fn fixture_bytes(name: &str) -> Result<Vec<u8>> {
    if let Some(builder) = get_registry().get(name) {
        return Ok(builder());
    }

    let path = fixture_path(name)
        .ok_or_else(|| Error::InvalidFormat(format!("unknown fixture: {}", name)))?;
    fs::read(path).map_err(Error::Io)
}

/// List all available fixtures (synthetic + `MP4_META_TEST_FIXTURES`)
pub fn list_fixtures() -> Result<Vec<String>> {
    let mut fixtures: Vec<String> = list_all_fixtures().into_iter().map(String::from).collect();

    if let Ok(custom_dir) = std::env::var("MP4_META_TEST_FIXTURES") {
        let extended_path = PathBuf::from(custom_dir);
        if extended_path.is_dir() {
            for entry in fs::read_dir(extended_path).map_err(Error::Io)? {
                let path = entry.map_err(Error::Io)?.path();
                let is_mp4 = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "m4a" | "mp4" | "m4b"))
                    .unwrap_or(false);
                if let (true, Some(name)) = (is_mp4, path.file_name().and_then(|n| n.to_str())) {
                    if !fixtures.iter().any(|f| f == name) {
                        fixtures.push(name.to_string());
                    }
                }
            }
        }
    }

    Ok(fixtures)
}
