//! Safety tests - basic validation of security mechanisms
//!
//! These tests verify that safety limits and checks are in place and that
//! malformed input is reported as an error instead of panicking.
//! Comprehensive testing should be done with fuzzing (cargo-fuzz).

use mp4_meta_io::{
    defragment, embed, test_utils::*, BoxIndex, BoxNode, Error, Tags, WriteOptions,
    MAX_MOVIE_BOX_SIZE,
};
use std::io::Cursor;

fn embed_result(data: &[u8]) -> mp4_meta_io::Result<Vec<u8>> {
    let mut output = Vec::new();
    embed(
        &mut Cursor::new(data),
        &mut output,
        &Tags::new().title("t").artwork(sample_png(32)),
        &WriteOptions::default(),
    )?;
    Ok(output)
}

#[test]
fn test_max_movie_box_size_constant() {
    // Verify the limit is reasonable
    assert_eq!(MAX_MOVIE_BOX_SIZE, 256 * 1024 * 1024, "256 MB limit");

    // Should allow large legitimate movie boxes
    assert!(MAX_MOVIE_BOX_SIZE > 100_000_000, "Allow >100MB");

    // Should prevent DOS attacks
    assert!(MAX_MOVIE_BOX_SIZE < 1_000_000_000, "Prevent >1GB");
}

#[test]
fn test_truncated_header_is_rejected() {
    for len in 1..8 {
        let data = &ftyp_box()[..len];
        assert!(BoxIndex::scan(&mut Cursor::new(data)).is_err(), "len {}", len);
    }
}

#[test]
fn test_undersized_box_is_rejected() {
    // declared size 4 is smaller than the header itself
    let mut data = ftyp_box();
    data.extend_from_slice(&[0, 0, 0, 4]);
    data.extend_from_slice(b"free");
    assert!(matches!(
        BoxIndex::scan(&mut Cursor::new(data.as_slice())),
        Err(Error::InvalidBox { offset: 32, .. })
    ));

    // 64-bit size smaller than the 16-byte extended header
    let mut data = vec![0, 0, 0, 1];
    data.extend_from_slice(b"moov");
    data.extend_from_slice(&12u64.to_be_bytes());
    assert!(BoxIndex::scan(&mut Cursor::new(data.as_slice())).is_err());
}

#[test]
fn test_box_past_end_of_file_is_rejected() {
    let mut data = progressive_file();
    data.truncate(data.len() - 1);
    assert!(BoxIndex::scan(&mut Cursor::new(data.as_slice())).is_err());
    assert!(embed_result(&data).is_err());

    let mut output = Vec::new();
    let options = WriteOptions::default();
    assert!(defragment(&mut Cursor::new(data.as_slice()), &mut output, &options).is_err());
    assert!(output.is_empty());
}

#[test]
fn test_corrupt_movie_box_children_are_rejected() {
    // moov whose only child claims more bytes than moov holds
    let mut child = vec![0, 0, 0, 200];
    child.extend_from_slice(b"trak");
    child.extend_from_slice(&[0u8; 16]);
    let data = build_file(&[ftyp_box(), raw_box(b"moov", &child), mdat_box(64)]);

    match embed_result(&data) {
        Err(Error::InvalidBox { offset, .. }) => assert_eq!(offset, 40),
        other => panic!("expected invalid box, got {:?}", other.map(|v| v.len())),
    }
}

#[test]
fn test_deep_nesting_is_bounded() {
    let mut nested = raw_box(b"free", &[]);
    for _ in 0..100 {
        nested = raw_box(b"trak", &nested);
    }
    let moov = raw_box(b"moov", &nested);
    assert!(BoxNode::parse(&moov, 0).is_err());
}

#[test]
fn test_garbage_never_panics() {
    let mut seed = 0x2545_F491_4F6C_DD1Du64;
    for round in 0..200 {
        let len = (round * 7) % 300;
        let data: Vec<u8> = (0..len)
            .map(|_| {
                seed ^= seed << 13;
                seed ^= seed >> 7;
                seed ^= seed << 17;
                seed as u8
            })
            .collect();

        let _ = BoxIndex::scan(&mut Cursor::new(data.as_slice()));
        let _ = BoxNode::parse(&data, 0);
        let _ = embed_result(&data);
    }
}

#[test]
fn test_bit_flipped_files_never_panic() {
    let original = tagged_file();
    for i in (0..original.len()).step_by(3) {
        let mut data = original.clone();
        data[i] ^= 0xA5;
        let _ = embed_result(&data);
    }
}
