#![no_main]

use libfuzzer_sys::fuzz_target;
use mp4_meta_io::{defragment, embed, Tags, WriteOptions};
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let options = WriteOptions::new().chunk_size(4096);

    // Text only
    let tags = Tags::new().title("fuzz").year("2024");
    let mut output = Vec::new();
    let _ = embed(&mut Cursor::new(data), &mut output, &tags, &options);

    // Cover art, labelled from the fuzzer's own bytes
    let tags = Tags::new().artwork(data.iter().take(64).copied().collect());
    let mut output = Vec::new();
    let _ = embed(&mut Cursor::new(data), &mut output, &tags, &options);

    // Without chunk-offset relocation
    let mut output = Vec::new();
    let _ = embed(
        &mut Cursor::new(data),
        &mut output,
        &Tags::new().album("fuzz"),
        &options.relocate_chunk_offsets(false),
    );

    let mut output = Vec::new();
    if let Ok(copied) = defragment(&mut Cursor::new(data), &mut output, &options) {
        assert_eq!(copied as usize, data.len());
        assert_eq!(output.as_slice(), data);
    }
});
