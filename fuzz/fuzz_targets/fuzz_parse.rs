#![no_main]

use libfuzzer_sys::fuzz_target;
use mp4_meta_io::{builder, BoxIndex, BoxNode};
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    // Scanning and tree parsing must only ever return errors, never panic
    if let Ok(index) = BoxIndex::scan(&mut Cursor::new(data)) {
        let _ = index.is_fragmented();
        if let Some(movie) = index.movie_box() {
            let start = movie.offset as usize;
            let end = movie.range().end_offset() as usize;
            if let Ok(moov) = BoxNode::parse(&data[start..end], movie.offset) {
                let _ = builder::read_tags(&moov);
                // whatever parses must serialize back to the same length
                if let Ok(bytes) = moov.serialize() {
                    assert_eq!(bytes.len() as u64, moov.size());
                }
            }
        }
    }

    // Any slice is also a candidate movie box on its own
    let _ = BoxNode::parse(data, 0);
});
