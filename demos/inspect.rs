//! Example: Inspect and tag an MP4/M4A file
//!
//! Lists the top-level boxes, prints the current tags, then writes a tagged
//! copy next to the input. Without an argument a synthetic file is used.
//!
//! Run: `cargo run --example inspect -- <file.m4a>`

use mp4_meta_io::{embed_metadata_with, read_tags, test_utils, BoxIndex, Tags, WriteOptions};
use std::{env, fs::File, path::PathBuf};

fn print_tags(label: &str, tags: &Tags) {
    println!("\n{}:", label);
    println!("  title:   {:?}", tags.title);
    println!("  artist:  {:?}", tags.artist);
    println!("  album:   {:?}", tags.album);
    println!("  year:    {:?}", tags.year);
    match &tags.artwork {
        Some(art) => println!("  artwork: {} bytes", art.len()),
        None => println!("  artwork: none"),
    }
}

fn main() -> mp4_meta_io::Result<()> {
    let scratch = tempfile::tempdir()?;
    let input = match env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let path = scratch.path().join(test_utils::TAGGED);
            std::fs::write(&path, test_utils::fixture_bytes(test_utils::TAGGED)?)?;
            path
        }
    };
    println!("Parsing: {}", input.display());

    let index = BoxIndex::scan(&mut File::open(&input)?)?;
    println!("\nTop-level boxes ({} bytes):", index.file_size());
    for entry in index.entries() {
        println!("  {:<6} offset {:>10}  size {:>10}", entry.box_type, entry.offset, entry.size);
    }
    if index.movie_box().is_none() {
        println!("\n✗ No movie box, nothing to tag");
        return Ok(());
    }

    print_tags("Current tags", &read_tags(&input)?);

    let output = scratch.path().join("tagged.m4a");
    let tags = Tags::new()
        .artist("Demo Artist")
        .album("Demo Album")
        .artwork(test_utils::sample_png(256));
    let summary = embed_metadata_with(&input, &output, &tags, &WriteOptions::default())?;

    println!(
        "\n✓ Wrote {} tags; movie box {} -> {} bytes, {} chunk offsets relocated",
        summary.tags_written,
        summary.movie_box_before,
        summary.movie_box_after,
        summary.chunk_offsets_relocated
    );
    print_tags("Tags after embedding", &read_tags(&output)?);
    Ok(())
}
