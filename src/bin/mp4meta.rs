use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use mp4_meta_io::{
    defragment_file_with, embed_metadata_with, read_tags, rewriter::read_movie_box, BoxIndex,
    BoxNode, ImageFormat, Payload, Tags, WriteOptions,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct CliOptions {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write tags and cover art into a new file
    Embed {
        /// Source MP4/M4A file (never modified)
        input: PathBuf,

        /// Destination file
        output: PathBuf,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        artist: Option<String>,

        #[arg(long)]
        album: Option<String>,

        #[arg(long)]
        year: Option<String>,

        /// JPEG or PNG image to embed as cover art
        #[arg(long)]
        artwork: Option<PathBuf>,

        #[command(flatten)]
        write: WriteArgs,
    },
    /// Copy a progressive file (one with a movie box) to a new path
    Defrag {
        input: PathBuf,
        output: PathBuf,

        #[command(flatten)]
        write: WriteArgs,
    },
    /// Print the top-level boxes, the movie box tree and the tags
    Dump {
        input: PathBuf,

        /// Also print every box inside the movie box
        #[arg(long)]
        tree: bool,
    },
}

#[derive(Args, Debug)]
struct WriteArgs {
    /// Transfer buffer size, in KiB
    #[arg(long, default_value_t = 64)]
    chunk_kib: usize,

    /// Write straight to the destination instead of a temporary file
    #[arg(long)]
    no_atomic: bool,

    /// Leave stco/co64 chunk offsets untouched
    #[arg(long)]
    no_relocate: bool,
}

impl WriteArgs {
    fn options(&self) -> WriteOptions {
        WriteOptions::new()
            .chunk_size(self.chunk_kib.saturating_mul(1024))
            .atomic(!self.no_atomic)
            .relocate_chunk_offsets(!self.no_relocate)
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_tree(node: &BoxNode, depth: usize) {
    let detail = match &node.payload {
        Payload::Container {
            version_flags: Some(vf),
            children,
            ..
        } => {
            format!("full box v{} ({} children)", vf >> 24, children.len())
        }
        Payload::Container { children, .. } => format!("{} children", children.len()),
        Payload::Leaf(data) => format!("{} bytes", data.len()),
        Payload::Value(value) => match value.value.as_text() {
            Some(text) => format!("text {:?}", text),
            None => format!(
                "type {} ({} bytes)",
                value.value.type_code(),
                value.value.bytes().len()
            ),
        },
    };
    println!("{:indent$}{} [{}] {}", "", node.box_type, node.size(), detail, indent = depth * 2);
    for child in node.children() {
        print_tree(child, depth + 1);
    }
}

fn dump(input: &Path, tree: bool) -> Result<()> {
    let file = File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let mut source = BufReader::new(file);
    let index = BoxIndex::scan(&mut source)?;

    println!("{} ({} bytes)", input.display(), index.file_size());
    for entry in index.entries() {
        println!(
            "  {} @ {} size {}{}",
            entry.box_type,
            entry.offset,
            entry.size,
            if entry.header_len == 16 { " (64-bit)" } else { "" }
        );
    }

    let Some(movie) = index.movie_box().copied() else {
        println!("no movie box");
        return Ok(());
    };
    if tree {
        let moov = read_movie_box(&mut source, &movie)?;
        print_tree(&moov, 1);
    }

    let tags = read_tags(input)?;
    for (label, value) in [
        ("title", &tags.title),
        ("artist", &tags.artist),
        ("album", &tags.album),
        ("year", &tags.year),
    ] {
        if let Some(value) = value {
            println!("{:>8}: {}", label, value);
        }
    }
    if let Some(art) = &tags.artwork {
        println!("{:>8}: {} bytes ({:?})", "artwork", art.len(), ImageFormat::sniff(art));
    }
    Ok(())
}

fn main() -> Result<()> {
    init_logging();

    match CliOptions::parse().command {
        Command::Embed {
            input,
            output,
            title,
            artist,
            album,
            year,
            artwork,
            write,
        } => {
            let artwork = artwork
                .map(|path| {
                    std::fs::read(&path).with_context(|| format!("reading {}", path.display()))
                })
                .transpose()?;
            let tags = Tags {
                title,
                artist,
                album,
                year,
                artwork,
            };
            if tags.is_empty() {
                bail!(
                    "nothing to embed: pass at least one of \
                     --title, --artist, --album, --year, --artwork"
                );
            }

            let summary = embed_metadata_with(&input, &output, &tags, &write.options())?;
            info!(
                "wrote {} ({} bytes, movie box {} -> {})",
                output.display(),
                summary.bytes_written,
                summary.movie_box_before,
                summary.movie_box_after
            );
        }
        Command::Defrag {
            input,
            output,
            write,
        } => {
            let copied = defragment_file_with(&input, &output, &write.options())?;
            info!("wrote {} ({} bytes)", output.display(), copied);
        }
        Command::Dump { input, tree } => dump(&input, tree)?,
    }

    Ok(())
}
