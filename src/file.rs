//! Path-based entry points
//!
//! The `*_with` functions return structured errors. [`embed_metadata`] and
//! [`defragment_file`] are the boolean boundary: they log the failure and
//! return `false`.
//!
//! Input is only ever read. Output is produced in a temporary file next to
//! the destination and renamed into place once complete, unless
//! [`WriteOptions::atomic`] is turned off.

use crate::{
    builder::{self, apply_tags},
    defrag::{check_progressive, copy_stream},
    error::{Error, Result},
    metadata::Tags,
    options::WriteOptions,
    rewriter::{read_movie_box, rewrite, WriteSummary},
    scanner::BoxIndex,
    tree::BoxNode,
};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Seek, Write},
    path::Path,
};
use tempfile::NamedTempFile;
use tracing::{debug, error, info};

/// Embed `tags` into the stream `source`, writing the complete result to `writer`
///
/// Boxes other than the movie box are copied byte-for-byte.
pub fn embed<R, W>(
    source: &mut R,
    writer: &mut W,
    tags: &Tags,
    options: &WriteOptions,
) -> Result<WriteSummary>
where
    R: Read + Seek + ?Sized,
    W: Write + ?Sized,
{
    let mut prepared = prepare(source, tags)?;
    prepared.write(source, writer, options)
}

/// A validated input with its tagged movie box, ready to be written
struct Prepared {
    index: BoxIndex,
    moov: BoxNode,
    tags_written: usize,
}

impl Prepared {
    fn write<R, W>(
        &mut self,
        source: &mut R,
        writer: &mut W,
        options: &WriteOptions,
    ) -> Result<WriteSummary>
    where
        R: Read + Seek + ?Sized,
        W: Write + ?Sized,
    {
        let mut summary = rewrite(source, writer, &self.index, &mut self.moov, options)?;
        summary.tags_written = self.tags_written;
        Ok(summary)
    }
}

/// Index `source`, load its movie box and apply `tags`, without writing
fn prepare<R: Read + Seek + ?Sized>(source: &mut R, tags: &Tags) -> Result<Prepared> {
    let index = BoxIndex::scan(source)?;
    let entry = *index.require_movie_box()?;
    let mut moov = read_movie_box(source, &entry)?;
    let tags_written = apply_tags(&mut moov, tags)?;
    Ok(Prepared {
        index,
        moov,
        tags_written,
    })
}

fn open_input(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).map_err(|source| Error::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Run `produce` against a writer for `output`, honouring `options.atomic`
///
/// Callers validate the input first: the destination is only touched here.
/// The temporary file takes the permissions of the file it replaces, or of
/// `input` when `output` does not exist yet.
fn write_output<T, F>(input: &Path, output: &Path, options: &WriteOptions, produce: F) -> Result<T>
where
    F: FnOnce(&mut dyn Write) -> Result<T>,
{
    let open_error = |source| Error::Open {
        path: output.to_path_buf(),
        source,
    };

    if !options.atomic {
        if same_file(input, output) {
            return Err(Error::SamePath(output.to_path_buf()));
        }
        let mut writer = BufWriter::new(File::create(output).map_err(open_error)?);
        let result = produce(&mut writer).and_then(|value| {
            writer.flush()?;
            Ok(value)
        });
        if result.is_err() {
            drop(writer);
            if let Err(err) = fs::remove_file(output) {
                debug!(path = %output.display(), error = %err, "could not remove partial output");
            }
        }
        return result;
    }

    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let temp = NamedTempFile::new_in(dir).map_err(open_error)?;
    debug!(temp = %temp.path().display(), "writing to temporary file");
    if let Ok(metadata) = fs::metadata(output).or_else(|_| fs::metadata(input)) {
        temp.as_file().set_permissions(metadata.permissions())?;
    }

    let mut writer = BufWriter::new(temp);
    let value = produce(&mut writer)?;
    let temp = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    temp.as_file().sync_all()?;
    temp.persist(output).map_err(|e| open_error(e.error))?;
    Ok(value)
}

/// Embed `tags` into `input`, writing a new file at `output`
pub fn embed_metadata_with(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    tags: &Tags,
    options: &WriteOptions,
) -> Result<WriteSummary> {
    let (input, output) = (input.as_ref(), output.as_ref());
    let mut source = open_input(input)?;
    let mut prepared = prepare(&mut source, tags)?;

    let summary = write_output(input, output, options, |writer| {
        prepared.write(&mut source, writer, options)
    })?;

    info!(
        input = %input.display(),
        output = %output.display(),
        tags = summary.tags_written,
        movie_box_before = summary.movie_box_before,
        movie_box_after = summary.movie_box_after,
        relocated = summary.chunk_offsets_relocated,
        "embedded metadata"
    );
    Ok(summary)
}

/// Embed metadata, reporting failure as `false`
///
/// Absent or empty fields leave any existing tag of that kind untouched.
/// Failures are logged; the input file is never modified and no partial
/// output is left at `output`.
pub fn embed_metadata(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    artwork: Option<&[u8]>,
    title: Option<&str>,
    artist: Option<&str>,
    album: Option<&str>,
    year: Option<&str>,
) -> bool {
    let tags = Tags {
        title: title.map(str::to_string),
        artist: artist.map(str::to_string),
        album: album.map(str::to_string),
        year: year.map(str::to_string),
        artwork: artwork.map(<[u8]>::to_vec),
    };
    let (input, output) = (input.as_ref(), output.as_ref());

    match embed_metadata_with(input, output, &tags, &WriteOptions::default()) {
        Ok(_) => true,
        Err(err) => {
            error!(
                input = %input.display(),
                output = %output.display(),
                category = err.category(),
                "failed to embed metadata: {}",
                err
            );
            false
        }
    }
}

/// Copy a progressive file from `input` to `output`, returning bytes written
pub fn defragment_file_with(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    options: &WriteOptions,
) -> Result<u64> {
    let (input, output) = (input.as_ref(), output.as_ref());
    let mut source = open_input(input)?;
    let index = check_progressive(&mut source)?;

    let copied = write_output(input, output, options, |writer| {
        copy_stream(&mut source, writer, &index, options)
    })?;

    info!(input = %input.display(), output = %output.display(), bytes = copied, "defragmented");
    Ok(copied)
}

/// Defragment, reporting failure as `false`
pub fn defragment_file(input: impl AsRef<Path>, output: impl AsRef<Path>) -> bool {
    let (input, output) = (input.as_ref(), output.as_ref());
    match defragment_file_with(input, output, &WriteOptions::default()) {
        Ok(_) => true,
        Err(err) => {
            error!(
                input = %input.display(),
                output = %output.display(),
                category = err.category(),
                "failed to defragment: {}",
                err
            );
            false
        }
    }
}

/// Read title, artist, album, year and cover art from the file at `path`
pub fn read_tags(path: impl AsRef<Path>) -> Result<Tags> {
    let mut source = open_input(path.as_ref())?;
    let index = BoxIndex::scan(&mut source)?;
    let entry = *index.require_movie_box()?;
    let moov = read_movie_box(&mut source, &entry)?;
    Ok(builder::read_tags(&moov))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        build_file, fixture_bytes, ftyp_box, mdat_box, moov_box, sample_png, FRAGMENTED,
    };
    use pretty_assertions::assert_eq;

    fn sample_file() -> Vec<u8> {
        build_file(&[ftyp_box(), moov_box(256), mdat_box(2048)])
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_embed_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.m4a");
        let output = dir.path().join("out.m4a");
        fs::write(&input, sample_file()).unwrap();

        let tags = Tags::new()
            .title("Title")
            .artist("Artist")
            .artwork(sample_png(64));
        let summary =
            embed_metadata_with(&input, &output, &tags, &WriteOptions::default()).unwrap();
        assert_eq!(summary.tags_written, 3);
        assert_eq!(
            fs::metadata(&output).unwrap().len(),
            summary.bytes_written
        );

        assert_eq!(read_tags(&output).unwrap(), tags);
        assert_eq!(fs::read(&input).unwrap(), sample_file());
    }

    #[test]
    fn test_failed_atomic_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.m4a");
        let output = dir.path().join("out.m4a");
        fs::write(&input, build_file(&[ftyp_box(), mdat_box(100)])).unwrap();

        let tags = Tags::new().title("x");
        let err =
            embed_metadata_with(&input, &output, &tags, &WriteOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MissingMovieBox));
        assert_eq!(dir_entries(dir.path()), vec!["in.m4a".to_string()]);
    }

    #[test]
    fn test_failed_direct_write_keeps_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.m4a");
        let output = dir.path().join("out.m4a");
        fs::write(&input, fixture_bytes(FRAGMENTED).unwrap()).unwrap();
        fs::write(&output, b"existing").unwrap();

        let options = WriteOptions::new().atomic(false);
        let err =
            embed_metadata_with(&input, &output, &Tags::new().title("x"), &options).unwrap_err();
        assert!(matches!(err, Error::MissingMovieBox));
        assert_eq!(fs::read(&output).unwrap(), b"existing");

        let err = defragment_file_with(&input, &output, &options).unwrap_err();
        assert!(matches!(err, Error::MissingMovieBox));
        assert_eq!(fs::read(&output).unwrap(), b"existing");
    }

    #[test]
    fn test_failed_direct_write_creates_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.m4a");
        let output = dir.path().join("out.m4a");
        fs::write(&input, build_file(&[ftyp_box(), mdat_box(100)])).unwrap();

        let options = WriteOptions::new().atomic(false);
        assert!(defragment_file_with(&input, &output, &options).is_err());
        assert!(!output.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_atomic_output_keeps_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.m4a");
        let output = dir.path().join("out.m4a");
        fs::write(&input, sample_file()).unwrap();
        fs::set_permissions(&input, fs::Permissions::from_mode(0o644)).unwrap();

        let mode = |path: &Path| fs::metadata(path).unwrap().permissions().mode() & 0o777;

        embed_metadata_with(&input, &output, &Tags::new().title("x"), &WriteOptions::default())
            .unwrap();
        assert_eq!(mode(&output), 0o644);

        // replacing an existing file keeps that file's mode
        fs::set_permissions(&output, fs::Permissions::from_mode(0o640)).unwrap();
        defragment_file_with(&input, &output, &WriteOptions::default()).unwrap();
        assert_eq!(mode(&output), 0o640);

        embed_metadata_with(&input, &input, &Tags::new().title("y"), &WriteOptions::default())
            .unwrap();
        assert_eq!(mode(&input), 0o644);
    }

    #[test]
    fn test_same_path_needs_atomic_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.m4a");
        fs::write(&path, sample_file()).unwrap();

        let options = WriteOptions::new().atomic(false);
        let err = embed_metadata_with(&path, &path, &Tags::new().title("x"), &options).unwrap_err();
        assert!(matches!(err, Error::SamePath(_)));
        assert_eq!(fs::read(&path).unwrap(), sample_file());

        embed_metadata_with(&path, &path, &Tags::new().title("x"), &WriteOptions::default())
            .unwrap();
        assert_eq!(read_tags(&path).unwrap().title.as_deref(), Some("x"));
    }

    #[test]
    fn test_missing_input_is_an_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_tags(dir.path().join("missing.m4a")).unwrap_err();
        assert!(matches!(err, Error::Open { .. }));
        assert_eq!(err.category(), "open");

        assert!(!embed_metadata(
            dir.path().join("missing.m4a"),
            dir.path().join("out.m4a"),
            None,
            Some("t"),
            None,
            None,
            None
        ));
        assert!(!defragment_file(
            dir.path().join("missing.m4a"),
            dir.path().join("out.m4a")
        ));
    }
}
