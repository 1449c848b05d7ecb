//! File-level operations for any front-end: read a file, run a codec, write the result.

use std::{
    ffi::OsString,
    fmt::Display,
    fs,
    io,
    path::{Path, PathBuf},
};

use faccess::{AccessMode, PathExt};
use log::{debug, info};

use crate::{
    archive::{ArchiveHeader, Scheme},
    error::{Error, Result},
    huffman,
    progress::Progress,
    rle,
};

/// Where to write and whether an existing file may be replaced.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Destination path; derived from the source path when `None`.
    pub output: Option<PathBuf>,
    pub overwrite: bool,
}

/// Encodes `data` into a complete archive of the given scheme.
pub fn encode_archive(
    data: &[u8],
    scheme: Scheme,
    extension: &str,
    progress: &mut Progress,
) -> Result<Vec<u8>> {
    match scheme {
        Scheme::Huffman => huffman::write_archive(data, extension, progress),
        Scheme::Rle => Ok(rle::write_archive(data, extension, progress)),
    }
}

/// Decodes an archive of either scheme, as announced by its header.
pub fn decode_archive(archive: &[u8], progress: &mut Progress) -> Result<(ArchiveHeader, Vec<u8>)> {
    let (header, _) = ArchiveHeader::parse(archive)?;
    match header.scheme() {
        Scheme::Huffman => huffman::read_archive(archive, progress),
        Scheme::Rle => rle::read_archive(archive, progress),
    }
}

/// Compresses `input` next to itself, as `<stem>.huff` or `<stem>.rle`.
pub fn compress(input: &Path, scheme: Scheme) -> Result<PathBuf> {
    compress_with(input, scheme, &Options::default(), &mut Progress::silent())
}

pub fn compress_with(
    input: &Path,
    scheme: Scheme,
    options: &Options,
    progress: &mut Progress,
) -> Result<PathBuf> {
    let output = match &options.output {
        Some(output) => output.clone(),
        None => sibling_path(input, scheme.extension()),
    };
    check_writable(&output, options.overwrite)?;

    let data = read_file(input)?;
    let extension = input
        .extension()
        .map(|extension| extension.to_string_lossy().into_owned())
        .unwrap_or_default();
    let archive = encode_archive(&data, scheme, &extension, progress)?;
    fs::write(&output, &archive).map_err(|e| Error::io(&output, e))?;

    info!(
        "compressed {input:?} ({} bytes) into {output:?} ({} bytes) with {scheme}",
        data.len(),
        archive.len()
    );
    Ok(output)
}

/// Restores the original file next to `archive`, using the extension stored in its header.
pub fn decompress(archive: &Path) -> Result<PathBuf> {
    decompress_with(archive, &Options::default(), &mut Progress::silent())
}

pub fn decompress_with(
    archive: &Path,
    options: &Options,
    progress: &mut Progress,
) -> Result<PathBuf> {
    let bytes = read_file(archive)?;
    let (header, _) = ArchiveHeader::parse(&bytes)?;
    let output = match &options.output {
        Some(output) => output.clone(),
        None => sibling_path(archive, header.extension()),
    };
    check_writable(&output, options.overwrite)?;

    let (header, data) = decode_archive(&bytes, progress)?;
    fs::write(&output, &data).map_err(|e| Error::io(&output, e))?;

    info!(
        "decompressed {archive:?} ({} bytes, {}) into {output:?} ({} bytes)",
        bytes.len(),
        header.scheme(),
        data.len()
    );
    Ok(output)
}

/// Summary of an archive's header and sizes, without decoding the payload.
#[derive(Debug, Clone)]
pub struct ArchiveInfo {
    pub header: ArchiveHeader,
    pub archive_len: usize,
    pub payload_len: usize,
}

impl ArchiveInfo {
    /// Archive size over original size; `None` for an empty original.
    pub fn ratio(&self) -> Option<f64> {
        (self.header.original_len() > 0)
            .then(|| self.archive_len as f64 / self.header.original_len() as f64)
    }
}

impl Display for ArchiveInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.header)?;
        writeln!(f, "Archive length: {} bytes", self.archive_len)?;
        write!(f, "Payload length: {} bytes", self.payload_len)?;
        if let Some(ratio) = self.ratio() {
            write!(f, "\nRatio: {:.1}%", ratio * 100.0)?;
        }
        Ok(())
    }
}

pub fn inspect(archive: &Path) -> Result<ArchiveInfo> {
    let bytes = read_file(archive)?;
    let (header, payload) = ArchiveHeader::parse(&bytes)?;
    Ok(ArchiveInfo {
        payload_len: payload.len(),
        archive_len: bytes.len(),
        header,
    })
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    path.access(AccessMode::READ)
        .map_err(|e| Error::io(path, e))?;
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    debug!("read {} bytes from {path:?}", bytes.len());
    Ok(bytes)
}

fn check_writable(output: &Path, overwrite: bool) -> Result<()> {
    if output.exists() {
        if !overwrite {
            return Err(Error::io(
                output,
                io::Error::new(io::ErrorKind::AlreadyExists, "refusing to overwrite"),
            ));
        }
        return output
            .access(AccessMode::WRITE)
            .map_err(|e| Error::io(output, e));
    }
    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    parent
        .access(AccessMode::WRITE)
        .map_err(|e| Error::io(parent, e))
}

/// `path` with its extension replaced by `extension`, never `path` itself.
fn sibling_path(path: &Path, extension: &str) -> PathBuf {
    let sibling = path.with_extension(extension);
    if sibling != path {
        return sibling;
    }
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(if extension.is_empty() { "out" } else { extension });
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use crate::archive::Scheme;
    use crate::driver::{
        compress, compress_with, decode_archive, decompress, decompress_with, encode_archive,
        inspect, sibling_path, Options,
    };
    use crate::error::Error;
    use crate::progress::Progress;

    const TEXT: &[u8] = b"It was the best of times, it was the worst of times, \
        it was the age of wisdom, it was the age of foolishness...";

    #[test]
    fn sibling_paths() {
        assert_eq!(
            Path::new("dir/report.huff"),
            sibling_path(Path::new("dir/report.txt"), "huff")
        );
        assert_eq!(Path::new("notes.rle"), sibling_path(Path::new("notes"), "rle"));
        assert_eq!(
            Path::new("a.tar.gz"),
            sibling_path(Path::new("a.tar.huff"), "gz")
        );
        assert_eq!(Path::new("data"), sibling_path(Path::new("data.rle"), ""));
        assert_eq!(
            Path::new("x.rle.rle"),
            sibling_path(Path::new("x.rle"), "rle")
        );
        assert_eq!(Path::new("x.out"), sibling_path(Path::new("x"), ""));
    }

    #[test]
    fn in_memory_round_trip() {
        for scheme in [Scheme::Huffman, Scheme::Rle] {
            let archive = encode_archive(TEXT, scheme, "txt", &mut Progress::silent()).unwrap();
            let (header, data) = decode_archive(&archive, &mut Progress::silent()).unwrap();
            assert_eq!(scheme, header.scheme());
            assert_eq!(TEXT, data);
        }
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        for scheme in [Scheme::Huffman, Scheme::Rle] {
            let input = dir.path().join("story.txt");
            fs::write(&input, TEXT).unwrap();

            let archive = compress(&input, scheme).unwrap();
            assert_eq!(Some(scheme.extension()), archive.extension().and_then(|e| e.to_str()));

            fs::remove_file(&input).unwrap();
            let restored = decompress(&archive).unwrap();
            assert_eq!(input, restored);
            assert_eq!(TEXT, fs::read(&restored).unwrap());
            fs::remove_file(&archive).unwrap();
        }
    }

    #[test]
    fn empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("empty.bin");
        fs::write(&input, b"").unwrap();

        assert!(matches!(
            compress(&input, Scheme::Huffman),
            Err(Error::EmptyInput)
        ));

        let archive = compress(&input, Scheme::Rle).unwrap();
        let output = dir.path().join("restored.bin");
        let options = Options {
            output: Some(output.clone()),
            overwrite: false,
        };
        decompress_with(&archive, &options, &mut Progress::silent()).unwrap();
        assert!(fs::read(&output).unwrap().is_empty());
    }

    #[test]
    fn refuses_to_overwrite_unless_asked() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("page.html");
        fs::write(&input, TEXT).unwrap();
        let archive = compress(&input, Scheme::Rle).unwrap();

        assert!(matches!(
            decompress(&archive),
            Err(Error::Io { source, .. }) if source.kind() == std::io::ErrorKind::AlreadyExists
        ));

        let options = Options {
            output: None,
            overwrite: true,
        };
        let mut reports = 0;
        let mut count = |_: f32| reports += 1;
        decompress_with(&archive, &options, &mut Progress::new(&mut count)).unwrap();
        assert!(reports >= 1);
        assert_eq!(TEXT, fs::read(&input).unwrap());

        compress_with(&input, Scheme::Huffman, &options, &mut Progress::silent()).unwrap();
    }

    #[test]
    fn missing_input_is_an_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            compress(&dir.path().join("nope.txt"), Scheme::Huffman),
            Err(Error::Io { .. })
        ));
        assert!(matches!(
            decompress(&dir.path().join("nope.huff")),
            Err(Error::Io { .. })
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.huff");
        fs::write(&bogus, b"definitely not an archive").unwrap();
        assert!(matches!(decompress(&bogus), Err(Error::MalformedArchive(_))));
        assert!(matches!(inspect(&bogus), Err(Error::MalformedArchive(_))));
    }

    #[test]
    fn inspect_reports_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("zeros.bin");
        fs::write(&input, [0u8; 1000]).unwrap();
        let archive = compress(&input, Scheme::Rle).unwrap();

        let info = inspect(&archive).unwrap();
        assert_eq!(Scheme::Rle, info.header.scheme());
        assert_eq!("bin", info.header.extension());
        assert_eq!(1000, info.header.original_len());
        assert_eq!(8, info.payload_len);
        assert_eq!(fs::read(&archive).unwrap().len(), info.archive_len);
        assert!(info.ratio().unwrap() < 0.1);
        assert!(info.to_string().contains("Payload length: 8 bytes"));
    }
}
