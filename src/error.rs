use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("empty input: Huffman coding needs at least one byte")]
    EmptyInput,
    #[error("empty archive: the header announces data but the payload is empty")]
    EmptyArchive,
    #[error("malformed archive: {0}")]
    MalformedArchive(String),
    #[error("corrupt stream: bitstream ends or diverges at bit {bit_offset}")]
    CorruptStream { bit_offset: usize },
    #[error("I/O failure on {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported scheme: {0:?} (expected huffman or rle)")]
    UnsupportedScheme(String),
}

impl Error {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedArchive(reason.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
