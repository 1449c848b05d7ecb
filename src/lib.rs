//! # squish
//!
//! Lossless single-file compression with two interchangeable schemes:
//! * [`huffman`] builds a prefix code from byte frequencies and bit-packs the input
//! * [`rle`] stores (byte, count) pairs for runs of up to 255 identical bytes
//!
//! Both write a self-describing archive (see [`ArchiveHeader`]) that remembers the original
//! file extension, so decoding needs nothing but the archive itself.
//!
//! ```no_run
//! use std::path::Path;
//! use squish::Scheme;
//!
//! let archive = squish::compress(Path::new("report.txt"), Scheme::Huffman)?;
//! let restored = squish::decompress(&archive)?;
//! # Ok::<(), squish::Error>(())
//! ```
//!
//! Everything is computed in memory, with no global state, so independent files may be
//! processed on separate threads.

pub mod archive;
pub mod bits;
pub mod driver;
mod error;
pub mod huffman;
pub mod progress;
pub mod rle;

pub use archive::{ArchiveHeader, Scheme};
pub use driver::{
    compress, compress_with, decode_archive, decompress, decompress_with, encode_archive, inspect,
    ArchiveInfo, Options,
};
pub use error::{Error, Result};
pub use progress::Progress;
