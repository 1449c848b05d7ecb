use log::debug;

use crate::{
    archive::{ArchiveHeader, Scheme},
    error::{Error, Result},
    progress::Progress,
};

/// Longest run a single (byte, count) pair can describe.
pub const MAX_RUN: usize = u8::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    pub byte: u8,
    pub count: u8,
}

/// Iterator over the maximal runs of a buffer, each capped at [`MAX_RUN`] bytes.
pub struct Runs<'a> {
    bytes: &'a [u8],
    byte_cursor: usize,
}

impl<'a> Runs<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            byte_cursor: 0,
        }
    }

    /// Number of input bytes covered by the runs yielded so far.
    pub fn position(&self) -> usize {
        self.byte_cursor
    }
}

impl Iterator for Runs<'_> {
    type Item = Run;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.bytes.get(self.byte_cursor..)?;
        let &byte = rest.first()?;
        let count = rest
            .iter()
            .take(MAX_RUN)
            .take_while(|&&b| b == byte)
            .count();
        self.byte_cursor += count;
        Some(Run {
            byte,
            count: count as u8,
        })
    }
}

pub fn encode(data: &[u8]) -> Vec<u8> {
    encode_with_progress(data, &mut Progress::silent())
}

pub fn encode_with_progress(data: &[u8], progress: &mut Progress) -> Vec<u8> {
    let mut encoded = Vec::new();
    let mut runs = Runs::new(data);
    progress.start(data.len());
    while let Some(Run { byte, count }) = runs.next() {
        encoded.extend_from_slice(&[byte, count]);
        progress.advance(runs.position());
    }
    progress.finish();
    debug!(
        "RLE encoded {} bytes into {} runs",
        data.len(),
        encoded.len() / 2
    );
    encoded
}

pub fn decode(runs: &[u8]) -> Result<Vec<u8>> {
    decode_with_progress(runs, &mut Progress::silent())
}

pub fn decode_with_progress(runs: &[u8], progress: &mut Progress) -> Result<Vec<u8>> {
    if runs.len() % 2 != 0 {
        return Err(Error::malformed(format!(
            "RLE payload has odd length {}",
            runs.len()
        )));
    }
    let expanded_len: usize = runs.chunks_exact(2).map(|pair| usize::from(pair[1])).sum();
    let mut decoded = Vec::with_capacity(expanded_len);
    progress.start(runs.len());
    for (i, pair) in runs.chunks_exact(2).enumerate() {
        let (byte, count) = (pair[0], usize::from(pair[1]));
        if count == 0 {
            return Err(Error::malformed(format!(
                "zero-length run at payload offset {}",
                2 * i
            )));
        }
        decoded.resize(decoded.len() + count, byte);
        progress.advance(2 * i + 2);
    }
    progress.finish();
    debug!(
        "RLE decoded {} runs into {} bytes",
        runs.len() / 2,
        decoded.len()
    );
    Ok(decoded)
}

/// Encodes `data` into a complete `.rle` archive remembering `extension`.
pub fn write_archive(data: &[u8], extension: &str, progress: &mut Progress) -> Vec<u8> {
    let mut archive = ArchiveHeader::rle(extension, data.len() as u64).serialize();
    archive.extend(encode_with_progress(data, progress));
    archive
}

pub fn read_archive(archive: &[u8], progress: &mut Progress) -> Result<(ArchiveHeader, Vec<u8>)> {
    let (header, payload) = ArchiveHeader::parse(archive)?;
    header.expect_scheme(Scheme::Rle)?;
    if payload.is_empty() && header.original_len() > 0 {
        return Err(Error::EmptyArchive);
    }
    let data = decode_with_progress(payload, progress)?;
    if data.len() as u64 != header.original_len() {
        return Err(Error::malformed(format!(
            "RLE payload expands to {} bytes but the header records {}",
            data.len(),
            header.original_len()
        )));
    }
    Ok((header, data))
}
