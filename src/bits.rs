use crate::error::{Error, Result};

/// Accumulates bits MSB-first behind a one-byte padding count.
///
/// The first byte of the buffer is reserved and filled in by [`BitWriter::finish`] with the
/// number of zero bits appended to reach a byte boundary (0 to 7).
#[derive(Debug)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_count: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(bits: usize) -> Self {
        let mut bytes = Vec::with_capacity(1 + bits.div_ceil(8));
        bytes.push(0);
        Self {
            bytes,
            bit_count: 0,
        }
    }

    pub fn bit_count(&self) -> usize {
        self.bit_count
    }

    #[inline]
    pub fn push_bit(&mut self, bit: bool) {
        let bit_offset = self.bit_count % 8;
        if bit_offset == 0 {
            self.bytes.push(0);
        }
        if bit {
            let last = self.bytes.len() - 1;
            self.bytes[last] |= 1 << (7 - bit_offset);
        }
        self.bit_count += 1;
    }

    #[inline]
    pub fn push_bits(&mut self, bits: &[bool]) {
        for &bit in bits {
            self.push_bit(bit);
        }
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.bytes[0] = ((8 - self.bit_count % 8) % 8) as u8;
        self.bytes
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the bits of a packed buffer, padding excluded.
#[derive(Debug, Clone)]
pub struct Bits<'a> {
    bytes: &'a [u8],
    bit_cursor: usize,
    bit_count: usize,
}

impl<'a> Bits<'a> {
    /// Index of the next bit to be yielded.
    pub fn position(&self) -> usize {
        self.bit_cursor
    }

    /// Number of payload bits, padding excluded.
    pub fn bit_count(&self) -> usize {
        self.bit_count
    }
}

impl<'a> TryFrom<&'a [u8]> for Bits<'a> {
    type Error = Error;

    fn try_from(buffer: &'a [u8]) -> Result<Self> {
        let Some((&padding, bytes)) = buffer.split_first() else {
            return Err(Error::malformed("bit payload is missing its padding byte"));
        };
        if padding > 7 {
            return Err(Error::malformed(format!(
                "invalid padding count {padding} (expected 0..=7)"
            )));
        }
        // Padding longer than the payload leaves nothing to read; the decoder reports the
        // missing symbols.
        Ok(Self {
            bytes,
            bit_cursor: 0,
            bit_count: (bytes.len() * 8).saturating_sub(usize::from(padding)),
        })
    }
}

impl Iterator for Bits<'_> {
    type Item = bool;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.bit_cursor >= self.bit_count {
            return None;
        }
        let byte = self.bytes[self.bit_cursor / 8];
        let bit = (byte >> (7 - self.bit_cursor % 8)) & 1 == 1;
        self.bit_cursor += 1;
        Some(bit)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.bit_count - self.bit_cursor;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Bits<'_> {}

pub fn pack(bits: &[bool]) -> Vec<u8> {
    let mut writer = BitWriter::with_capacity(bits.len());
    writer.push_bits(bits);
    writer.finish()
}

pub fn unpack(buffer: &[u8]) -> Result<Vec<bool>> {
    Ok(Bits::try_from(buffer)?.collect())
}
