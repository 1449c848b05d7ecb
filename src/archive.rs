use std::{fmt::Display, str::FromStr};

use crate::{
    error::{Error, Result},
    huffman::{Code, CodeTable},
};

const MAGIC: &[u8; 4] = b"SQSH";
const VERSION: u8 = 1;
const MAX_CODES: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Huffman,
    Rle,
}

impl Scheme {
    /// File extension of archives written with this scheme, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Scheme::Huffman => "huff",
            Scheme::Rle => "rle",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "huff" => Some(Self::Huffman),
            "rle" => Some(Self::Rle),
            _ => None,
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Scheme::Huffman => 1,
            Scheme::Rle => 2,
        }
    }
}

impl TryFrom<u8> for Scheme {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self> {
        match byte {
            1 => Ok(Self::Huffman),
            2 => Ok(Self::Rle),
            b => Err(Error::malformed(format!("unknown scheme tag {b:#x}"))),
        }
    }
}

impl FromStr for Scheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "huffman" | "huff" => Ok(Self::Huffman),
            "rle" => Ok(Self::Rle),
            _ => Err(Error::UnsupportedScheme(s.to_string())),
        }
    }
}

impl Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scheme::Huffman => write!(f, "Huffman"),
            Scheme::Rle => write!(f, "RLE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    End,
    Extension,
    OriginalLength,
    CodeTable,
}

impl TryFrom<u8> for Tag {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(Self::End),
            1 => Ok(Self::Extension),
            2 => Ok(Self::OriginalLength),
            3 => Ok(Self::CodeTable),
            b => Err(Error::malformed(format!("unknown header field tag {b:#x}"))),
        }
    }
}

impl From<Tag> for u8 {
    fn from(tag: Tag) -> Self {
        match tag {
            Tag::End => 0,
            Tag::Extension => 1,
            Tag::OriginalLength => 2,
            Tag::CodeTable => 3,
        }
    }
}

struct BytesReader<'a> {
    bytes: &'a [u8],
    byte_cursor: usize,
}

impl<'a> BytesReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            byte_cursor: 0,
        }
    }

    fn pop_bytes(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        let Some(bytes) = self
            .byte_cursor
            .checked_add(n)
            .and_then(|end| self.bytes.get(self.byte_cursor..end))
        else {
            return Err(Error::malformed(format!(
                "truncated header: {what} needs {n} bytes at offset {}",
                self.byte_cursor
            )));
        };
        self.byte_cursor += n;
        Ok(bytes)
    }

    fn pop_array<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let bytes = self.pop_bytes(N, what)?;
        let mut array = [0u8; N];
        array.copy_from_slice(bytes);
        Ok(array)
    }

    fn pop_byte(&mut self, what: &str) -> Result<u8> {
        Ok(self.pop_array::<1>(what)?[0])
    }

    fn rest(&self) -> &'a [u8] {
        &self.bytes[self.byte_cursor..]
    }
}

/// Metadata prefixed to every archive.
///
/// Layout: `SQSH`, a version byte, a scheme byte, then `tag: u8, len: u32 BE, value` records
/// closed by a zero tag. The payload starts right after the closing tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHeader {
    scheme: Scheme,
    extension: String,
    original_len: u64,
    codes: Option<CodeTable>,
}

impl ArchiveHeader {
    pub fn huffman(extension: &str, original_len: u64, codes: CodeTable) -> Self {
        Self {
            scheme: Scheme::Huffman,
            extension: extension.to_string(),
            original_len,
            codes: Some(codes),
        }
    }

    pub fn rle(extension: &str, original_len: u64) -> Self {
        Self {
            scheme: Scheme::Rle,
            extension: extension.to_string(),
            original_len,
            codes: None,
        }
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Extension of the original file, without the dot; empty if it had none.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn original_len(&self) -> u64 {
        self.original_len
    }

    pub fn codes(&self) -> Option<&CodeTable> {
        self.codes.as_ref()
    }

    pub fn expect_scheme(&self, scheme: Scheme) -> Result<()> {
        if self.scheme != scheme {
            return Err(Error::malformed(format!(
                "expected a {scheme} archive, found a {} archive",
                self.scheme
            )));
        }
        Ok(())
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.push(VERSION);
        bytes.push(self.scheme.tag());
        write_field(&mut bytes, Tag::Extension, self.extension.as_bytes());
        write_field(
            &mut bytes,
            Tag::OriginalLength,
            &self.original_len.to_be_bytes(),
        );
        if let Some(codes) = &self.codes {
            write_field(&mut bytes, Tag::CodeTable, &serialize_codes(codes));
        }
        bytes.push(Tag::End.into());
        bytes
    }

    /// Parses the header at the start of `bytes` and returns it along with the payload.
    pub fn parse(bytes: &[u8]) -> Result<(Self, &[u8])> {
        let mut reader = BytesReader::new(bytes);
        if reader.pop_bytes(MAGIC.len(), "magic")? != MAGIC {
            return Err(Error::malformed("not a squish archive (bad magic)"));
        }
        let version = reader.pop_byte("version")?;
        if version != VERSION {
            return Err(Error::malformed(format!(
                "unsupported archive version {version} (expected {VERSION})"
            )));
        }
        let scheme = Scheme::try_from(reader.pop_byte("scheme")?)?;

        let mut extension = None;
        let mut original_len = None;
        let mut codes = None;
        loop {
            let tag = Tag::try_from(reader.pop_byte("field tag")?)?;
            if tag == Tag::End {
                break;
            }
            let len = u32::from_be_bytes(reader.pop_array("field length")?) as usize;
            let value = reader.pop_bytes(len, "field value")?;
            match tag {
                Tag::Extension => {
                    let text = String::from_utf8(value.to_vec())
                        .map_err(|_| Error::malformed("extension is not valid UTF-8"))?;
                    if text.contains(['/', '\\', '\0']) || text.contains("..") {
                        return Err(Error::malformed(format!(
                            "extension {text:?} would escape the output directory"
                        )));
                    }
                    set_once(&mut extension, text, "extension")?;
                }
                Tag::OriginalLength => {
                    let value: [u8; 8] = value.try_into().map_err(|_| {
                        Error::malformed(format!("original length field has {len} bytes"))
                    })?;
                    set_once(&mut original_len, u64::from_be_bytes(value), "original length")?;
                }
                Tag::CodeTable => set_once(&mut codes, parse_codes(value)?, "code table")?,
                Tag::End => unreachable!(),
            }
        }

        let extension = extension.ok_or_else(|| Error::malformed("missing extension field"))?;
        let original_len =
            original_len.ok_or_else(|| Error::malformed("missing original length field"))?;
        match (scheme, &codes) {
            (Scheme::Huffman, None) => {
                return Err(Error::malformed("Huffman archive has no code table"))
            }
            (Scheme::Rle, Some(_)) => {
                return Err(Error::malformed("RLE archive carries a code table"))
            }
            _ => {}
        }

        Ok((
            Self {
                scheme,
                extension,
                original_len,
                codes,
            },
            reader.rest(),
        ))
    }
}

impl Display for ArchiveHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Scheme: {}", self.scheme)?;
        writeln!(
            f,
            "Original extension: {}",
            if self.extension.is_empty() {
                "none".to_string()
            } else {
                format!(".{}", self.extension)
            }
        )?;
        write!(f, "Original length: {} bytes", self.original_len)?;
        if let Some(codes) = &self.codes {
            write!(f, "\nCode table: {} entries", codes.len())?;
        }
        Ok(())
    }
}

fn write_field(bytes: &mut Vec<u8>, tag: Tag, value: &[u8]) {
    bytes.push(tag.into());
    bytes.extend_from_slice(&(value.len() as u32).to_be_bytes());
    bytes.extend_from_slice(value);
}

fn set_once<T>(slot: &mut Option<T>, value: T, field: &str) -> Result<()> {
    if slot.replace(value).is_some() {
        return Err(Error::malformed(format!("duplicate {field} field")));
    }
    Ok(())
}

// count: u16 BE, then per entry byte: u8, bit_len: u16 BE, ceil(bit_len / 8) code bytes
fn serialize_codes(codes: &CodeTable) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&(codes.len() as u16).to_be_bytes());
    for (byte, code) in codes.iter() {
        bytes.push(byte);
        bytes.extend_from_slice(&(code.len() as u16).to_be_bytes());
        bytes.extend_from_slice(&code.to_packed());
    }
    bytes
}

fn parse_codes(value: &[u8]) -> Result<CodeTable> {
    let mut reader = BytesReader::new(value);
    let count = usize::from(u16::from_be_bytes(reader.pop_array("code count")?));
    if count == 0 || count > MAX_CODES {
        return Err(Error::malformed(format!(
            "code table declares {count} entries"
        )));
    }
    let mut codes = CodeTable::default();
    for _ in 0..count {
        let byte = reader.pop_byte("code symbol")?;
        let bit_len = usize::from(u16::from_be_bytes(reader.pop_array("code length")?));
        let packed = reader.pop_bytes(bit_len.div_ceil(8), "code bits")?;
        if codes.insert(byte, Code::from_packed(packed, bit_len)).is_some() {
            return Err(Error::malformed(format!(
                "byte {byte:#04x} appears twice in the code table"
            )));
        }
    }
    if !reader.rest().is_empty() {
        return Err(Error::malformed("trailing bytes after the code table"));
    }
    codes.validate()?;
    Ok(codes)
}

#[cfg(test)]
mod tests {
    use crate::archive::{ArchiveHeader, Scheme};
    use crate::error::Error;
    use crate::huffman::{Code, CodeTable};

    fn codes() -> CodeTable {
        [
            (b'a', "1".parse::<Code>().unwrap()),
            (b'b', "01".parse().unwrap()),
            (b'c', "00".parse().unwrap()),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn rle_header_layout() {
        let bytes = ArchiveHeader::rle("txt", 5).serialize();
        assert_eq!(
            b"SQSH\x01\x02\
              \x01\x00\x00\x00\x03txt\
              \x02\x00\x00\x00\x08\x00\x00\x00\x00\x00\x00\x00\x05\
              \x00"
                .to_vec(),
            bytes
        );
    }

    #[test]
    fn parse_returns_payload() {
        let header = ArchiveHeader::huffman("tar.gz", 1234, codes());
        let mut bytes = header.serialize();
        bytes.extend_from_slice(b"payload");

        let (parsed, payload) = ArchiveHeader::parse(&bytes).unwrap();
        assert_eq!(header, parsed);
        assert_eq!(b"payload", payload);
        assert_eq!(Scheme::Huffman, parsed.scheme());
        assert_eq!("tar.gz", parsed.extension());
        assert_eq!(1234, parsed.original_len());
        assert_eq!(Some(&codes()), parsed.codes());
    }

    #[test]
    fn empty_extension_and_payload() {
        let bytes = ArchiveHeader::rle("", 0).serialize();
        let (parsed, payload) = ArchiveHeader::parse(&bytes).unwrap();
        assert_eq!("", parsed.extension());
        assert!(payload.is_empty());
    }

    #[test]
    fn rejects_foreign_and_truncated_headers() {
        let bytes = ArchiveHeader::huffman("txt", 3, codes()).serialize();
        for len in 0..bytes.len() {
            assert!(
                matches!(
                    ArchiveHeader::parse(&bytes[..len]),
                    Err(Error::MalformedArchive(_))
                ),
                "prefix of {len} bytes parsed"
            );
        }

        let mut wrong_magic = bytes.clone();
        wrong_magic[0] = b'X';
        assert!(matches!(
            ArchiveHeader::parse(&wrong_magic),
            Err(Error::MalformedArchive(_))
        ));

        let mut wrong_version = bytes.clone();
        wrong_version[4] = 9;
        assert!(matches!(
            ArchiveHeader::parse(&wrong_version),
            Err(Error::MalformedArchive(_))
        ));

        let mut wrong_scheme = bytes;
        wrong_scheme[5] = 2;
        assert!(matches!(
            ArchiveHeader::parse(&wrong_scheme),
            Err(Error::MalformedArchive(_))
        ));
    }

    #[test]
    fn rejects_duplicate_fields() {
        let mut bytes = ArchiveHeader::rle("a", 1).serialize();
        bytes.pop();
        bytes.extend_from_slice(b"\x01\x00\x00\x00\x01b\x00");
        assert!(matches!(
            ArchiveHeader::parse(&bytes),
            Err(Error::MalformedArchive(_))
        ));
    }

    #[test]
    fn rejects_path_like_extensions() {
        for extension in ["txt/../../etc/passwd", "..", "a\\b", "x/y"] {
            let bytes = ArchiveHeader::rle(extension, 0).serialize();
            assert!(
                matches!(
                    ArchiveHeader::parse(&bytes),
                    Err(Error::MalformedArchive(_))
                ),
                "{extension:?} accepted"
            );
        }
        assert!(ArchiveHeader::parse(&ArchiveHeader::rle("tar.gz", 0).serialize()).is_ok());
    }

    #[test]
    fn expect_scheme_mismatch() {
        let header = ArchiveHeader::rle("txt", 0);
        assert!(header.expect_scheme(Scheme::Rle).is_ok());
        assert!(matches!(
            header.expect_scheme(Scheme::Huffman),
            Err(Error::MalformedArchive(_))
        ));
    }

    #[test]
    fn scheme_names() {
        assert_eq!(Scheme::Huffman, "Huffman".parse::<Scheme>().unwrap());
        assert_eq!(Scheme::Huffman, "huff".parse::<Scheme>().unwrap());
        assert_eq!(Scheme::Rle, "RLE".parse::<Scheme>().unwrap());
        assert!(matches!(
            "lzw".parse::<Scheme>(),
            Err(Error::UnsupportedScheme(name)) if name == "lzw"
        ));
        assert_eq!(Some(Scheme::Rle), Scheme::from_extension("rle"));
        assert_eq!(None, Scheme::from_extension("txt"));
        assert_eq!("huff", Scheme::Huffman.extension());
    }

    #[test]
    fn display() {
        assert_eq!(
            "Scheme: Huffman\nOriginal extension: .txt\nOriginal length: 3 bytes\nCode table: 3 entries",
            ArchiveHeader::huffman("txt", 3, codes()).to_string()
        );
        assert_eq!(
            "Scheme: RLE\nOriginal extension: none\nOriginal length: 0 bytes",
            ArchiveHeader::rle("", 0).to_string()
        );
    }
}
