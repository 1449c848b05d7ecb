use std::{
    cmp::Reverse,
    collections::{BTreeMap, BinaryHeap},
    fmt::Display,
    str::FromStr,
};

use log::{debug, trace};

use crate::{
    archive::{ArchiveHeader, Scheme},
    bits::{BitWriter, Bits},
    error::{Error, Result},
    progress::Progress,
};

/// Occurrence count of every byte value in an input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyTable {
    counts: [u64; 256],
}

impl FrequencyTable {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut counts = [0u64; 256];
        for &byte in bytes {
            counts[usize::from(byte)] += 1;
        }
        Self { counts }
    }

    pub fn count(&self, byte: u8) -> u64 {
        self.counts[usize::from(byte)]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn distinct(&self) -> usize {
        self.counts.iter().filter(|&&count| count > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.distinct() == 0
    }

    /// Bytes that occur at least once with their counts, in ascending byte order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, u64)> + '_ {
        (0..=u8::MAX)
            .zip(self.counts.iter().copied())
            .filter(|&(_, count)| count > 0)
    }
}

pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HuffmanNode {
    Leaf {
        byte: u8,
        weight: u64,
    },
    Internal {
        left: NodeId,
        right: NodeId,
        weight: u64,
    },
}

impl HuffmanNode {
    pub fn weight(&self) -> u64 {
        match self {
            HuffmanNode::Leaf { weight, .. } | HuffmanNode::Internal { weight, .. } => *weight,
        }
    }
}

/// Prefix-code tree stored as an arena; children always have smaller ids than their parent.
#[derive(Debug, Clone)]
pub struct HuffmanTree {
    nodes: Vec<HuffmanNode>,
    root: NodeId,
}

impl HuffmanTree {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &HuffmanNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Builds a Huffman tree by repeatedly merging the two lightest nodes.
///
/// Leaves are created in ascending byte order and ties on weight are broken by arena id (i.e.
/// insertion order), so the same table always yields the same tree. The first node popped
/// becomes the left child.
pub fn build_tree(frequencies: &FrequencyTable) -> Result<HuffmanTree> {
    let distinct = frequencies.distinct();
    let mut nodes = Vec::with_capacity(2 * distinct);
    let mut heap = BinaryHeap::with_capacity(distinct);
    for (byte, weight) in frequencies.iter() {
        heap.push(Reverse((weight, nodes.len())));
        nodes.push(HuffmanNode::Leaf { byte, weight });
    }

    loop {
        let Some(Reverse((left_weight, left))) = heap.pop() else {
            return Err(Error::EmptyInput);
        };
        let Some(Reverse((right_weight, right))) = heap.pop() else {
            debug!(
                "built Huffman tree with {} nodes over {distinct} symbols",
                nodes.len()
            );
            return Ok(HuffmanTree { nodes, root: left });
        };
        let weight = left_weight + right_weight;
        heap.push(Reverse((weight, nodes.len())));
        nodes.push(HuffmanNode::Internal {
            left,
            right,
            weight,
        });
    }
}

/// A codeword: the path from the root to a leaf, `false` for left and `true` for right.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Code(Vec<bool>);

impl Code {
    pub fn bits(&self) -> &[bool] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, bit: bool) {
        self.0.push(bit);
    }

    pub fn is_prefix_of(&self, other: &Code) -> bool {
        other.0.starts_with(&self.0)
    }

    /// The code packed MSB-first into `ceil(len / 8)` bytes, zero padded.
    pub fn to_packed(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.len().div_ceil(8)];
        for (i, &bit) in self.0.iter().enumerate() {
            if bit {
                bytes[i / 8] |= 1 << (7 - i % 8);
            }
        }
        bytes
    }

    /// Reads `bit_len` bits MSB-first; `packed` must hold at least `ceil(bit_len / 8)` bytes.
    pub fn from_packed(packed: &[u8], bit_len: usize) -> Self {
        Self(
            (0..bit_len)
                .map(|i| (packed[i / 8] >> (7 - i % 8)) & 1 == 1)
                .collect(),
        )
    }
}

impl From<Vec<bool>> for Code {
    fn from(bits: Vec<bool>) -> Self {
        Self(bits)
    }
}

impl FromStr for Code {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.chars()
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                c => Err(Error::malformed(format!("invalid code digit {c:?}"))),
            })
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }
}

impl Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &bit in &self.0 {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// Mapping from byte to codeword, ordered by byte.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeTable {
    codes: BTreeMap<u8, Code>,
}

impl CodeTable {
    pub fn get(&self, byte: u8) -> Option<&Code> {
        self.codes.get(&byte)
    }

    pub fn insert(&mut self, byte: u8, code: Code) -> Option<Code> {
        self.codes.insert(byte, code)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &Code)> + '_ {
        self.codes.iter().map(|(&byte, code)| (byte, code))
    }

    /// Checks that the table can drive a decoder: non-empty, prefix-free, and using the empty
    /// code only as the sole entry.
    pub fn validate(&self) -> Result<()> {
        if self.codes.is_empty() {
            return Err(Error::malformed("code table is empty"));
        }
        if self.codes.len() > 1 {
            if let Some((byte, _)) = self.iter().find(|(_, code)| code.is_empty()) {
                return Err(Error::malformed(format!(
                    "byte {byte:#04x} has an empty code in a table of {} entries",
                    self.codes.len()
                )));
            }
        }
        // In lexicographic order a code's extensions directly follow it.
        let mut sorted: Vec<(u8, &Code)> = self.iter().collect();
        sorted.sort_by(|a, b| a.1.cmp(b.1));
        for pair in sorted.windows(2) {
            let ((a, code_a), (b, code_b)) = (pair[0], pair[1]);
            if code_a.is_prefix_of(code_b) {
                return Err(Error::malformed(format!(
                    "code {code_a} of byte {a:#04x} is a prefix of code {code_b} of byte {b:#04x}"
                )));
            }
        }
        Ok(())
    }

    /// Number of payload bits needed to encode an input with these frequencies.
    pub fn encoded_bit_len(&self, frequencies: &FrequencyTable) -> u64 {
        frequencies
            .iter()
            .map(|(byte, count)| count * self.get(byte).map_or(0, |code| code.len() as u64))
            .sum()
    }

    fn lookup(&self) -> [&[bool]; 256] {
        let mut lookup: [&[bool]; 256] = [&[]; 256];
        for (byte, code) in self.iter() {
            lookup[usize::from(byte)] = code.bits();
        }
        lookup
    }
}

impl FromIterator<(u8, Code)> for CodeTable {
    fn from_iter<T: IntoIterator<Item = (u8, Code)>>(iter: T) -> Self {
        Self {
            codes: iter.into_iter().collect(),
        }
    }
}

/// Walks the tree depth-first with an explicit stack, so skewed trees cannot exhaust the call
/// stack. A tree made of a single leaf yields the empty code.
pub fn derive_codes(tree: &HuffmanTree) -> CodeTable {
    let mut table = CodeTable::default();
    let mut stack = vec![(tree.root(), Code::default())];
    while let Some((id, code)) = stack.pop() {
        match *tree.node(id) {
            HuffmanNode::Leaf { byte, .. } => {
                trace!("code for {byte:#04x}: {code}");
                table.insert(byte, code);
            }
            HuffmanNode::Internal { left, right, .. } => {
                let mut right_code = code.clone();
                right_code.push(true);
                let mut left_code = code;
                left_code.push(false);
                stack.push((right, right_code));
                stack.push((left, left_code));
            }
        }
    }
    table
}

pub fn encode(data: &[u8]) -> Result<(CodeTable, Vec<u8>)> {
    encode_with_progress(data, &mut Progress::silent())
}

pub fn encode_with_progress(
    data: &[u8],
    progress: &mut Progress,
) -> Result<(CodeTable, Vec<u8>)> {
    let frequencies = FrequencyTable::from_bytes(data);
    let codes = derive_codes(&build_tree(&frequencies)?);
    let bit_len = codes.encoded_bit_len(&frequencies);
    let lookup = codes.lookup();

    let mut writer = BitWriter::with_capacity(usize::try_from(bit_len).unwrap_or(0));
    progress.start(data.len());
    for (i, &byte) in data.iter().enumerate() {
        writer.push_bits(lookup[usize::from(byte)]);
        progress.advance(i + 1);
    }
    progress.finish();

    debug!(
        "Huffman encoded {} bytes into {bit_len} bits with {} codes",
        data.len(),
        codes.len()
    );
    Ok((codes, writer.finish()))
}

#[derive(Debug, Clone, Copy, Default)]
struct TrieNode {
    children: [Option<usize>; 2],
    byte: Option<u8>,
}

/// Reverse mapping from codewords to bytes, laid out as a binary trie rooted at index 0.
struct DecodeTrie {
    nodes: Vec<TrieNode>,
}

impl DecodeTrie {
    fn root_symbol(&self) -> Option<u8> {
        self.nodes[0].byte
    }
}

impl TryFrom<&CodeTable> for DecodeTrie {
    type Error = Error;

    fn try_from(codes: &CodeTable) -> Result<Self> {
        codes.validate()?;
        let mut nodes = vec![TrieNode::default()];
        for (byte, code) in codes.iter() {
            let mut current = 0;
            for &bit in code.bits() {
                let slot = usize::from(bit);
                current = match nodes[current].children[slot] {
                    Some(next) => next,
                    None => {
                        nodes.push(TrieNode::default());
                        let next = nodes.len() - 1;
                        nodes[current].children[slot] = Some(next);
                        next
                    }
                };
            }
            nodes[current].byte = Some(byte);
        }
        Ok(Self { nodes })
    }
}

/// Decodes a packed payload by matching the growing bit prefix against `codes`.
///
/// A table holding a single empty code carries no length information; use [`decode_exact`]
/// for those.
pub fn decode(codes: &CodeTable, payload: &[u8]) -> Result<Vec<u8>> {
    decode_with_progress(codes, payload, None, &mut Progress::silent())
}

/// Like [`decode`], but also requires exactly `original_len` bytes to come out.
pub fn decode_exact(codes: &CodeTable, payload: &[u8], original_len: usize) -> Result<Vec<u8>> {
    decode_with_progress(codes, payload, Some(original_len), &mut Progress::silent())
}

pub fn decode_with_progress(
    codes: &CodeTable,
    payload: &[u8],
    original_len: Option<usize>,
    progress: &mut Progress,
) -> Result<Vec<u8>> {
    let trie = DecodeTrie::try_from(codes)?;
    let mut bits = Bits::try_from(payload)?;
    let bit_count = bits.bit_count();

    if let Some(byte) = trie.root_symbol() {
        if bit_count != 0 {
            return Err(Error::CorruptStream { bit_offset: 0 });
        }
        let Some(original_len) = original_len else {
            return Err(Error::malformed(
                "a single-symbol code table needs the original length to decode",
            ));
        };
        let mut output = Vec::new();
        output.try_reserve_exact(original_len).map_err(|_| {
            Error::malformed(format!(
                "recorded length of {original_len} bytes cannot be allocated"
            ))
        })?;
        output.resize(original_len, byte);
        progress.finish();
        return Ok(output);
    }

    let mut output = Vec::with_capacity(original_len.unwrap_or(0).min(bit_count));
    let mut current = 0;
    let mut code_start = 0;
    progress.start(bit_count);
    while let Some(bit) = bits.next() {
        let Some(next) = trie.nodes[current].children[usize::from(bit)] else {
            return Err(Error::CorruptStream {
                bit_offset: bits.position() - 1,
            });
        };
        match trie.nodes[next].byte {
            Some(byte) => {
                output.push(byte);
                current = 0;
                code_start = bits.position();
                progress.advance(code_start);
            }
            None => current = next,
        }
    }
    if current != 0 {
        return Err(Error::CorruptStream {
            bit_offset: code_start,
        });
    }
    if original_len.is_some_and(|len| len != output.len()) {
        return Err(Error::CorruptStream {
            bit_offset: bit_count,
        });
    }
    progress.finish();

    debug!("Huffman decoded {bit_count} bits into {} bytes", output.len());
    Ok(output)
}

/// Encodes `data` into a complete `.huff` archive remembering `extension`.
pub fn write_archive(data: &[u8], extension: &str, progress: &mut Progress) -> Result<Vec<u8>> {
    let (codes, payload) = encode_with_progress(data, progress)?;
    let header = ArchiveHeader::huffman(extension, data.len() as u64, codes);
    let mut archive = header.serialize();
    archive.extend_from_slice(&payload);
    Ok(archive)
}

pub fn read_archive(archive: &[u8], progress: &mut Progress) -> Result<(ArchiveHeader, Vec<u8>)> {
    let (header, payload) = ArchiveHeader::parse(archive)?;
    header.expect_scheme(Scheme::Huffman)?;
    if header.original_len() == 0 {
        return Err(Error::malformed(
            "Huffman archives cannot record a zero-length original",
        ));
    }
    if payload.is_empty() {
        return Err(Error::EmptyArchive);
    }
    let original_len = usize::try_from(header.original_len())
        .map_err(|_| Error::malformed("original length does not fit in memory"))?;
    let codes = header
        .codes()
        .ok_or_else(|| Error::malformed("Huffman archive has no code table"))?;
    let data = decode_with_progress(codes, payload, Some(original_len), progress)?;
    Ok((header, data))
}
