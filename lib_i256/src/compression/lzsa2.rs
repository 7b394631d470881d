use log::trace;
use thiserror::Error;

/// Shortest back-reference the format can express.
const MIN_MATCH: usize = 2;
const MAX_MATCH: usize = u16::MAX as usize;
const MAX_LITERALS: usize = u16::MAX as usize;
const MAX_DISTANCE: usize = u16::MAX as usize;
/// How many earlier positions the matcher visits per input byte.
const MAX_CHAIN: usize = 48;
/// Output bytes reserved per input byte before decoding starts.
const INITIAL_EXPANSION: usize = 8;
const NIL: usize = usize::MAX;

const LITERALS_RUN: usize = 3;
const LITERALS_NIBBLE_MAX: usize = LITERALS_RUN + 15;
const LITERALS_WORD_MARKER: u8 = 239;

const MATCH_RUN: usize = 7;
const MATCH_NIBBLE_MAX: usize = MIN_MATCH + MATCH_RUN + 15;
const EOD_MARKER: u8 = 232;
const MATCH_WORD_MARKER: u8 = 233;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Lzsa2DecompressionError {
    #[error("compressed stream ends early at position {position}")]
    Truncated { position: usize },
    #[error("back-reference distance {distance} exceeds the {produced} bytes decoded so far")]
    InvalidOffset { distance: usize, produced: usize },
    #[error("repeat offset used before any match")]
    MissingRepeatOffset,
    #[error("stream expands past the expected {expected} bytes")]
    OutputOverflow { expected: usize },
    #[error("stream expands to {actual} bytes, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("{remaining} bytes follow the end-of-data marker")]
    TrailingData { remaining: usize },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Lzsa2CompressionError {
    #[error("literal run of {0} bytes exceeds the encodable maximum of 65535")]
    LiteralRunTooLong(usize),
}

/// Reads bytes and half-bytes from a compressed block. Nibbles come two per
/// byte, high half first; the byte is taken from the stream when the first
/// half is requested.
struct BlockReader<'a> {
    data: &'a [u8],
    pos: usize,
    pending_nibble: Option<u8>,
}

impl<'a> BlockReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            pending_nibble: None,
        }
    }

    fn byte(&mut self) -> Result<u8, Lzsa2DecompressionError> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or(Lzsa2DecompressionError::Truncated { position: self.pos })?;
        self.pos += 1;
        Ok(byte)
    }

    fn word(&mut self) -> Result<u16, Lzsa2DecompressionError> {
        let low = self.byte()?;
        let high = self.byte()?;
        Ok(u16::from_le_bytes([low, high]))
    }

    fn nibble(&mut self) -> Result<u8, Lzsa2DecompressionError> {
        match self.pending_nibble.take() {
            Some(low) => Ok(low),
            None => {
                let byte = self.byte()?;
                self.pending_nibble = Some(byte & 0x0F);
                Ok(byte >> 4)
            }
        }
    }

    fn slice(&mut self, length: usize) -> Result<&'a [u8], Lzsa2DecompressionError> {
        let end = self
            .pos
            .checked_add(length)
            .filter(|&end| end <= self.data.len())
            .ok_or(Lzsa2DecompressionError::Truncated {
                position: self.data.len(),
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

enum Offset {
    Repeat,
    Distance(usize),
}

fn read_literal_count(
    token: u8,
    reader: &mut BlockReader,
) -> Result<usize, Lzsa2DecompressionError> {
    let count = ((token >> 3) & 0x03) as usize;
    if count < LITERALS_RUN {
        return Ok(count);
    }
    let nibble = reader.nibble()? as usize;
    if nibble < 15 {
        return Ok(LITERALS_RUN + nibble);
    }
    match reader.byte()? {
        LITERALS_WORD_MARKER => Ok(reader.word()? as usize),
        extra => Ok(LITERALS_NIBBLE_MAX + extra as usize),
    }
}

fn read_offset(token: u8, reader: &mut BlockReader) -> Result<Offset, Lzsa2DecompressionError> {
    // Z is stored inverted in every class that uses it.
    let z = (((token >> 5) & 0x01) ^ 0x01) as usize;
    let distance = match token >> 6 {
        0b00 => {
            let nibble = reader.nibble()? as usize;
            32 - ((nibble << 1) | z)
        }
        0b01 => {
            let low = reader.byte()? as usize;
            512 - ((z << 8) | low)
        }
        0b10 => {
            let nibble = reader.nibble()? as usize;
            let low = reader.byte()? as usize;
            8704 - ((nibble << 9) | (z << 8) | low)
        }
        _ if token & 0x20 == 0 => {
            let high = reader.byte()? as usize;
            let low = reader.byte()? as usize;
            0x10000 - ((high << 8) | low)
        }
        _ => return Ok(Offset::Repeat),
    };
    Ok(Offset::Distance(distance))
}

/// `None` marks end of data.
fn read_match_length(
    token: u8,
    reader: &mut BlockReader,
) -> Result<Option<usize>, Lzsa2DecompressionError> {
    let encoded = (token & 0x07) as usize;
    if encoded < MATCH_RUN {
        return Ok(Some(MIN_MATCH + encoded));
    }
    let nibble = reader.nibble()? as usize;
    if nibble < 15 {
        return Ok(Some(MIN_MATCH + MATCH_RUN + nibble));
    }
    match reader.byte()? {
        EOD_MARKER => Ok(None),
        MATCH_WORD_MARKER => Ok(Some(reader.word()? as usize)),
        extra => Ok(Some(MATCH_NIBBLE_MAX + extra as usize)),
    }
}

/// Expands an LZSA2 raw block that must produce exactly `expected_len`
/// bytes. The output never grows past `expected_len`.
pub fn lzsa2_decompression(
    data: &[u8],
    expected_len: usize,
) -> Result<Vec<u8>, Lzsa2DecompressionError> {
    let mut reader = BlockReader::new(data);
    // Reserve by input size. The output grows only as the stream produces it.
    let mut output: Vec<u8> = Vec::with_capacity(
        expected_len.min(data.len().saturating_mul(INITIAL_EXPANSION)),
    );
    let mut repeat: Option<usize> = None;

    loop {
        let token = reader.byte()?;

        let literals = read_literal_count(token, &mut reader)?;
        if literals > expected_len - output.len() {
            return Err(Lzsa2DecompressionError::OutputOverflow {
                expected: expected_len,
            });
        }
        output.extend_from_slice(reader.slice(literals)?);

        let offset = read_offset(token, &mut reader)?;
        let Some(length) = read_match_length(token, &mut reader)? else {
            break;
        };

        let distance = match offset {
            Offset::Distance(distance) => distance,
            Offset::Repeat => repeat.ok_or(Lzsa2DecompressionError::MissingRepeatOffset)?,
        };
        if distance == 0 || distance > output.len() {
            return Err(Lzsa2DecompressionError::InvalidOffset {
                distance,
                produced: output.len(),
            });
        }
        if length > expected_len - output.len() {
            return Err(Lzsa2DecompressionError::OutputOverflow {
                expected: expected_len,
            });
        }

        // Byte by byte: the source may overlap the bytes being produced.
        let start = output.len() - distance;
        for i in 0..length {
            let byte = output[start + i];
            output.push(byte);
        }
        repeat = Some(distance);
    }

    if reader.remaining() > 0 {
        return Err(Lzsa2DecompressionError::TrailingData {
            remaining: reader.remaining(),
        });
    }
    if output.len() != expected_len {
        return Err(Lzsa2DecompressionError::LengthMismatch {
            expected: expected_len,
            actual: output.len(),
        });
    }

    Ok(output)
}

/// Writes bytes and nibbles in the order the reader consumes them.
struct BlockWriter {
    data: Vec<u8>,
    nibble_slot: Option<usize>,
}

impl BlockWriter {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            nibble_slot: None,
        }
    }

    fn byte(&mut self, value: u8) {
        self.data.push(value);
    }

    fn word(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    fn nibble(&mut self, value: u8) {
        match self.nibble_slot.take() {
            Some(slot) => self.data[slot] |= value & 0x0F,
            None => {
                self.nibble_slot = Some(self.data.len());
                self.data.push(value << 4);
            }
        }
    }

    fn literal_extension(&mut self, count: usize) {
        if count < LITERALS_RUN {
            return;
        }
        if count < LITERALS_NIBBLE_MAX {
            self.nibble((count - LITERALS_RUN) as u8);
        } else if count - LITERALS_NIBBLE_MAX < LITERALS_WORD_MARKER as usize {
            self.nibble(15);
            self.byte((count - LITERALS_NIBBLE_MAX) as u8);
        } else {
            self.nibble(15);
            self.byte(LITERALS_WORD_MARKER);
            self.word(count as u16);
        }
    }

    fn offset(&mut self, distance: usize) {
        if distance <= 32 {
            self.nibble(((32 - distance) >> 1) as u8);
        } else if distance <= 512 {
            self.byte(((512 - distance) & 0xFF) as u8);
        } else if distance <= 8704 {
            let value = 8704 - distance;
            self.nibble((value >> 9) as u8);
            self.byte((value & 0xFF) as u8);
        } else {
            let value = 0x10000 - distance;
            self.byte((value >> 8) as u8);
            self.byte((value & 0xFF) as u8);
        }
    }

    fn match_extension(&mut self, length: usize) {
        let encoded = length - MIN_MATCH;
        if encoded < MATCH_RUN {
            return;
        }
        if length < MATCH_NIBBLE_MAX {
            self.nibble((length - MIN_MATCH - MATCH_RUN) as u8);
        } else if length - MATCH_NIBBLE_MAX < EOD_MARKER as usize {
            self.nibble(15);
            self.byte((length - MATCH_NIBBLE_MAX) as u8);
        } else {
            self.nibble(15);
            self.byte(MATCH_WORD_MARKER);
            self.word(length as u16);
        }
    }

    fn end_of_data(&mut self) {
        self.nibble(15);
        self.byte(EOD_MARKER);
    }
}

fn offset_bits(distance: usize, repeat: Option<usize>) -> u8 {
    if repeat == Some(distance) {
        return 0xE0;
    }
    // Z is written inverted; see `read_offset`.
    if distance <= 32 {
        let z = ((32 - distance) & 0x01) as u8 ^ 0x01;
        z << 5
    } else if distance <= 512 {
        let z = (((512 - distance) >> 8) & 0x01) as u8 ^ 0x01;
        0x40 | (z << 5)
    } else if distance <= 8704 {
        let z = (((8704 - distance) >> 8) & 0x01) as u8 ^ 0x01;
        0x80 | (z << 5)
    } else {
        0xC0
    }
}

fn literal_bits(count: usize) -> u8 {
    (count.min(LITERALS_RUN) as u8) << 3
}

fn match_bits(length: usize) -> u8 {
    (length - MIN_MATCH).min(MATCH_RUN) as u8
}

fn command(
    out: &mut BlockWriter,
    literals: &[u8],
    matched: Option<(usize, usize)>,
    repeat: &mut Option<usize>,
) -> Result<(), Lzsa2CompressionError> {
    if literals.len() > MAX_LITERALS {
        return Err(Lzsa2CompressionError::LiteralRunTooLong(literals.len()));
    }

    match matched {
        Some((length, distance)) => {
            let token =
                offset_bits(distance, *repeat) | literal_bits(literals.len()) | match_bits(length);
            out.byte(token);
            out.literal_extension(literals.len());
            out.data.extend_from_slice(literals);
            if *repeat != Some(distance) {
                out.offset(distance);
            }
            out.match_extension(length);
            *repeat = Some(distance);
        }
        None => {
            // Repeat-offset class with the extended match length, so no
            // offset bytes precede the marker.
            out.byte(0xE0 | literal_bits(literals.len()) | MATCH_RUN as u8);
            out.literal_extension(literals.len());
            out.data.extend_from_slice(literals);
            out.end_of_data();
        }
    }
    Ok(())
}

fn common_prefix(data: &[u8], earlier: usize, pos: usize) -> usize {
    let limit = (data.len() - pos).min(MAX_MATCH);
    let mut length = 0;
    while length < limit && data[earlier + length] == data[pos + length] {
        length += 1;
    }
    length
}

/// Hash chains keyed by the two bytes at each position.
struct MatchFinder {
    head: Vec<usize>,
    prev: Vec<usize>,
}

impl MatchFinder {
    fn new(len: usize) -> Self {
        Self {
            head: vec![NIL; 1 << 16],
            prev: vec![NIL; len],
        }
    }

    fn key(data: &[u8], pos: usize) -> usize {
        ((data[pos] as usize) << 8) | data[pos + 1] as usize
    }

    fn insert(&mut self, data: &[u8], pos: usize) {
        if pos + 1 >= data.len() {
            return;
        }
        let key = Self::key(data, pos);
        self.prev[pos] = self.head[key];
        self.head[key] = pos;
    }

    /// Longest earlier match at `pos` as `(length, distance)`. Closer
    /// candidates win ties; the repeat offset wins over any equal length.
    fn find(&self, data: &[u8], pos: usize, repeat: Option<usize>) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize)> = None;

        let mut candidate = self.head[Self::key(data, pos)];
        let mut steps = 0;
        while candidate != NIL && steps < MAX_CHAIN {
            let distance = pos - candidate;
            if distance > MAX_DISTANCE {
                break;
            }
            let length = common_prefix(data, candidate, pos);
            if length >= MIN_MATCH && best.map_or(true, |(best_len, _)| length > best_len) {
                best = Some((length, distance));
            }
            candidate = self.prev[candidate];
            steps += 1;
        }

        if let Some(distance) = repeat.filter(|&d| d <= pos) {
            let length = common_prefix(data, pos - distance, pos);
            if length >= MIN_MATCH && best.map_or(true, |(best_len, _)| length >= best_len) {
                best = Some((length, distance));
            }
        }

        // A two-byte match with a long offset costs more than the literals.
        best.filter(|&(length, distance)| {
            length > MIN_MATCH || distance <= 512 || repeat == Some(distance)
        })
    }
}

/// Greedy LZSA2 encoder. Produces a single raw block terminated by the
/// end-of-data marker.
pub fn lzsa2_compression(data: &[u8]) -> Result<Vec<u8>, Lzsa2CompressionError> {
    let mut out = BlockWriter::with_capacity(data.len() / 2 + 4);
    let mut finder = MatchFinder::new(data.len());
    let mut repeat: Option<usize> = None;
    let mut literal_start = 0;
    let mut pos = 0;

    while pos + MIN_MATCH <= data.len() {
        match finder.find(data, pos, repeat) {
            Some((length, distance)) => {
                trace!("match at {}: length={} distance={}", pos, length, distance);
                command(
                    &mut out,
                    &data[literal_start..pos],
                    Some((length, distance)),
                    &mut repeat,
                )?;
                for p in pos..pos + length {
                    finder.insert(data, p);
                }
                pos += length;
                literal_start = pos;
            }
            None => {
                finder.insert(data, pos);
                pos += 1;
            }
        }
    }

    command(&mut out, &data[literal_start..], None, &mut repeat)?;
    Ok(out.data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(data: &[u8]) {
        let compressed = lzsa2_compression(data).unwrap();
        let decompressed = lzsa2_decompression(&compressed, data.len()).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_lzsa2_empty_input() {
        let compressed = lzsa2_compression(&[]).unwrap();
        // token, then the nibble byte holding 15 and the EOD marker
        assert_eq!(compressed, vec![0xE7, 0xF0, EOD_MARKER]);
        assert!(lzsa2_decompression(&compressed, 0).unwrap().is_empty());
    }

    #[test]
    fn test_lzsa2_single_byte() {
        round_trip(&[42]);
    }

    #[test]
    fn test_lzsa2_repeated_byte_uses_overlap() {
        let data = vec![7u8; 1000];
        let compressed = lzsa2_compression(&data).unwrap();
        assert!(compressed.len() < 16);
        assert_eq!(lzsa2_decompression(&compressed, 1000).unwrap(), data);
    }

    #[test]
    fn test_lzsa2_alternating_pattern() {
        round_trip(&[0, 1, 0, 1, 0, 1, 0, 1]);
    }

    #[test]
    fn test_lzsa2_no_repetition() {
        let data: Vec<u8> = (0..=255).collect();
        round_trip(&data);
    }

    #[test]
    fn test_lzsa2_every_offset_class() {
        // Pseudo-random filler with repeats planted at 20, 300, 5000 and
        // 20000 bytes back.
        let mut state = 0x1234_5678u32;
        let mut data = Vec::with_capacity(40000);
        for _ in 0..40000 {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            data.push((state >> 24) as u8);
        }
        for (i, &distance) in [20usize, 300, 5000, 20000].iter().enumerate() {
            let at = 21000 + i * 2000;
            let source = data[at - distance..at - distance + 64].to_vec();
            data[at..at + 64].copy_from_slice(&source);
        }
        round_trip(&data);
    }

    #[test]
    fn test_lzsa2_long_literal_and_match_runs() {
        let mut data: Vec<u8> = (0..300u32).map(|i| (i * 7 % 251) as u8).collect();
        data.extend(std::iter::repeat(9u8).take(70000));
        round_trip(&data);
    }

    #[test]
    fn test_lzsa2_literal_run_too_long() {
        let mut state = 1u32;
        let data: Vec<u8> = (0..70000)
            .map(|i| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
                ((state >> 16) as u8) ^ (i as u8)
            })
            .collect();
        // Random bytes have no usable two-byte match often enough to be
        // split, which the single-block format cannot express.
        match lzsa2_compression(&data) {
            Ok(compressed) => {
                assert_eq!(lzsa2_decompression(&compressed, data.len()).unwrap(), data)
            }
            Err(e) => assert!(matches!(e, Lzsa2CompressionError::LiteralRunTooLong(_))),
        }
    }

    #[test]
    fn test_lzsa2_hand_assembled_repeat_offset() {
        // "ab", match 4 at distance 2, then "x", repeat-offset match 2.
        // token 0x32: XYZ=001 (5-bit, Z=1 so inverted bit 0), LL=2, MMM=2
        //   offset nibble: 32 - 2 = 30 -> nibble 15, bit 0 clear
        // token 0xE8: XYZ=111, LL=1, MMM=0
        // token 0xE7: the low half of 0xFF supplies the 15, then EOD
        let stream = [0x32, b'a', b'b', 0xFF, 0xE8, b'x', 0xE7, EOD_MARKER];
        let out = lzsa2_decompression(&stream, 9).unwrap();
        assert_eq!(out, b"abababxbx");
    }

    fn literals(count: usize) -> Vec<u8> {
        (0..count).map(|i| (i * 31 % 253) as u8).collect()
    }

    #[test]
    fn test_lzsa2_hand_assembled_9bit_offset() {
        // token 0x5F: XYZ=010 (Z stored 0, so 1), LL=3, MMM=7
        //   literal nibble 15 + byte 10 -> 28 literals
        //   offset byte 0xFE: 512 - (1 << 8 | 0xFE) = 2
        //   match nibble 15 (low half of 0xFF), marker 233, word 300
        // token 0xE7: repeat offset, match nibble 3 -> 12, low half 15 left
        // token 0xE7: pending 15, then EOD
        let lits = literals(28);
        let mut stream = vec![0x5F, 0xFF, 10];
        stream.extend_from_slice(&lits);
        stream.extend_from_slice(&[0xFE, MATCH_WORD_MARKER, 0x2C, 0x01]);
        stream.extend_from_slice(&[0xE7, 0x3F, 0xE7, EOD_MARKER]);

        let mut expected = lits.clone();
        for i in 0..312 {
            expected.push(lits[26 + i % 2]);
        }
        assert_eq!(lzsa2_decompression(&stream, 340).unwrap(), expected);
    }

    #[test]
    fn test_lzsa2_hand_assembled_13bit_offset() {
        // token 0x98: XYZ=100 (Z stored 0, so 1), LL=3, MMM=0
        //   literal nibble 15, marker 239, word 600
        //   offset nibble 15 (low half of 0xFF) and byte 0xFF:
        //   8704 - (15 << 9 | 1 << 8 | 0xFF) = 513
        //   match length 2
        let lits = literals(600);
        let mut stream = vec![0x98, 0xFF, LITERALS_WORD_MARKER, 0x58, 0x02];
        stream.extend_from_slice(&lits);
        stream.extend_from_slice(&[0xFF, 0xE7, 0xF0, EOD_MARKER]);

        let mut expected = lits.clone();
        expected.extend_from_slice(&lits[87..89]);
        assert_eq!(lzsa2_decompression(&stream, 602).unwrap(), expected);
    }

    #[test]
    fn test_lzsa2_hand_assembled_16bit_offset() {
        // token 0xDF: XYZ=110, LL=3, MMM=7
        //   literal nibble 15, marker 239, word 700
        //   offset bytes 0xFD 0xA8: 0x10000 - 0xFDA8 = 600
        //   match nibble 15 (low half of 0xFF) + byte 6 -> 30
        let lits = literals(700);
        let mut stream = vec![0xDF, 0xFF, LITERALS_WORD_MARKER, 0xBC, 0x02];
        stream.extend_from_slice(&lits);
        stream.extend_from_slice(&[0xFD, 0xA8, 6, 0xE7, 0xF0, EOD_MARKER]);

        let mut expected = lits.clone();
        expected.extend_from_slice(&lits[100..130]);
        assert_eq!(lzsa2_decompression(&stream, 730).unwrap(), expected);
    }

    #[test]
    fn test_lzsa2_decomp_huge_expected_length() {
        // The empty stream cannot produce anything close to this.
        assert_eq!(
            lzsa2_decompression(&[0xE7, 0xF0, EOD_MARKER], usize::MAX),
            Err(Lzsa2DecompressionError::LengthMismatch {
                expected: usize::MAX,
                actual: 0
            })
        );
    }

    #[test]
    fn test_lzsa2_decomp_invalid_offset() {
        // Match with distance 32 when nothing has been written yet.
        let stream = [0x20, 0x0F, 0xE7, EOD_MARKER];
        assert!(matches!(
            lzsa2_decompression(&stream, 2),
            Err(Lzsa2DecompressionError::InvalidOffset { distance: 32, produced: 0 })
        ));
    }

    #[test]
    fn test_lzsa2_decomp_repeat_without_match() {
        let stream = [0xE8, b'a', 0xE7, 0xF0, EOD_MARKER];
        assert_eq!(
            lzsa2_decompression(&stream, 3),
            Err(Lzsa2DecompressionError::MissingRepeatOffset)
        );
    }

    #[test]
    fn test_lzsa2_decomp_truncated() {
        let compressed = lzsa2_compression(b"hello hello hello").unwrap();
        for cut in 0..compressed.len() {
            assert!(lzsa2_decompression(&compressed[..cut], 17).is_err());
        }
    }

    #[test]
    fn test_lzsa2_decomp_missing_end_marker() {
        assert_eq!(
            lzsa2_decompression(&[0x08, b'a'], 1),
            Err(Lzsa2DecompressionError::Truncated { position: 2 })
        );
    }

    #[test]
    fn test_lzsa2_decomp_trailing_data() {
        let mut compressed = lzsa2_compression(b"abc").unwrap();
        compressed.push(0);
        assert_eq!(
            lzsa2_decompression(&compressed, 3),
            Err(Lzsa2DecompressionError::TrailingData { remaining: 1 })
        );
    }

    #[test]
    fn test_lzsa2_decomp_length_mismatch() {
        let compressed = lzsa2_compression(b"abcdef").unwrap();
        assert_eq!(
            lzsa2_decompression(&compressed, 10),
            Err(Lzsa2DecompressionError::LengthMismatch {
                expected: 10,
                actual: 6
            })
        );
        assert_eq!(
            lzsa2_decompression(&compressed, 4),
            Err(Lzsa2DecompressionError::OutputOverflow { expected: 4 })
        );
    }
}
