//! Little-endian primitives over in-memory buffers.
//!
//! Every read is checked against the remaining length before any slicing
//! happens, so malformed input turns into a [`ReadError`] rather than a panic.
//! Fixed-layout records (file header, generic chunk header) go through
//! `bincode` with fixed-width little-endian integers, which is exactly the
//! packed on-disk layout.

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("unexpected end of data at offset {offset}: needed {needed} bytes, {remaining} left")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        remaining: usize,
    },
    #[error("malformed fixed-size record")]
    Record(#[from] bincode::Error),
}

fn record_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .allow_trailing_bytes()
}

/// Forward-only cursor over a byte slice.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Returns the next `length` bytes and advances past them.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8], ReadError> {
        if length > self.remaining() {
            return Err(ReadError::UnexpectedEof {
                offset: self.pos,
                needed: length,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + length];
        self.pos += length;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ReadError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.read_bytes(N)?);
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8, ReadError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16, ReadError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_i16_le(&mut self) -> Result<i16, ReadError> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, ReadError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_tag(&mut self) -> Result<[u8; 4], ReadError> {
        self.read_array()
    }

    /// Decodes a fixed-layout record occupying exactly `size` bytes.
    pub fn read_record<T: DeserializeOwned>(&mut self, size: usize) -> Result<T, ReadError> {
        let bytes = self.read_bytes(size)?;
        Ok(record_options().deserialize(bytes)?)
    }
}

/// Append-only little-endian writer with support for back-patching
/// length fields once the final size is known.
#[derive(Debug, Default)]
pub struct ByteWriter {
    data: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> usize {
        self.data.len()
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn write_u16_le(&mut self, value: u16) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_u32_le(&mut self, value: u32) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_tag(&mut self, tag: [u8; 4]) {
        self.write_bytes(&tag);
    }

    pub fn write_record<T: Serialize>(&mut self, record: &T) -> Result<(), bincode::Error> {
        record_options().serialize_into(&mut self.data, record)
    }

    /// Overwrites four bytes at `pos`. Out-of-range positions are ignored.
    pub fn patch_u32_le(&mut self, pos: usize, value: u32) {
        if let Some(slot) = self.data.get_mut(pos..pos + 4) {
            slot.copy_from_slice(&value.to_le_bytes());
        }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_little_endian_fields() {
        let data = [b'C', b'L', b'U', b'T', 0x0A, 0, 0, 0, 0xFF, 0x3F, 0xFE, 0xFF];
        let mut reader = ByteReader::new(&data);
        assert_eq!(&reader.read_tag().unwrap(), b"CLUT");
        assert_eq!(reader.read_u32_le().unwrap(), 10);
        assert_eq!(reader.read_u16_le().unwrap(), 0x3FFF);
        assert_eq!(reader.read_i16_le().unwrap(), -2);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_short_read_reports_eof() {
        let data = [1, 2, 3];
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_u8().unwrap(), 1);
        assert!(matches!(
            reader.read_u32_le(),
            Err(ReadError::UnexpectedEof {
                offset: 1,
                needed: 4,
                remaining: 2
            })
        ));
        // A failed read does not move the cursor.
        assert_eq!(reader.position(), 1);
    }

    #[test]
    fn test_patch_u32() {
        let mut writer = ByteWriter::new();
        writer.write_tag(*b"PIXL");
        writer.write_u32_le(0);
        writer.patch_u32_le(4, 0xDEADBEEF);
        writer.patch_u32_le(6, 1); // out of range, ignored
        assert_eq!(
            writer.into_inner(),
            vec![b'P', b'I', b'X', b'L', 0xEF, 0xBE, 0xAD, 0xDE]
        );
    }

    #[test]
    fn test_record_layout_is_packed() {
        #[derive(Serialize, serde::Deserialize, Debug, PartialEq)]
        struct Pair {
            tag: [u8; 4],
            length: u32,
            flags: i16,
        }

        let pair = Pair {
            tag: *b"ABCD",
            length: 0x0102_0304,
            flags: -1,
        };
        let mut writer = ByteWriter::new();
        writer.write_record(&pair).unwrap();
        let bytes = writer.into_inner();
        assert_eq!(bytes, vec![b'A', b'B', b'C', b'D', 4, 3, 2, 1, 0xFF, 0xFF]);

        let mut reader = ByteReader::new(&bytes);
        let back: Pair = reader.read_record(10).unwrap();
        assert_eq!(back, pair);
    }
}
