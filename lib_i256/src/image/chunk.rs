use std::fmt;

use log::{error, trace};
use serde::{Serialize, Serializer};
use thiserror::Error;

use super::format::ChunkHeader;
use crate::bytes::ByteReader;
use crate::constants::{CHUNK_HEADER_SIZE, CLUT_HEADER_SIZE, PIXL_HEADER_SIZE};

/// Four ASCII bytes naming a chunk kind.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag(pub [u8; 4]);

impl Tag {
    pub const CLUT: Tag = Tag(*b"CLUT");
    pub const PIXL: Tag = Tag(*b"PIXL");

    /// Smallest legal declared length for chunks of this kind.
    pub fn min_length(self) -> usize {
        match self {
            Tag::CLUT => CLUT_HEADER_SIZE,
            Tag::PIXL => PIXL_HEADER_SIZE,
            _ => CHUNK_HEADER_SIZE,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &byte in &self.0 {
            if byte.is_ascii_graphic() || byte == b' ' {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "\\x{:02x}", byte)?;
            }
        }
        Ok(())
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ChunkError {
    #[error("chunk {tag} at offset {offset} declares {declared} bytes but only {available} remain")]
    Truncated {
        tag: Tag,
        offset: usize,
        declared: u32,
        available: usize,
    },
    #[error("chunk {tag} at offset {offset} declares {declared} bytes, below its minimum of {minimum}")]
    TooShort {
        tag: Tag,
        offset: usize,
        declared: u32,
        minimum: usize,
    },
}

/// One chunk as found in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRef<'a> {
    pub tag: Tag,
    /// Includes the 8-byte generic header.
    pub declared_length: u32,
    /// Absolute offset of the chunk's first byte.
    pub offset: usize,
    /// Absolute offset of the first byte after the generic header.
    pub payload_offset: usize,
    /// Bytes after the generic header, up to the declared length.
    pub body: &'a [u8],
}

/// Lazy walk over the chunks following the file header.
///
/// Stops quietly when fewer than 8 bytes remain. Yields at most one error,
/// after which it is exhausted. Cloning a walker restarts from its current
/// position.
#[derive(Debug, Clone)]
pub struct ChunkWalker<'a> {
    data: &'a [u8],
    base: usize,
    offset: usize,
    failed: bool,
}

impl<'a> ChunkWalker<'a> {
    /// `data` is the tail of the file and starts `base` bytes into it.
    pub fn new(data: &'a [u8], base: usize) -> Self {
        Self {
            data,
            base,
            offset: 0,
            failed: false,
        }
    }

    fn fail(&mut self, err: ChunkError) -> Option<Result<ChunkRef<'a>, ChunkError>> {
        error!("{}", err);
        self.failed = true;
        Some(Err(err))
    }
}

impl<'a> Iterator for ChunkWalker<'a> {
    type Item = Result<ChunkRef<'a>, ChunkError>;

    fn next(&mut self) -> Option<Self::Item> {
        let data = self.data;
        let rest = &data[self.offset..];
        if self.failed || rest.len() < CHUNK_HEADER_SIZE {
            return None;
        }

        let header: ChunkHeader = match ByteReader::new(rest).read_record(CHUNK_HEADER_SIZE) {
            Ok(header) => header,
            Err(e) => {
                error!("Unreadable chunk header: {}", e);
                self.failed = true;
                return None;
            }
        };
        let tag = Tag(header.tag);
        let offset = self.base + self.offset;
        let declared = header.chunk_length;

        let minimum = tag.min_length();
        if (declared as usize) < minimum {
            return self.fail(ChunkError::TooShort {
                tag,
                offset,
                declared,
                minimum,
            });
        }
        if declared as usize > rest.len() {
            return self.fail(ChunkError::Truncated {
                tag,
                offset,
                declared,
                available: rest.len(),
            });
        }

        trace!("Chunk {} at {}: {} bytes", tag, offset, declared);
        let chunk = ChunkRef {
            tag,
            declared_length: declared,
            offset,
            payload_offset: offset + CHUNK_HEADER_SIZE,
            body: &rest[CHUNK_HEADER_SIZE..declared as usize],
        };
        self.offset += declared as usize;
        Some(Ok(chunk))
    }
}

impl std::iter::FusedIterator for ChunkWalker<'_> {}
