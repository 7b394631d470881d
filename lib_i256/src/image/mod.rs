pub mod chunk;
pub mod clut;
pub mod decoder;
pub mod encoder;
pub mod format;
pub mod header;
pub mod pixl;

use log::debug;
use serde::Serialize;

pub use chunk::{ChunkError, ChunkRef, ChunkWalker, Tag};
pub use decoder::{decode, DecodeError};
pub use encoder::{encode, encode_into, encode_with, EncodeError};
pub use header::HeaderError;

use crate::constants::{FILE_HEADER_SIZE, SIGNATURE};
use format::FileHeader;

/// Reads and validates only the header, leaving the chunks untouched.
pub fn read_header(bytes: &[u8]) -> Result<FileHeader, HeaderError> {
    FileHeader::read(bytes)
}

/// Cheap check whether `bytes` look like a valid I256 file. Only the
/// header is examined, and a mismatch is not treated as an error.
pub fn probe(bytes: &[u8]) -> bool {
    if !bytes.starts_with(&SIGNATURE) {
        return false;
    }
    match FileHeader::parse(bytes) {
        Ok(header) => header.validate(bytes.len()).is_ok(),
        Err(_) => false,
    }
}

/// One entry of a [`FileSummary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkSummary {
    pub tag: Tag,
    pub offset: usize,
    pub length: u32,
}

/// Header fields and chunk layout of a file, without decoding payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    pub file_length: u32,
    pub version: i16,
    pub width: i16,
    pub height: i16,
    pub chunks: Vec<ChunkSummary>,
}

pub fn describe(bytes: &[u8]) -> Result<FileSummary, DecodeError> {
    let header = FileHeader::read(bytes)?;
    let chunks = ChunkWalker::new(&bytes[FILE_HEADER_SIZE..], FILE_HEADER_SIZE)
        .map(|chunk| {
            chunk.map(|c| ChunkSummary {
                tag: c.tag,
                offset: c.offset,
                length: c.declared_length,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    debug!("Described {} chunks", chunks.len());

    Ok(FileSummary {
        file_length: header.file_length,
        version: header.version,
        width: header.width,
        height: header.height,
        chunks,
    })
}
