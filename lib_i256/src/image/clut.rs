use log::{debug, error};
use thiserror::Error;

use super::chunk::{ChunkRef, Tag};
use super::encoder::EncodeError;
use super::format::Palette;
use crate::bytes::{ByteReader, ByteWriter, ReadError};
use crate::compression::{self, Compression, CompressionError};
use crate::constants::{
    BYTES_PER_COLOR, CLUT_FLAG_COMPRESSED, CLUT_FLAG_RESERVED, CLUT_HEADER_SIZE,
    COLOR_COUNT_MASK, MAX_COLORS,
};

#[derive(Error, Debug)]
pub enum PaletteDecodeError {
    #[error("color count field missing")]
    MissingCount(#[from] ReadError),
    #[error("CLUT declares {declared} bytes, more than the {maximum} needed for {colors} colors")]
    ChunkTooLong {
        declared: u32,
        maximum: usize,
        colors: usize,
    },
    #[error("raw palette payload is {actual} bytes, expected {expected}")]
    PayloadLengthMismatch { expected: usize, actual: usize },
    #[error("compressed palette could not be expanded")]
    Decompression(#[from] CompressionError),
}

/// Packs a color count (1..=16384) and the compressed flag into the
/// `count_and_flags` field.
pub fn pack_count(count: usize, compressed: bool) -> u16 {
    let mut field = (count.saturating_sub(1) as u16) & COLOR_COUNT_MASK;
    if compressed {
        field |= CLUT_FLAG_COMPRESSED;
    }
    field
}

/// Inverse of [`pack_count`]. The reserved bit is ignored.
pub fn unpack_count(field: u16) -> (usize, bool) {
    if field & CLUT_FLAG_RESERVED != 0 {
        debug!("Reserved CLUT flag set in {:#06x}, ignoring it", field);
    }
    let count = (field & COLOR_COUNT_MASK) as usize + 1;
    (count, field & CLUT_FLAG_COMPRESSED != 0)
}

pub fn decode_clut(chunk: &ChunkRef) -> Result<Palette, PaletteDecodeError> {
    let mut reader = ByteReader::new(chunk.body);
    let (colors, compressed) = unpack_count(reader.read_u16_le()?);
    let raw_len = colors * BYTES_PER_COLOR;
    debug!(
        "CLUT at {}: {} colors, compressed={}",
        chunk.offset, colors, compressed
    );

    let maximum = CLUT_HEADER_SIZE + raw_len;
    if chunk.declared_length as usize > maximum {
        error!(
            "CLUT declares {} bytes, maximum for {} colors is {}",
            chunk.declared_length, colors, maximum
        );
        return Err(PaletteDecodeError::ChunkTooLong {
            declared: chunk.declared_length,
            maximum,
            colors,
        });
    }

    let payload = reader.read_bytes(reader.remaining())?;
    let quads = if compressed {
        compression::decompress(payload, raw_len)?
    } else {
        if payload.len() != raw_len {
            error!(
                "Raw palette payload is {} bytes, expected {}",
                payload.len(),
                raw_len
            );
            return Err(PaletteDecodeError::PayloadLengthMismatch {
                expected: raw_len,
                actual: payload.len(),
            });
        }
        payload.to_vec()
    };

    Ok(Palette::from_bgra_bytes(&quads))
}

/// Writes a complete `CLUT` chunk and returns its length.
pub fn encode_clut(
    writer: &mut ByteWriter,
    palette: &Palette,
    policy: Compression,
) -> Result<usize, EncodeError> {
    if palette.is_empty() || palette.len() > MAX_COLORS {
        error!("Cannot write a palette of {} colors", palette.len());
        return Err(EncodeError::InvalidPalette(palette.len()));
    }

    let span = compression::encode_span(&palette.to_bgra_bytes(), policy);
    let length = CLUT_HEADER_SIZE + span.data.len();

    writer.write_tag(Tag::CLUT.0);
    writer.write_u32_le(length as u32);
    writer.write_u16_le(pack_count(palette.len(), span.compressed));
    writer.write_bytes(&span.data);
    debug!(
        "CLUT written: {} colors, {} bytes, compressed={}",
        palette.len(),
        length,
        span.compressed
    );

    Ok(length)
}
