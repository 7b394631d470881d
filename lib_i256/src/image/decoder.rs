use log::{debug, error, info};
use thiserror::Error;

use super::chunk::{ChunkError, ChunkWalker, Tag};
use super::clut::{decode_clut, PaletteDecodeError};
use super::format::{FileHeader, Image};
use super::header::HeaderError;
use super::pixl::{decode_pixl, PixelDecodeError};
use crate::constants::FILE_HEADER_SIZE;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Invalid format or header")]
    InvalidHeader(#[from] HeaderError),
    #[error("Chunk structure is broken")]
    Chunk(#[from] ChunkError),
    #[error("Palette chunk could not be decoded")]
    Palette(#[from] PaletteDecodeError),
    #[error("Pixel chunk could not be decoded")]
    Pixel(#[from] PixelDecodeError),
    #[error("File has no CLUT chunk")]
    MissingPalette,
}

/// Decodes a complete I256 file held in memory.
pub fn decode(encoded_data: &[u8]) -> Result<Image, DecodeError> {
    info!("Starting decoding of {} bytes", encoded_data.len());

    let header = FileHeader::read(encoded_data)?;
    let (width, height) = header.dimensions();
    let frame_len = width as usize * height as usize;
    debug!("Image dimensions read: width={} height={}", width, height);

    let mut palette = None;
    let mut frames = Vec::new();

    for chunk in ChunkWalker::new(&encoded_data[FILE_HEADER_SIZE..], FILE_HEADER_SIZE) {
        let chunk = chunk?;
        match chunk.tag {
            Tag::CLUT => {
                if palette.is_some() {
                    debug!("Later CLUT at {} replaces the earlier one", chunk.offset);
                }
                palette = Some(decode_clut(&chunk)?);
            }
            Tag::PIXL => frames.extend(decode_pixl(&chunk, frame_len)?),
            other => debug!(
                "Skipping unknown chunk {} at {} ({} bytes)",
                other, chunk.offset, chunk.declared_length
            ),
        }
    }

    let Some(palette) = palette else {
        error!("No CLUT chunk found");
        return Err(DecodeError::MissingPalette);
    };

    info!(
        "Decoding successful: {}x{}, {} colors, {} frames",
        width,
        height,
        palette.len(),
        frames.len()
    );
    Ok(Image::from_parts(width, height, palette, frames))
}
