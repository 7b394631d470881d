use log::{debug, error, info};
use thiserror::Error;

use super::clut::encode_clut;
use super::format::{FileHeader, Image, SaveOptions};
use super::pixl::encode_pixl;
use crate::bytes::ByteWriter;
use crate::constants::FILE_HEADER_SIZE;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Palette of {0} colors cannot be written (1..=16384)")]
    InvalidPalette(usize),
    #[error("{0} frames exceed the 65535 blobs a PIXL chunk can hold")]
    TooManyFrames(usize),
    #[error("Blob #{index} is {size} bytes, over the 31-bit size field")]
    BlobTooLarge { index: usize, size: usize },
    #[error("Encoded data is {0} bytes, over the 32-bit length field")]
    FileTooLarge(usize),
    #[error("Failed to write header record")]
    Record(#[from] bincode::Error),
}

/// Encodes with the default options.
pub fn encode(image: &Image) -> Result<Vec<u8>, EncodeError> {
    encode_with(image, &SaveOptions::default())
}

pub fn encode_with(image: &Image, options: &SaveOptions) -> Result<Vec<u8>, EncodeError> {
    let mut buffer = Vec::new();
    encode_into(image, options, &mut buffer)?;
    Ok(buffer)
}

/// Appends one complete file to `out`. On error `out` is left as it was.
pub fn encode_into(
    image: &Image,
    options: &SaveOptions,
    out: &mut Vec<u8>,
) -> Result<(), EncodeError> {
    info!(
        "Starting encoding: {}x{}, {} colors, {} frames",
        image.width(),
        image.height(),
        image.color_count(),
        image.frame_count()
    );

    let mut writer = ByteWriter::new();

    // Header first with a placeholder length, patched once everything is out.
    writer.write_record(&FileHeader::new(image.width(), image.height(), 0))?;
    debug!("Header written");

    let clut_len = encode_clut(&mut writer, image.palette(), options.palette)?;
    let pixl_len = encode_pixl(&mut writer, image.frames(), options.pixels)?;

    let total = writer.position();
    debug_assert_eq!(total, FILE_HEADER_SIZE + clut_len + pixl_len);
    let file_length = u32::try_from(total).map_err(|_| {
        error!("Encoded file exceeds 4 GiB: {} bytes", total);
        EncodeError::FileTooLarge(total)
    })?;
    writer.patch_u32_le(4, file_length);

    out.extend_from_slice(&writer.into_inner());
    info!("Encoding completed successfully: {} bytes", total);
    Ok(())
}
