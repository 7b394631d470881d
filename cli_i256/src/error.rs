use std::io;

use lib_i256::quantize::{ExpandError, QuantizeError};
use lib_i256::{DecodeError, EncodeError, ImageError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Image processing error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Failed to decode I256 file: {0}")]
    DecodeError(#[from] DecodeError),

    #[error("Failed to encode I256 file: {0}")]
    EncodeError(#[from] EncodeError),

    #[error("Invalid image: {0}")]
    ContainerError(#[from] ImageError),

    #[error("Failed to build a palette: {0}")]
    QuantizeError(#[from] QuantizeError),

    #[error("Failed to expand frame: {0}")]
    ExpandError(#[from] ExpandError),

    #[error("JSON output failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Frame {index} does not exist, the file has {count} frames")]
    NoSuchFrame { index: usize, count: usize },

    #[error("Image is {width}x{height}, the format allows at most 32767 per side")]
    TooLarge { width: u32, height: u32 },

    #[error("Frame buffer does not match {width}x{height}")]
    BufferMismatch { width: u32, height: u32 },
}
