pub mod lzsa2;

use log::{debug, error, warn};
use lzsa2::{Lzsa2CompressionError, Lzsa2DecompressionError};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CompressionError {
    #[error("LZSA2 compression failed")]
    Lzsa2CompressionFailed(#[from] Lzsa2CompressionError),
    #[error("LZSA2 decompression failed")]
    Lzsa2DecompressionFailed(#[from] Lzsa2DecompressionError),
}

/// How palette and pixel payloads are written on save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Raw bytes, flag bits cleared.
    Stored,
    /// LZSA2 where it actually shrinks the span, raw otherwise.
    #[default]
    Lzsa2,
}

/// An encoded span and whether its flag bit must be set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSpan {
    pub data: Vec<u8>,
    pub compressed: bool,
}

/// Expands `data` to exactly `expected_len` bytes.
pub fn decompress(data: &[u8], expected_len: usize) -> Result<Vec<u8>, CompressionError> {
    debug!(
        "Decompressing {} bytes, expecting {} bytes",
        data.len(),
        expected_len
    );
    lzsa2::lzsa2_decompression(data, expected_len).map_err(|e| {
        error!("LZSA2 decompression failed: {}", e);
        CompressionError::from(e)
    })
}

pub fn compress(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
    let compressed = lzsa2::lzsa2_compression(data)?;
    debug!(
        "LZSA2 compression: {} -> {} bytes",
        data.len(),
        compressed.len()
    );
    Ok(compressed)
}

/// Encodes a span under `policy`, falling back to raw storage when
/// compression fails or does not make the span smaller.
pub fn encode_span(data: &[u8], policy: Compression) -> EncodedSpan {
    if policy == Compression::Lzsa2 {
        match compress(data) {
            Ok(compressed) if compressed.len() < data.len() => {
                return EncodedSpan {
                    data: compressed,
                    compressed: true,
                };
            }
            Ok(_) => debug!("Compression did not shrink {} bytes, storing", data.len()),
            Err(e) => warn!("Storing {} bytes uncompressed: {}", data.len(), e),
        }
    }

    EncodedSpan {
        data: data.to_vec(),
        compressed: false,
    }
}
