use log::{debug, error, warn};
use thiserror::Error;

use super::chunk::{ChunkRef, Tag};
use super::encoder::EncodeError;
use crate::bytes::{ByteReader, ByteWriter, ReadError};
use crate::compression::{self, Compression, CompressionError};
use crate::constants::{
    BLOB_FLAG_COMPRESSED, BLOB_HEADER_SIZE, BLOB_SIZE_MASK, MAX_BLOBS, PIXL_HEADER_SIZE,
};

#[derive(Error, Debug)]
pub enum PixelDecodeError {
    #[error("blob count field missing")]
    MissingBlobCount(#[from] ReadError),
    #[error("blob #{index} at payload offset {offset} needs {needed} bytes, {available} left")]
    TruncatedBlob {
        index: usize,
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("raw blob #{index} is {actual} bytes, frame size is {expected}")]
    FrameLengthMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("blob #{index} could not be expanded")]
    Decompression {
        index: usize,
        #[source]
        source: CompressionError,
    },
}

/// Splits a blob header into payload size and compressed flag.
pub fn unpack_blob_header(header: u32) -> (usize, bool) {
    (
        (header & BLOB_SIZE_MASK) as usize,
        header & BLOB_FLAG_COMPRESSED != 0,
    )
}

pub fn pack_blob_header(size: usize, compressed: bool) -> u32 {
    let mut header = size as u32 & BLOB_SIZE_MASK;
    if compressed {
        header |= BLOB_FLAG_COMPRESSED;
    }
    header
}

/// Decodes every blob of a `PIXL` chunk into one frame of `frame_len` bytes.
/// Blobs share no state; frame `i` depends only on blob `i`.
pub fn decode_pixl(chunk: &ChunkRef, frame_len: usize) -> Result<Vec<Vec<u8>>, PixelDecodeError> {
    let mut reader = ByteReader::new(chunk.body);
    let num_blobs = reader.read_u16_le()? as usize;
    debug!(
        "PIXL at {}: {} blobs of {} bytes each",
        chunk.offset, num_blobs, frame_len
    );

    let mut frames = Vec::with_capacity(num_blobs);
    for index in 0..num_blobs {
        let offset = reader.position();
        let truncated = |needed: usize, available: usize| {
            error!(
                "Blob #{} at payload offset {} needs {} bytes, {} left",
                index, offset, needed, available
            );
            PixelDecodeError::TruncatedBlob {
                index,
                offset,
                needed,
                available,
            }
        };

        let header = reader
            .read_u32_le()
            .map_err(|_| truncated(BLOB_HEADER_SIZE, reader.remaining()))?;
        let (size, compressed) = unpack_blob_header(header);
        let data = reader
            .read_bytes(size)
            .map_err(|_| truncated(size, reader.remaining()))?;

        let frame = if compressed {
            compression::decompress(data, frame_len)
                .map_err(|source| PixelDecodeError::Decompression { index, source })?
        } else if data.len() == frame_len {
            data.to_vec()
        } else {
            error!(
                "Raw blob #{} is {} bytes, frame size is {}",
                index,
                data.len(),
                frame_len
            );
            return Err(PixelDecodeError::FrameLengthMismatch {
                index,
                expected: frame_len,
                actual: data.len(),
            });
        };
        debug!(
            "Blob #{}: {} source bytes, compressed={}",
            index, size, compressed
        );
        frames.push(frame);
    }

    if !reader.is_empty() {
        warn!(
            "Ignoring {} bytes after the last blob of PIXL at {}",
            reader.remaining(),
            chunk.offset
        );
    }

    Ok(frames)
}

/// Writes a complete `PIXL` chunk, one blob per frame, and returns its
/// length.
pub fn encode_pixl(
    writer: &mut ByteWriter,
    frames: &[Vec<u8>],
    policy: Compression,
) -> Result<usize, EncodeError> {
    if frames.len() > MAX_BLOBS {
        error!("Too many frames for one PIXL chunk: {}", frames.len());
        return Err(EncodeError::TooManyFrames(frames.len()));
    }

    let start = writer.position();
    writer.write_tag(Tag::PIXL.0);
    writer.write_u32_le(0);
    writer.write_u16_le(frames.len() as u16);

    for (index, frame) in frames.iter().enumerate() {
        let span = compression::encode_span(frame, policy);
        if span.data.len() > BLOB_SIZE_MASK as usize {
            error!("Blob #{} is too large: {} bytes", index, span.data.len());
            return Err(EncodeError::BlobTooLarge {
                index,
                size: span.data.len(),
            });
        }
        writer.write_u32_le(pack_blob_header(span.data.len(), span.compressed));
        writer.write_bytes(&span.data);
        debug!(
            "Blob #{}: {} -> {} bytes, compressed={}",
            index,
            frame.len(),
            span.data.len(),
            span.compressed
        );
    }

    let length = writer.position() - start;
    let declared = u32::try_from(length).map_err(|_| {
        error!("PIXL chunk exceeds 4 GiB: {} bytes", length);
        EncodeError::FileTooLarge(length)
    })?;
    writer.patch_u32_le(start + 4, declared);
    debug!("PIXL written: {} blobs, {} bytes", frames.len(), length);

    Ok(length)
}
