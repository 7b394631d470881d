use log::{debug, error};
use thiserror::Error;

use super::format::FileHeader;
use crate::bytes::{ByteReader, ReadError};
use crate::constants::{FILE_HEADER_SIZE, FORMAT_VERSION, SIGNATURE};

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("file is {0} bytes, too short for the 16-byte header")]
    TooShort(usize),
    #[error("malformed header record")]
    Malformed(#[from] ReadError),
    #[error("header declares {declared} bytes but the file has {actual}")]
    LengthMismatch { declared: u32, actual: usize },
    #[error("unsupported version {0}")]
    VersionMismatch(i16),
    #[error("signature {0:?} is not \"I256\"")]
    SignatureMismatch([u8; 4]),
    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions { width: i16, height: i16 },
    #[error("reserved field is {0}, must be 0")]
    ReservedNotZero(i16),
}

impl FileHeader {
    /// Header for a file of `file_length` bytes.
    pub fn new(width: u16, height: u16, file_length: u32) -> Self {
        Self {
            signature: SIGNATURE,
            file_length,
            version: FORMAT_VERSION,
            width: width as i16,
            height: height as i16,
            reserved: 0,
        }
    }

    /// Reads the first 16 bytes without validating them.
    pub fn parse(bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.len() < FILE_HEADER_SIZE {
            return Err(HeaderError::TooShort(bytes.len()));
        }
        Ok(ByteReader::new(bytes).read_record(FILE_HEADER_SIZE)?)
    }

    /// Checks the header against the real file size. Only the first failing
    /// check is reported.
    pub fn validate(&self, actual_len: usize) -> Result<(), HeaderError> {
        if self.file_length as usize != actual_len {
            Err(HeaderError::LengthMismatch {
                declared: self.file_length,
                actual: actual_len,
            })
        } else if self.version != FORMAT_VERSION {
            Err(HeaderError::VersionMismatch(self.version))
        } else if self.signature != SIGNATURE {
            Err(HeaderError::SignatureMismatch(self.signature))
        } else if self.width <= 0 || self.height <= 0 {
            Err(HeaderError::InvalidDimensions {
                width: self.width,
                height: self.height,
            })
        } else if self.reserved != 0 {
            Err(HeaderError::ReservedNotZero(self.reserved))
        } else {
            Ok(())
        }
    }

    /// Parses and validates in one step.
    pub fn read(bytes: &[u8]) -> Result<Self, HeaderError> {
        let header = Self::parse(bytes)
            .and_then(|header| header.validate(bytes.len()).map(|()| header))
            .map_err(|e| {
                error!("Invalid header: {}", e);
                e
            })?;
        debug!(
            "Header validated: {}x{}, {} bytes",
            header.width, header.height, header.file_length
        );
        Ok(header)
    }

    /// Width and height as unsigned values. Only meaningful after
    /// [`FileHeader::validate`] succeeded.
    pub fn dimensions(&self) -> (u16, u16) {
        (self.width as u16, self.height as u16)
    }
}
