pub const FORMAT_NAME: &str = "256 - I256 Image";
pub const FILE_EXT: &str = "256";

pub const SIGNATURE: [u8; 4] = *b"I256";
pub const FORMAT_VERSION: i16 = 0;

/// Size of the whole-file header.
pub const FILE_HEADER_SIZE: usize = 16;
/// Tag plus declared length, shared by every chunk.
pub const CHUNK_HEADER_SIZE: usize = 8;
/// `CLUT` and `PIXL` both carry one extra u16 after the generic header.
pub const CLUT_HEADER_SIZE: usize = CHUNK_HEADER_SIZE + 2;
pub const PIXL_HEADER_SIZE: usize = CHUNK_HEADER_SIZE + 2;
pub const BLOB_HEADER_SIZE: usize = 4;

pub const MAX_COLORS: usize = 0x4000;
pub const MAX_DIMENSION: u16 = i16::MAX as u16;
pub const MAX_BLOBS: usize = u16::MAX as usize;

pub const COLOR_COUNT_MASK: u16 = 0x3FFF;
pub const CLUT_FLAG_COMPRESSED: u16 = 0x8000;
pub const CLUT_FLAG_RESERVED: u16 = 0x4000;

pub const BLOB_FLAG_COMPRESSED: u32 = 0x8000_0000;
pub const BLOB_SIZE_MASK: u32 = 0x7FFF_FFFF;

pub const BYTES_PER_COLOR: usize = 4;
