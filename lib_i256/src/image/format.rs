use log::{debug, error};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::decoder::{decode, DecodeError};
use super::encoder::{encode_into, encode_with, EncodeError};
use crate::compression::Compression;
use crate::constants::{BYTES_PER_COLOR, MAX_COLORS, MAX_DIMENSION};

/// The 16-byte whole-file header, in on-disk field order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHeader {
    pub signature: [u8; 4],
    /// In bytes, including this header.
    pub file_length: u32,
    pub version: i16,
    pub width: i16,
    pub height: i16,
    pub reserved: i16,
}

/// Tag and declared length shared by every chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkHeader {
    pub tag: [u8; 4],
    /// In bytes, including this header.
    pub chunk_length: u32,
}

/// One palette entry, stored as B, G, R, A.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Color {
    pub b: u8,
    pub g: u8,
    pub r: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { b, g, r, a }
    }

    pub const fn from_bgra(quad: [u8; 4]) -> Self {
        Self {
            b: quad[0],
            g: quad[1],
            r: quad[2],
            a: quad[3],
        }
    }

    pub const fn to_bgra(self) -> [u8; 4] {
        [self.b, self.g, self.r, self.a]
    }

    pub const fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Palette {
    pub colors: Vec<Color>,
}

impl Palette {
    pub fn new(colors: Vec<Color>) -> Self {
        Self { colors }
    }

    /// A palette of `count` zeroed entries.
    pub fn zeroed(count: usize) -> Self {
        Self {
            colors: vec![Color::default(); count],
        }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Color> {
        self.colors.get(index).copied()
    }

    /// Parses tightly packed BGRA quads. A trailing partial quad is ignored.
    pub fn from_bgra_bytes(bytes: &[u8]) -> Self {
        Self {
            colors: bytes
                .chunks_exact(BYTES_PER_COLOR)
                .map(|quad| Color::from_bgra([quad[0], quad[1], quad[2], quad[3]]))
                .collect(),
        }
    }

    pub fn to_bgra_bytes(&self) -> Vec<u8> {
        self.colors.iter().flat_map(|c| c.to_bgra()).collect()
    }

    /// Builds a palette from R, G, B triples as host editors hand them
    /// over. Alpha comes from `alpha` when given and defaults to opaque.
    pub fn from_rgb_table(rgb: &[u8], alpha: Option<&[u8]>) -> Self {
        Self {
            colors: rgb
                .chunks_exact(3)
                .enumerate()
                .map(|(i, triple)| {
                    let a = alpha.and_then(|table| table.get(i).copied()).unwrap_or(255);
                    Color::rgba(triple[0], triple[1], triple[2], a)
                })
                .collect(),
        }
    }

    /// R, G, B per entry.
    pub fn rgb_table(&self) -> Vec<u8> {
        self.colors.iter().flat_map(|c| [c.r, c.g, c.b]).collect()
    }

    pub fn alpha_table(&self) -> Vec<u8> {
        self.colors.iter().map(|c| c.a).collect()
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ImageError {
    #[error("invalid dimensions {width}x{height}: both must be in 1..=32767")]
    InvalidDimensions { width: u16, height: u16 },
    #[error("invalid color count {0}: must be in 1..=16384")]
    InvalidColorCount(usize),
    #[error("palette has {actual} entries, image expects {expected}")]
    PaletteSizeMismatch { expected: usize, actual: usize },
    #[error("frame #{index} is {actual} bytes, expected {expected}")]
    FrameSizeMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },
}

/// Knobs for [`Image::save_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveOptions {
    pub palette: Compression,
    pub pixels: Compression,
}

impl SaveOptions {
    pub fn new(compression: Compression) -> Self {
        Self {
            palette: compression,
            pixels: compression,
        }
    }

    pub fn stored() -> Self {
        Self::new(Compression::Stored)
    }
}

/// A palette plus an ordered list of indexed frames, all `width * height`
/// bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: u16,
    height: u16,
    color_count: usize,
    palette: Palette,
    frames: Vec<Vec<u8>>,
}

impl Image {
    /// Creates a blank image with a zeroed palette and no frames.
    pub fn new(width: u16, height: u16, color_count: usize) -> Result<Self, ImageError> {
        if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
            error!("Invalid image dimensions {}x{}", width, height);
            return Err(ImageError::InvalidDimensions { width, height });
        }
        if color_count == 0 || color_count > MAX_COLORS {
            error!("Invalid color count {}", color_count);
            return Err(ImageError::InvalidColorCount(color_count));
        }
        debug!(
            "Created blank image {}x{} with {} colors",
            width, height, color_count
        );

        Ok(Self {
            width,
            height,
            color_count,
            palette: Palette::zeroed(color_count),
            frames: Vec::new(),
        })
    }

    /// Assembles a decoded image. Dimensions and palette come from an
    /// already validated file.
    pub(crate) fn from_parts(
        width: u16,
        height: u16,
        palette: Palette,
        frames: Vec<Vec<u8>>,
    ) -> Self {
        Self {
            width,
            height,
            color_count: palette.len(),
            palette,
            frames,
        }
    }

    pub fn load(bytes: &[u8]) -> Result<Self, DecodeError> {
        decode(bytes)
    }

    pub fn save(&self) -> Result<Vec<u8>, EncodeError> {
        self.save_with(&SaveOptions::default())
    }

    pub fn save_with(&self, options: &SaveOptions) -> Result<Vec<u8>, EncodeError> {
        encode_with(self, options)
    }

    /// Appends the encoded file to `out`, which is untouched on error.
    pub fn save_into(&self, out: &mut Vec<u8>, options: &SaveOptions) -> Result<(), EncodeError> {
        encode_into(self, options, out)
    }

    pub fn set_palette(&mut self, palette: Palette) -> Result<(), ImageError> {
        if palette.len() != self.color_count {
            error!(
                "Palette size mismatch: expected {}, got {}",
                self.color_count,
                palette.len()
            );
            return Err(ImageError::PaletteSizeMismatch {
                expected: self.color_count,
                actual: palette.len(),
            });
        }
        self.palette = palette;
        Ok(())
    }

    /// Appends frames. Nothing is appended unless every frame has the
    /// right size.
    pub fn add_images<I>(&mut self, frames: I) -> Result<(), ImageError>
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let frames: Vec<Vec<u8>> = frames.into_iter().collect();
        let expected = self.frame_len();
        if let Some((index, frame)) = frames
            .iter()
            .enumerate()
            .find(|(_, frame)| frame.len() != expected)
        {
            error!(
                "Frame #{} is {} bytes, expected {}",
                index,
                frame.len(),
                expected
            );
            return Err(ImageError::FrameSizeMismatch {
                index,
                expected,
                actual: frame.len(),
            });
        }
        debug!("Adding {} frames", frames.len());
        self.frames.extend(frames);
        Ok(())
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn color_count(&self) -> usize {
        self.color_count
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Bytes per frame.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn frames(&self) -> &[Vec<u8>] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&[u8]> {
        self.frames.get(index).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_image() {
        let image = Image::new(4, 2, 2).unwrap();
        assert_eq!(image.width(), 4);
        assert_eq!(image.height(), 2);
        assert_eq!(image.color_count(), 2);
        assert_eq!(image.frame_count(), 0);
        assert_eq!(image.frame_len(), 8);
        assert_eq!(image.palette(), &Palette::zeroed(2));
    }

    #[test]
    fn test_blank_image_rejects_bad_arguments() {
        assert_eq!(
            Image::new(0, 2, 2),
            Err(ImageError::InvalidDimensions {
                width: 0,
                height: 2
            })
        );
        assert_eq!(
            Image::new(4, 32768, 2),
            Err(ImageError::InvalidDimensions {
                width: 4,
                height: 32768
            })
        );
        assert_eq!(Image::new(4, 2, 0), Err(ImageError::InvalidColorCount(0)));
        assert_eq!(
            Image::new(4, 2, 16385),
            Err(ImageError::InvalidColorCount(16385))
        );
        assert!(Image::new(1, 1, 16384).is_ok());
    }

    #[test]
    fn test_set_palette_size_mismatch() {
        let mut image = Image::new(2, 2, 3).unwrap();
        let result = image.set_palette(Palette::zeroed(2));
        assert_eq!(
            result,
            Err(ImageError::PaletteSizeMismatch {
                expected: 3,
                actual: 2
            })
        );
        assert!(image.set_palette(Palette::zeroed(3)).is_ok());
    }

    #[test]
    fn test_add_images_is_all_or_nothing() {
        let mut image = Image::new(2, 2, 2).unwrap();
        let result = image.add_images(vec![vec![0; 4], vec![0; 3]]);
        assert_eq!(
            result,
            Err(ImageError::FrameSizeMismatch {
                index: 1,
                expected: 4,
                actual: 3
            })
        );
        assert_eq!(image.frame_count(), 0);

        image.add_images(vec![vec![0, 1, 1, 0]]).unwrap();
        image.add_images(vec![vec![1; 4], vec![0; 4]]).unwrap();
        assert_eq!(image.frame_count(), 3);
        assert_eq!(image.frame(0), Some(&[0u8, 1, 1, 0][..]));
        assert_eq!(image.frame(3), None);
    }

    #[test]
    fn test_color_byte_order() {
        let color = Color::rgba(1, 2, 3, 4);
        assert_eq!(color.to_bgra(), [3, 2, 1, 4]);
        assert_eq!(color.to_rgba(), [1, 2, 3, 4]);
        assert_eq!(Color::from_bgra([3, 2, 1, 4]), color);
    }

    #[test]
    fn test_rgb_tables() {
        let palette = Palette::from_rgb_table(&[10, 20, 30, 40, 50, 60], Some(&[128]));
        assert_eq!(
            palette.colors,
            vec![Color::rgba(10, 20, 30, 128), Color::rgba(40, 50, 60, 255)]
        );
        assert_eq!(palette.rgb_table(), vec![10, 20, 30, 40, 50, 60]);
        assert_eq!(palette.alpha_table(), vec![128, 255]);
        assert_eq!(
            palette.to_bgra_bytes(),
            vec![30, 20, 10, 128, 60, 50, 40, 255]
        );
        assert_eq!(Palette::from_bgra_bytes(&palette.to_bgra_bytes()), palette);
    }
}
