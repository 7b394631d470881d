use std::collections::HashMap;

use log::{debug, error};
use thiserror::Error;

use crate::image::format::{Color, Palette};

/// Frames hold one byte per pixel, so at most 256 entries are reachable.
pub const MAX_INDEXED_COLORS: usize = 256;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum QuantizeError {
    #[error("Invalid pixel data length: expected multiple of 4 bytes, got {0}")]
    InvalidPixelDataLength(usize),
    #[error("Palette overflow: maximum 256 colors supported, attempted to add color #{0}")]
    PaletteOverflow(usize),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExpandError {
    #[error("Invalid palette index: {0} exceeds palette size of {1}")]
    InvalidPaletteIndex(usize, usize),
}

pub struct Quantized {
    pub palette: Palette, // Unique colors in first-seen order
    pub indices: Vec<u8>, // Palette index for each pixel
}

/// Maps an RGBA pixel buffer onto an exact palette of its distinct colors.
///
/// # Errors
/// - `InvalidPixelDataLength` if the input length is not a multiple of 4
/// - `PaletteOverflow` if more than 256 distinct colors are found
pub fn quantize(rgba: &[u8]) -> Result<Quantized, QuantizeError> {
    if rgba.len() % 4 != 0 {
        error!("RGBA buffer of {} bytes is not whole pixels", rgba.len());
        return Err(QuantizeError::InvalidPixelDataLength(rgba.len()));
    }

    let mut lookup: HashMap<Color, u8> = HashMap::new();
    let mut colors = Vec::new();
    let mut indices = Vec::with_capacity(rgba.len() / 4);

    for pixel in rgba.chunks_exact(4) {
        let color = Color::rgba(pixel[0], pixel[1], pixel[2], pixel[3]);

        if let Some(&index) = lookup.get(&color) {
            indices.push(index);
            continue;
        }
        if colors.len() >= MAX_INDEXED_COLORS {
            error!("More than {} distinct colors", MAX_INDEXED_COLORS);
            return Err(QuantizeError::PaletteOverflow(colors.len() + 1));
        }

        let index = colors.len() as u8;
        colors.push(color);
        lookup.insert(color, index);
        indices.push(index);
    }
    debug!(
        "Quantized {} pixels to {} colors",
        indices.len(),
        colors.len()
    );

    Ok(Quantized {
        palette: Palette::new(colors),
        indices,
    })
}

/// Expands palette indices back into RGBA pixels.
pub fn expand(palette: &Palette, indices: &[u8]) -> Result<Vec<u8>, ExpandError> {
    let mut rgba = Vec::with_capacity(indices.len() * 4);

    for &index in indices {
        let color = palette.get(index as usize).ok_or_else(|| {
            error!(
                "Palette index {} out of range for {} colors",
                index,
                palette.len()
            );
            ExpandError::InvalidPaletteIndex(index as usize, palette.len())
        })?;
        rgba.extend_from_slice(&color.to_rgba());
    }

    Ok(rgba)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_rrgb() {
        let pixels = vec![
            255, 0, 0, 255, // Red
            255, 0, 0, 255, // Red
            0, 255, 0, 255, // Green
            0, 0, 255, 255, // Blue
        ];

        let quantized = quantize(&pixels).unwrap();
        assert_eq!(quantized.palette.len(), 3);
        assert_eq!(quantized.indices, vec![0, 0, 1, 2]);
        assert_eq!(quantized.palette.colors[2], Color::rgba(0, 0, 255, 255));

        let expanded = expand(&quantized.palette, &quantized.indices).unwrap();
        assert_eq!(expanded, pixels);
    }

    #[test]
    fn test_quantize_invalid_pixel_data_length() {
        assert!(matches!(
            quantize(&[255, 0, 0]),
            Err(QuantizeError::InvalidPixelDataLength(3))
        ));
    }

    #[test]
    fn test_quantize_overflow() {
        let mut pixels = Vec::with_capacity(257 * 4);
        for i in 0..257u32 {
            pixels.extend_from_slice(&[(i % 256) as u8, (i / 256) as u8, 0, 255]);
        }
        assert_eq!(
            quantize(&pixels).err(),
            Some(QuantizeError::PaletteOverflow(257))
        );
    }

    #[test]
    fn test_expand_invalid_index() {
        let palette = Palette::new(vec![Color::rgba(255, 0, 0, 255)]);
        assert_eq!(
            expand(&palette, &[0, 1]),
            Err(ExpandError::InvalidPaletteIndex(1, 1))
        );
    }

    #[test]
    fn test_quantize_gradient() {
        let mut data = Vec::new();
        for i in 0..256 {
            data.extend_from_slice(&[i as u8, i as u8, i as u8, 255]);
        }

        let quantized = quantize(&data).unwrap();
        assert_eq!(quantized.palette.len(), 256);
        assert_eq!(expand(&quantized.palette, &quantized.indices).unwrap(), data);
    }
}
