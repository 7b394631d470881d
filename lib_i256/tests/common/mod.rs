#![allow(dead_code)]

use lib_i256::{Color, Image, Palette};

pub const SCENARIO_WIDTH: u16 = 4;
pub const SCENARIO_HEIGHT: u16 = 2;
pub const SCENARIO_FRAME: [u8; 8] = [0, 1, 0, 1, 0, 1, 0, 1];

pub fn scenario_palette() -> Palette {
    Palette::from_bgra_bytes(&[0, 0, 0, 255, 255, 255, 255, 255])
}

/// 4x2, two colors, one checkered frame.
pub fn scenario_image() -> Image {
    let mut image = Image::new(SCENARIO_WIDTH, SCENARIO_HEIGHT, 2).unwrap();
    image.set_palette(scenario_palette()).unwrap();
    image.add_images(vec![SCENARIO_FRAME.to_vec()]).unwrap();
    image
}

/// Deterministic xorshift bytes.
pub fn noise(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.max(1);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect()
}

/// A sprite-like frame: flat background with a few shapes, which is what
/// indexed artwork tends to look like.
pub fn sprite_frame(width: usize, height: usize, shift: usize) -> Vec<u8> {
    let mut frame = vec![0u8; width * height];
    for y in 0..height {
        for x in 0..width {
            let dx = x as i64 - (width / 2 + shift) as i64;
            let dy = y as i64 - (height / 2) as i64;
            if dx * dx + dy * dy < (width as i64 * width as i64) / 16 {
                frame[y * width + x] = 1 + ((x + y) % 3) as u8;
            } else if y % 8 == 0 {
                frame[y * width + x] = 4;
            }
        }
    }
    frame
}

pub fn gradient_palette(count: usize) -> Palette {
    Palette::new(
        (0..count)
            .map(|i| Color::rgba(i as u8, (i >> 8) as u8, 255 - i as u8, 255))
            .collect(),
    )
}

/// Builds a raw chunk: tag, length including the 8-byte header, body.
pub fn chunk(tag: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = tag.to_vec();
    out.extend_from_slice(&((body.len() + 8) as u32).to_le_bytes());
    out.extend_from_slice(body);
    out
}

/// Rewrites the header's declared file length to match the buffer.
pub fn fix_file_length(bytes: &mut [u8]) {
    let length = bytes.len() as u32;
    bytes[4..8].copy_from_slice(&length.to_le_bytes());
}
