use std::fs;
use std::path::Path;

use image::RgbaImage;
use lib_i256::constants::{FILE_EXT, FORMAT_NAME, MAX_DIMENSION};
use lib_i256::quantize::{expand, quantize};
use lib_i256::{describe, Compression, Image, SaveOptions};
use log::info;
use serde_json::json;

use crate::error::CliError;

fn save_options(store: bool) -> SaveOptions {
    if store {
        SaveOptions::stored()
    } else {
        SaveOptions::new(Compression::Lzsa2)
    }
}

pub fn info(path: &Path, as_json: bool) -> Result<(), CliError> {
    let bytes = fs::read(path)?;
    let summary = describe(&bytes)?;
    let image = Image::load(&bytes)?;

    if as_json {
        let report = json!({
            "file": summary,
            "colors": image.color_count(),
            "frames": image.frame_count(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{} ({})", path.display(), FORMAT_NAME);
    println!("  size:    {} bytes", summary.file_length);
    println!("  version: {}", summary.version);
    println!("  extent:  {}x{}", summary.width, summary.height);
    println!("  colors:  {}", image.color_count());
    println!("  frames:  {}", image.frame_count());
    for chunk in &summary.chunks {
        println!(
            "  {} at {:>8}, {:>8} bytes",
            chunk.tag, chunk.offset, chunk.length
        );
    }
    Ok(())
}

pub fn export(path: &Path, output: &Path, frame: usize) -> Result<(), CliError> {
    let image = Image::load(&fs::read(path)?)?;
    let indices = image.frame(frame).ok_or(CliError::NoSuchFrame {
        index: frame,
        count: image.frame_count(),
    })?;

    let rgba = expand(image.palette(), indices)?;
    let (width, height) = (image.width() as u32, image.height() as u32);
    let buffer = RgbaImage::from_raw(width, height, rgba)
        .ok_or(CliError::BufferMismatch { width, height })?;
    buffer.save(output)?;

    info!("Exported frame {} to {}", frame, output.display());
    Ok(())
}

pub fn import(input: &Path, output: &Path, store: bool) -> Result<(), CliError> {
    let rgba = image::open(input)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width > MAX_DIMENSION as u32 || height > MAX_DIMENSION as u32 {
        return Err(CliError::TooLarge { width, height });
    }

    let quantized = quantize(rgba.as_raw())?;
    let mut image = Image::new(width as u16, height as u16, quantized.palette.len())?;
    image.set_palette(quantized.palette)?;
    image.add_images(vec![quantized.indices])?;

    let output = match output.extension() {
        Some(_) => output.to_path_buf(),
        None => output.with_extension(FILE_EXT),
    };
    let encoded = image.save_with(&save_options(store))?;
    fs::write(&output, &encoded)?;

    info!(
        "Imported {} as {}x{} with {} colors ({} bytes)",
        input.display(),
        width,
        height,
        image.color_count(),
        encoded.len()
    );
    Ok(())
}

pub fn recompress(input: &Path, output: &Path, store: bool) -> Result<(), CliError> {
    let original = fs::read(input)?;
    let image = Image::load(&original)?;

    let encoded = image.save_with(&save_options(store))?;
    fs::write(output, &encoded)?;

    info!(
        "Recompressed {}: {} -> {} bytes",
        input.display(),
        original.len(),
        encoded.len()
    );
    Ok(())
}
