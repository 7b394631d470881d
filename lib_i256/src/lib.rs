pub mod bytes;
pub mod compression;
pub mod constants;
pub mod image;
pub mod quantize;

use log::*;
use std::io::Write;

pub use crate::compression::{Compression, CompressionError};
pub use crate::image::format::{Color, FileHeader, Image, ImageError, Palette, SaveOptions};
pub use crate::image::{decode, describe, encode, probe, read_header, DecodeError, EncodeError};

/// Sets up `env_logger`: debug for this library, warn for everything else.
/// `RUST_LOG` overrides both. Calling it more than once is harmless.
pub fn init_logging() {
    let _ = env_logger::Builder::new()
        .filter_level(LevelFilter::Warn)
        .filter(Some("lib_i256"), LevelFilter::Debug)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}:{}] {}",
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .try_init();
}
