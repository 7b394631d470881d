use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Inspect and convert I256 palette images
#[derive(Parser)]
#[command(name = "i256", version, about)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand)]
pub enum CliCommand {
    /// Print header fields and the chunk layout
    Info {
        /// I256 file to inspect
        file: PathBuf,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Write one frame out as an RGBA PNG
    Export {
        /// I256 file to read
        file: PathBuf,

        /// Destination image
        output: PathBuf,

        /// Frame index
        #[arg(long, default_value_t = 0)]
        frame: usize,
    },

    /// Convert a true-colour image into a single-frame I256 file
    Import {
        /// Source image (any format the image crate reads)
        input: PathBuf,

        /// Destination I256 file
        output: PathBuf,

        /// Write palette and pixels uncompressed
        #[arg(long)]
        store: bool,
    },

    /// Load an I256 file and save it again with another compression policy
    Recompress {
        input: PathBuf,

        output: PathBuf,

        /// Write palette and pixels uncompressed
        #[arg(long)]
        store: bool,
    },
}
