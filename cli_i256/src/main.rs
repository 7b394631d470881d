mod cli;
mod commands;
mod error;

use std::process::ExitCode;

use clap::Parser;

use cli::{CliArgs, CliCommand};
use error::CliError;

fn run(args: CliArgs) -> Result<(), CliError> {
    match args.command {
        CliCommand::Info { file, json } => commands::info(&file, json),
        CliCommand::Export {
            file,
            output,
            frame,
        } => commands::export(&file, &output, frame),
        CliCommand::Import {
            input,
            output,
            store,
        } => commands::import(&input, &output, store),
        CliCommand::Recompress {
            input,
            output,
            store,
        } => commands::recompress(&input, &output, store),
    }
}

fn main() -> ExitCode {
    lib_i256::init_logging();
    let args = CliArgs::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("i256: {}", e);
            ExitCode::FAILURE
        }
    }
}
