mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use jarvis_setup::{error::exit_code_for, ui};

fn main() -> ExitCode {
    let args = cli::JarvisSetup::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(args.verbose)
        .init();

    match commands::handle_commands(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            ui::error(&format!("{err:#}"));
            tracing::debug!("{err:?}");
            exit_code_for(&err)
        }
    }
}
