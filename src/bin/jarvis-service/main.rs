mod cli;
mod commands;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use jarvis_setup::{
    config::load_settings,
    error::{exit_code_for, BootstrapError},
    service, ui,
};

fn main() -> ExitCode {
    let args = cli::JarvisService::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(args.verbose)
        .init();

    let settings = match load_settings(args.config.as_ref()).context("Failed to load settings") {
        Ok(settings) => settings,
        Err(err) => {
            ui::error(&format!("{err:#}"));
            return exit_code_for(&err);
        }
    };
    let installing = matches!(args.command, cli::Commands::Install { .. });

    match commands::handle_commands(args, &settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            ui::error(&format!("{err:#}"));
            tracing::debug!("{err:?}");
            if installing && needs_remediation(&err) {
                eprintln!("\nTo investigate:");
                for hint in service::remediation(&settings.service.name) {
                    ui::remedy(&hint);
                }
            }
            exit_code_for(&err)
        }
    }
}

fn needs_remediation(err: &anyhow::Error) -> bool {
    matches!(
        err.chain().find_map(|cause| cause.downcast_ref::<BootstrapError>()),
        Some(BootstrapError::ExternalCommand { .. } | BootstrapError::NotActive { .. })
    )
}
