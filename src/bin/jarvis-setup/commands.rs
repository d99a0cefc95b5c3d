use anyhow::Context;
use clap::CommandFactory;
use jarvis_setup::{completion, config::load_settings, core::Project};

use crate::cli::{Commands, EnvCommands, JarvisSetup};

pub mod env;
pub mod setup;

pub fn handle_commands(args: JarvisSetup) -> anyhow::Result<()> {
    if let Some(Commands::Completion { shell }) = args.command {
        let mut cmd = JarvisSetup::command();
        return completion::generate_to_stdout(shell, &mut cmd, "jarvis-setup");
    }

    let settings = load_settings(args.config.as_ref()).context("Failed to load settings")?;
    let project = Project::resolve(&args.dir, &settings)
        .with_context(|| format!("Failed to resolve {}", args.dir.display()))?;
    tracing::debug!("Project layout: {:?}", project);

    match args.command {
        None => setup::handle_setup(&project, &settings, args.yes, args.skip_system_packages),
        Some(Commands::Env { command }) => match command {
            EnvCommands::Set { key, value } => env::handle_set(&project, &key, &value),
            EnvCommands::Show => env::handle_show(&project),
        },
        Some(Commands::Completion { .. }) => Ok(()),
    }
}
