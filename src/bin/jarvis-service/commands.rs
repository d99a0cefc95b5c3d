use anyhow::Context;
use clap::CommandFactory;
use jarvis_setup::{completion, config::Settings, core::Project, system::HostSystem};

use crate::cli::{Commands, JarvisService};

pub mod install;
pub mod logs;
pub mod render;
pub mod status;
pub mod uninstall;

pub fn handle_commands(args: JarvisService, settings: &Settings) -> anyhow::Result<()> {
    let project = Project::resolve(&args.dir, settings)
        .with_context(|| format!("Failed to resolve {}", args.dir.display()))?;
    let host = HostSystem::new(settings);

    match args.command {
        Commands::Install { mode, yes } => install::handle_install(&project, settings, &host, mode, yes),
        Commands::Render { mode } => render::handle_render(&project, settings, mode),
        Commands::Uninstall => uninstall::handle_uninstall(settings, &host),
        Commands::Status => status::handle_status(settings, &host),
        Commands::Logs { follow, lines } => logs::handle_logs(settings, &host, lines, follow),
        Commands::Completion { shell } => {
            let mut cmd = JarvisService::command();
            completion::generate_to_stdout(shell, &mut cmd, "jarvis-service")
        }
    }
}
