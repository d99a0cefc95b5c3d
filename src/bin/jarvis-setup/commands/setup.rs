use jarvis_setup::{
    config::Settings,
    core::Project,
    env_file::ConfigOutcome,
    prompt,
    provision::{self, DependencySource, Environment, SetupOptions},
    system::HostSystem,
    ui,
};

pub fn handle_setup(
    project: &Project,
    settings: &Settings,
    yes: bool,
    skip_system_packages: bool,
) -> anyhow::Result<()> {
    println!("Jarvis setup for {}\n", project.root.display());

    let prompter = prompt::select(yes);
    let host = HostSystem::new(settings);
    let report = provision::run_setup(
        project,
        settings,
        SetupOptions {
            skip_system_packages,
        },
        prompter.as_ref(),
        &host,
    )?;

    println!();
    ui::success("Setup complete");
    ui::hint(&format!(
        "Environment: {} ({})",
        project.env_dir.display(),
        report.environment
    ));
    match &report.dependencies {
        DependencySource::RequirementsFile(path) => {
            ui::hint(&format!("Dependencies: {}", path.display()))
        }
        DependencySource::PackageList(packages) => {
            ui::hint(&format!("Dependencies: {}", packages.join(" ")))
        }
    }
    if report.config == ConfigOutcome::AlreadyConfigured {
        ui::hint(&format!("Configuration: {} (unchanged)", project.env_file.display()));
    } else {
        ui::hint(&format!("Configuration: {}", project.env_file.display()));
    }

    let python = Environment::new(&project.env_dir).python();
    println!("\nNext steps:");
    ui::hint(&format!(
        "Text mode:  {} {} --text",
        python.display(),
        project.entry_point.display()
    ));
    ui::hint(&format!(
        "Voice mode: {} {}",
        python.display(),
        project.entry_point.display()
    ));
    ui::hint("Run as a service: jarvis-service install");
    Ok(())
}
