use jarvis_setup::{
    config::Settings,
    core::Project,
    prompt,
    service::{Installer, RunMode},
    system::{HostIdentity, HostSystem},
    ui,
};

pub fn handle_install(
    project: &Project,
    settings: &Settings,
    host: &HostSystem,
    mode: Option<RunMode>,
    yes: bool,
) -> anyhow::Result<()> {
    let identity = HostIdentity::current();
    let prompter = prompt::select(yes);
    let installer = Installer::new(host, prompter.as_ref(), settings);

    let installed = installer.install(project, settings, &identity, mode)?;

    println!();
    ui::success(&format!(
        "{} installed in {} mode and running",
        installed.unit_name, installed.mode
    ));
    ui::hint(&format!("Unit file: {}", installed.unit_path.display()));
    if installed.created_env_file {
        ui::hint(&format!(
            "Set your API key with: jarvis-setup --dir {} env set OPENAI_API_KEY <key>",
            project.root.display()
        ));
        ui::hint(&format!(
            "then restart the service: sudo systemctl restart {}",
            installed.unit_name
        ));
    }
    ui::hint("Status: jarvis-service status");
    ui::hint("Logs:   jarvis-service logs -f");
    Ok(())
}
