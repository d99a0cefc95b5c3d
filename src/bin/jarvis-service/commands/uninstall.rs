use jarvis_setup::{
    config::Settings,
    prompt::DefaultsPrompter,
    service::{Installer, Uninstalled},
    system::{HostIdentity, HostSystem},
    ui,
};

pub fn handle_uninstall(settings: &Settings, host: &HostSystem) -> anyhow::Result<()> {
    let identity = HostIdentity::current();
    let installer = Installer::new(host, &DefaultsPrompter, settings);

    match installer.uninstall(settings, &identity)? {
        Uninstalled::Removed => ui::success(&format!("{} removed", settings.service.unit_name())),
        Uninstalled::NotInstalled => ui::info(&format!(
            "{} is not installed, nothing to do",
            settings.service.unit_name()
        )),
    }
    Ok(())
}
