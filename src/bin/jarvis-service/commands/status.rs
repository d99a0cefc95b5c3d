use jarvis_setup::{
    config::Settings,
    system::{HostSystem, ServiceRegistry},
};

pub fn handle_status(settings: &Settings, host: &HostSystem) -> anyhow::Result<()> {
    host.show_status(&settings.service.unit_name())?;
    Ok(())
}
