use jarvis_setup::{
    config::Settings,
    core::get_assistant_log_dir,
    system::{HostSystem, ServiceRegistry},
};

pub fn handle_logs(
    settings: &Settings,
    host: &HostSystem,
    lines: u32,
    follow: bool,
) -> anyhow::Result<()> {
    if !follow {
        if let Ok(dir) = get_assistant_log_dir() {
            tracing::info!("Assistant log files: {}", dir.display());
        }
    }
    host.show_logs(&settings.service.unit_name(), lines, follow)?;
    Ok(())
}
