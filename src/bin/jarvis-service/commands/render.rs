use jarvis_setup::{
    config::Settings,
    core::Project,
    service::{RunMode, ServiceUnit},
    system::HostIdentity,
};

pub fn handle_render(project: &Project, settings: &Settings, mode: RunMode) -> anyhow::Result<()> {
    let identity = HostIdentity::current();
    let unit = ServiceUnit::for_project(project, settings, mode, &identity.user);
    print!("{}", unit.render());
    Ok(())
}
