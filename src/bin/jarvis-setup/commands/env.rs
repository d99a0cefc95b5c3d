use jarvis_setup::{
    core::Project,
    env_file::{self, ConfigOutcome, EnvFile},
    error::BootstrapError,
    ui,
    utils::mask_secret,
};

pub fn handle_set(project: &Project, key: &str, value: &str) -> anyhow::Result<()> {
    let outcome = env_file::set_value(&project.env_file, key, value)?;
    let verb = match outcome {
        ConfigOutcome::Created => "Created",
        _ => "Updated",
    };
    ui::success(&format!("{verb} {} with {key}", project.env_file.display()));
    Ok(())
}

pub fn handle_show(project: &Project) -> anyhow::Result<()> {
    let Some(file) = EnvFile::load(&project.env_file)? else {
        return Err(BootstrapError::Precondition {
            what: "Configuration file",
            path: project.env_file.clone(),
            hint: "Run jarvis-setup first.".into(),
        }
        .into());
    };

    println!("{}", project.env_file.display());
    let entries = file.entries();
    if entries.is_empty() {
        ui::hint("(no keys set)");
    }
    for (key, value) in entries {
        let shown = if value.is_empty() {
            "(empty)".to_string()
        } else {
            mask_secret(&value)
        };
        println!("  {key}={shown}");
    }
    Ok(())
}
