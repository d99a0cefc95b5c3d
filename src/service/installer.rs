use std::io::Write;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use tempfile::NamedTempFile;

use super::{ask_run_mode, RunMode, ServiceUnit};
use crate::config::Settings;
use crate::core::Project;
use crate::env_file::{self, EnvFile, OPENAI_API_KEY};
use crate::error::BootstrapError;
use crate::prompt::Prompter;
use crate::provision::Environment;
use crate::system::{HostIdentity, ServiceRegistry};
use crate::ui;

const INSTALL_STEPS: usize = 4;

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installed {
    pub unit_name: String,
    pub unit_path: PathBuf,
    pub mode: RunMode,
    /// A blank configuration file had to be created.
    pub created_env_file: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Uninstalled {
    Removed,
    NotInstalled,
}

/// Registers the assistant with the service manager.
pub struct Installer<'a> {
    registry: &'a dyn ServiceRegistry,
    prompter: &'a dyn Prompter,
    staging_dir: PathBuf,
    verify_delay: Duration,
}

impl<'a> Installer<'a> {
    pub fn new(
        registry: &'a dyn ServiceRegistry,
        prompter: &'a dyn Prompter,
        settings: &Settings,
    ) -> Self {
        Self {
            registry,
            prompter,
            staging_dir: std::env::temp_dir(),
            verify_delay: Duration::from_millis(settings.service.verify_delay_ms),
        }
    }

    /// Where the unit is written before it is copied into place.
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    pub fn with_verify_delay(mut self, delay: Duration) -> Self {
        self.verify_delay = delay;
        self
    }

    /// Generate the unit, install it, enable it, start it and check it came up.
    ///
    /// Nothing is written when run as root or before the environment exists.
    /// The first failing registration step stops the sequence.
    pub fn install(
        &self,
        project: &Project,
        settings: &Settings,
        identity: &HostIdentity,
        mode: Option<RunMode>,
    ) -> Result<Installed, BootstrapError> {
        ui::step(1, INSTALL_STEPS, "Checking preconditions");
        refuse_root(identity, settings)?;

        let env = Environment::new(&project.env_dir);
        if !env.exists() {
            return Err(BootstrapError::Precondition {
                what: "Virtual environment",
                path: env.path().to_path_buf(),
                hint: "Run jarvis-setup first.".into(),
            });
        }
        if !project.entry_point.exists() {
            ui::warn(&format!(
                "Entry point {} does not exist yet; the service will fail until it does",
                project.entry_point.display()
            ));
        }

        ui::step(2, INSTALL_STEPS, "Checking configuration");
        let created_env_file = env_file::ensure_exists(&project.env_file)?;
        if created_env_file {
            tracing::info!("Created {}", project.env_file.display());
            ui::warn(&format!(
                "Created {} with an empty {OPENAI_API_KEY}. Edit it before relying on the service",
                project.env_file.display()
            ));
        } else if !EnvFile::load(&project.env_file)?
            .is_some_and(|file| file.is_configured(OPENAI_API_KEY))
        {
            ui::warn(&format!(
                "{OPENAI_API_KEY} is empty in {}",
                project.env_file.display()
            ));
        }

        ui::step(3, INSTALL_STEPS, "Generating service unit");
        let mode = match mode {
            Some(mode) => mode,
            None => ask_run_mode(self.prompter)?,
        };
        let unit = ServiceUnit::for_project(project, settings, mode, &identity.user);
        let target = settings.service.unit_dir.join(&unit.name);
        tracing::debug!("ExecStart={}", unit.exec_command());

        ui::step(4, INSTALL_STEPS, "Registering with systemd");
        let staged = self.stage(&unit)?;
        let installed = self.registry.install_unit_file(staged.path(), &target);
        if let Err(e) = staged.close() {
            tracing::debug!("Could not remove staged unit: {}", e);
        }
        installed?;

        self.registry.daemon_reload()?;
        self.registry.enable(&unit.name)?;
        self.registry.start(&unit.name)?;

        if !self.verify_delay.is_zero() {
            tracing::debug!("Waiting {:?} before checking {}", self.verify_delay, unit.name);
            thread::sleep(self.verify_delay);
        }
        if !self.registry.is_active(&unit.name)? {
            return Err(BootstrapError::NotActive { unit: unit.name });
        }

        tracing::info!("{} is active", unit.name);
        Ok(Installed {
            unit_name: unit.name,
            unit_path: target,
            mode,
            created_env_file,
        })
    }

    /// Stop, disable and remove the unit. A missing unit file is not an error.
    pub fn uninstall(
        &self,
        settings: &Settings,
        identity: &HostIdentity,
    ) -> Result<Uninstalled, BootstrapError> {
        refuse_root(identity, settings)?;

        let unit = settings.service.unit_name();
        let target = settings.service.unit_dir.join(&unit);
        if !target.exists() {
            tracing::info!("{} is not installed", target.display());
            return Ok(Uninstalled::NotInstalled);
        }

        self.registry.stop(&unit)?;
        self.registry.disable(&unit)?;
        self.registry.remove_unit_file(&target)?;
        self.registry.daemon_reload()?;
        Ok(Uninstalled::Removed)
    }

    /// Write the unit to a freshly created, randomly named file. The file is
    /// removed when the returned handle is dropped.
    fn stage(&self, unit: &ServiceUnit) -> Result<NamedTempFile, BootstrapError> {
        let mut staged = tempfile::Builder::new()
            .prefix(&format!("{}.", unit.name))
            .tempfile_in(&self.staging_dir)?;
        staged.write_all(unit.render().as_bytes())?;
        staged.flush()?;
        tracing::debug!("Staged unit at {}", staged.path().display());
        Ok(staged)
    }
}

fn refuse_root(identity: &HostIdentity, settings: &Settings) -> Result<(), BootstrapError> {
    if identity.is_root() {
        return Err(BootstrapError::Permission(format!(
            "Do not run this as root. Run it as the user the assistant should run as; \
             privileged steps use `{}` on their own.",
            settings.system.escalation
        )));
    }
    Ok(())
}
