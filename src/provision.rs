//! Python virtual environment provisioning and the `jarvis-setup` flow.

use std::fs;
use std::path::{Path, PathBuf};

use strum::Display;

use crate::config::Settings;
use crate::core::Project;
use crate::env_file::{self, ConfigOutcome, OPENAI_API_KEY};
use crate::error::BootstrapError;
use crate::prompt::Prompter;
use crate::system::PackageInstaller;
use crate::ui;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum EnvironmentState {
    #[strum(to_string = "created")]
    Created,
    #[strum(to_string = "reused")]
    Reused,
    #[strum(to_string = "recreated")]
    Recreated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    path: PathBuf,
}

impl Environment {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    pub fn python(&self) -> PathBuf {
        self.path.join("bin").join("python")
    }

    /// `python -m venv` always writes `pyvenv.cfg` at the root.
    pub fn is_virtualenv(&self) -> bool {
        self.path.join("pyvenv.cfg").is_file()
    }
}

/// Create the environment, or reuse / rebuild an existing one.
///
/// `allow_recreate` must come from an explicit operator confirmation: it is
/// the only path that deletes anything.
pub fn ensure_environment(
    env: &Environment,
    allow_recreate: bool,
    installer: &dyn PackageInstaller,
) -> Result<EnvironmentState, BootstrapError> {
    if !env.exists() {
        installer.create_environment(env.path())?;
        tracing::info!("Created virtual environment at {}", env.path().display());
        return Ok(EnvironmentState::Created);
    }

    if !allow_recreate {
        tracing::info!("Reusing virtual environment at {}", env.path().display());
        return Ok(EnvironmentState::Reused);
    }

    if !env.is_virtualenv() {
        return Err(BootstrapError::Precondition {
            what: "Virtual environment marker (pyvenv.cfg)",
            path: env.path().join("pyvenv.cfg"),
            hint: "Refusing to delete a directory that is not a virtual environment.".to_string(),
        });
    }

    tracing::info!("Removing virtual environment at {}", env.path().display());
    fs::remove_dir_all(env.path())?;
    installer.create_environment(env.path())?;
    Ok(EnvironmentState::Recreated)
}

/// Confirm the environment's interpreter really lives at the expected path
/// before anything gets installed through it.
pub fn verify_activation(
    env: &Environment,
    installer: &dyn PackageInstaller,
) -> Result<(), BootstrapError> {
    let reported = installer.environment_prefix(env.path())?;
    if same_path(&reported, env.path()) {
        Ok(())
    } else {
        Err(BootstrapError::Activation {
            expected: env.path().to_path_buf(),
            actual: reported,
        })
    }
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Where the Python dependencies came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencySource {
    RequirementsFile(PathBuf),
    PackageList(Vec<String>),
}

pub fn install_dependencies(
    env: &Environment,
    requirements: &Path,
    fallback_packages: &[String],
    installer: &dyn PackageInstaller,
) -> Result<DependencySource, BootstrapError> {
    installer.upgrade_pip(env.path())?;

    if requirements.is_file() {
        installer.install_requirements(env.path(), requirements)?;
        Ok(DependencySource::RequirementsFile(requirements.to_path_buf()))
    } else {
        tracing::warn!(
            "{} not found, installing the default package list",
            requirements.display()
        );
        installer.install_packages(env.path(), fallback_packages)?;
        Ok(DependencySource::PackageList(fallback_packages.to_vec()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SetupOptions {
    pub skip_system_packages: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupReport {
    pub environment: EnvironmentState,
    pub dependencies: DependencySource,
    pub config: ConfigOutcome,
}

const SETUP_STEPS: usize = 4;

/// The whole `jarvis-setup` run: system packages, environment, Python
/// dependencies, API key. Any failure stops the run where it happened.
pub fn run_setup(
    project: &Project,
    settings: &Settings,
    options: SetupOptions,
    prompter: &dyn Prompter,
    installer: &dyn PackageInstaller,
) -> Result<SetupReport, BootstrapError> {
    ui::step(1, SETUP_STEPS, "System packages");
    if options.skip_system_packages {
        ui::info("Skipping system packages (--skip-system-packages)");
    } else {
        installer.install_system_packages(&settings.system.packages)?;
        ui::success("System packages installed");
    }

    ui::step(2, SETUP_STEPS, "Virtual environment");
    let env = Environment::new(&project.env_dir);
    let allow_recreate = env.exists()
        && prompter.confirm(
            &format!(
                "A virtual environment already exists at {}. Recreate it?",
                env.path().display()
            ),
            false,
        )?;
    let environment = ensure_environment(&env, allow_recreate, installer)?;
    ui::success(&format!(
        "Virtual environment {} at {}",
        environment,
        env.path().display()
    ));

    ui::step(3, SETUP_STEPS, "Python dependencies");
    verify_activation(&env, installer)?;
    let dependencies = install_dependencies(
        &env,
        &project.requirements,
        &settings.environment.packages,
        installer,
    )?;
    ui::success("Python dependencies installed");

    ui::step(4, SETUP_STEPS, "Configuration");
    let config = env_file::ensure_config_value(
        &project.env_file,
        OPENAI_API_KEY,
        prompter,
        env_file::validate_api_key,
    )?;
    match config {
        ConfigOutcome::AlreadyConfigured => ui::info(&format!(
            "{OPENAI_API_KEY} already configured in {}",
            project.env_file.display()
        )),
        ConfigOutcome::Updated | ConfigOutcome::Created => ui::success(&format!(
            "{OPENAI_API_KEY} saved to {}",
            project.env_file.display()
        )),
    }

    Ok(SetupReport {
        environment,
        dependencies,
        config,
    })
}
