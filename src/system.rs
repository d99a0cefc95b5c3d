//! External collaborators: package managers, the Python toolchain and systemd.
//!
//! Each concern is a trait with one real implementation, [`HostSystem`], that
//! shells out. Every non-zero exit becomes [`BootstrapError::ExternalCommand`]
//! carrying the step name, so callers can abort with a precise diagnostic.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use crate::config::Settings;
use crate::error::BootstrapError;

#[cfg_attr(test, mockall::automock)]
pub trait PackageInstaller {
    /// Refresh the package index and install OS packages. All or nothing.
    fn install_system_packages(&self, packages: &[String]) -> Result<(), BootstrapError>;

    fn create_environment(&self, env_dir: &Path) -> Result<(), BootstrapError>;

    /// Prefix reported by the environment's own interpreter (`sys.prefix`).
    fn environment_prefix(&self, env_dir: &Path) -> Result<PathBuf, BootstrapError>;

    fn upgrade_pip(&self, env_dir: &Path) -> Result<(), BootstrapError>;

    fn install_requirements(
        &self,
        env_dir: &Path,
        requirements: &Path,
    ) -> Result<(), BootstrapError>;

    fn install_packages(&self, env_dir: &Path, packages: &[String]) -> Result<(), BootstrapError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait ServiceRegistry {
    /// Copy a staged unit file into the managed unit directory.
    fn install_unit_file(&self, staged: &Path, target: &Path) -> Result<(), BootstrapError>;

    fn remove_unit_file(&self, target: &Path) -> Result<(), BootstrapError>;

    fn daemon_reload(&self) -> Result<(), BootstrapError>;

    fn enable(&self, unit: &str) -> Result<(), BootstrapError>;

    fn disable(&self, unit: &str) -> Result<(), BootstrapError>;

    fn start(&self, unit: &str) -> Result<(), BootstrapError>;

    fn stop(&self, unit: &str) -> Result<(), BootstrapError>;

    fn is_active(&self, unit: &str) -> Result<bool, BootstrapError>;

    /// Print `systemctl status` to the terminal.
    fn show_status(&self, unit: &str) -> Result<(), BootstrapError>;

    /// Print (or follow) the unit's journal.
    fn show_logs(&self, unit: &str, lines: u32, follow: bool) -> Result<(), BootstrapError>;
}

/// Who is running the tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    pub uid: u32,
    pub user: String,
}

impl HostIdentity {
    pub fn current() -> Self {
        let uid = unsafe { libc::geteuid() };
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("LOGNAME"))
            .unwrap_or_else(|_| uid.to_string());
        Self { uid, user }
    }

    pub fn is_root(&self) -> bool {
        self.uid == 0
    }
}

/// A command about to run, kept for diagnostics.
#[derive(Debug, Clone)]
struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    fn arg(mut self, arg: impl AsRef<std::ffi::OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    /// Prefix with the escalation command, e.g. `sudo`.
    fn escalated(self, escalation: &str) -> Self {
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(self.program);
        args.extend(self.args);
        Self {
            program: escalation.to_string(),
            args,
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", shell_escape::escape(arg.as_str().into()))?;
        }
        Ok(())
    }
}

const APT_REFRESH: &[&str] = &["update"];
const INSTALL_YES: &[&str] = &["install", "-y"];
const PACMAN_INSTALL: &[&str] = &["-Sy", "--noconfirm", "--needed"];
const ZYPPER_INSTALL: &[&str] = &["--non-interactive", "install"];

/// Argument layout for the supported package managers: an optional index
/// refresh, then the non-interactive install prefix.
fn package_manager_args(manager: &str) -> (Option<&'static [&'static str]>, &'static [&'static str]) {
    let name = Path::new(manager)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(manager);
    match name {
        "apt-get" | "apt" => (Some(APT_REFRESH), INSTALL_YES),
        "pacman" => (None, PACMAN_INSTALL),
        "zypper" => (None, ZYPPER_INSTALL),
        _ => (None, INSTALL_YES),
    }
}

/// Real implementation shelling out to the host's tools.
#[derive(Debug, Clone)]
pub struct HostSystem {
    escalation: String,
    package_manager: String,
    python: String,
}

impl HostSystem {
    pub fn new(settings: &Settings) -> Self {
        Self {
            escalation: settings.system.escalation.clone(),
            package_manager: settings.system.package_manager.clone(),
            python: settings.environment.python.clone(),
        }
    }

    fn env_python(env_dir: &Path) -> PathBuf {
        env_dir.join("bin").join("python")
    }

    fn privileged(&self, line: CommandLine) -> CommandLine {
        line.escalated(&self.escalation)
    }

    /// Run with output captured; fail on non-zero exit.
    fn run_captured(&self, step: &'static str, line: CommandLine) -> Result<Output, BootstrapError> {
        tracing::debug!("Running: {}", line);
        let output = line
            .command()
            .stdin(Stdio::inherit())
            .output()
            .map_err(|e| spawn_error(step, &line, e))?;

        if output.status.success() {
            Ok(output)
        } else {
            Err(BootstrapError::ExternalCommand {
                step,
                command: line.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }

    /// Run attached to the terminal so long installs show progress.
    fn run_streamed(&self, step: &'static str, line: CommandLine) -> Result<(), BootstrapError> {
        tracing::debug!("Running: {}", line);
        let status = line
            .command()
            .status()
            .map_err(|e| spawn_error(step, &line, e))?;

        if status.success() {
            Ok(())
        } else {
            Err(BootstrapError::ExternalCommand {
                step,
                command: line.to_string(),
                status: status.to_string(),
                stderr: String::new(),
            })
        }
    }
}

fn spawn_error(step: &'static str, line: &CommandLine, err: std::io::Error) -> BootstrapError {
    BootstrapError::ExternalCommand {
        step,
        command: line.to_string(),
        status: format!("failed to start ({err})"),
        stderr: String::new(),
    }
}

impl PackageInstaller for HostSystem {
    fn install_system_packages(&self, packages: &[String]) -> Result<(), BootstrapError> {
        if packages.is_empty() {
            return Ok(());
        }
        let (refresh, install) = package_manager_args(&self.package_manager);

        if let Some(refresh) = refresh {
            self.run_streamed(
                "Refresh package index",
                self.privileged(CommandLine::new(&self.package_manager).args(refresh)),
            )?;
        }
        self.run_streamed(
            "Install system packages",
            self.privileged(
                CommandLine::new(&self.package_manager)
                    .args(install)
                    .args(packages),
            ),
        )
    }

    fn create_environment(&self, env_dir: &Path) -> Result<(), BootstrapError> {
        self.run_streamed(
            "Create virtual environment",
            CommandLine::new(&self.python).args(["-m", "venv"]).arg(env_dir),
        )
    }

    fn environment_prefix(&self, env_dir: &Path) -> Result<PathBuf, BootstrapError> {
        let output = self.run_captured(
            "Check environment activation",
            CommandLine::new(Self::env_python(env_dir).to_string_lossy())
                .args(["-c", "import sys; print(sys.prefix)"]),
        )?;
        let prefix = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(PathBuf::from(prefix))
    }

    fn upgrade_pip(&self, env_dir: &Path) -> Result<(), BootstrapError> {
        self.run_streamed(
            "Upgrade pip",
            CommandLine::new(Self::env_python(env_dir).to_string_lossy())
                .args(["-m", "pip", "install", "--upgrade", "pip"]),
        )
    }

    fn install_requirements(
        &self,
        env_dir: &Path,
        requirements: &Path,
    ) -> Result<(), BootstrapError> {
        self.run_streamed(
            "Install Python requirements",
            CommandLine::new(Self::env_python(env_dir).to_string_lossy())
                .args(["-m", "pip", "install", "-r"])
                .arg(requirements),
        )
    }

    fn install_packages(&self, env_dir: &Path, packages: &[String]) -> Result<(), BootstrapError> {
        if packages.is_empty() {
            return Ok(());
        }
        self.run_streamed(
            "Install Python packages",
            CommandLine::new(Self::env_python(env_dir).to_string_lossy())
                .args(["-m", "pip", "install"])
                .args(packages),
        )
    }
}

impl ServiceRegistry for HostSystem {
    fn install_unit_file(&self, staged: &Path, target: &Path) -> Result<(), BootstrapError> {
        self.run_captured(
            "Install unit file",
            self.privileged(
                CommandLine::new("install")
                    .args(["-m", "0644", "-o", "root", "-g", "root"])
                    .arg(staged)
                    .arg(target),
            ),
        )?;
        Ok(())
    }

    fn remove_unit_file(&self, target: &Path) -> Result<(), BootstrapError> {
        self.run_captured(
            "Remove unit file",
            self.privileged(CommandLine::new("rm").arg("-f").arg(target)),
        )?;
        Ok(())
    }

    fn daemon_reload(&self) -> Result<(), BootstrapError> {
        self.run_captured(
            "Reload systemd",
            self.privileged(CommandLine::new("systemctl").arg("daemon-reload")),
        )?;
        Ok(())
    }

    fn enable(&self, unit: &str) -> Result<(), BootstrapError> {
        self.run_captured(
            "Enable service",
            self.privileged(CommandLine::new("systemctl").args(["enable", unit])),
        )?;
        Ok(())
    }

    fn disable(&self, unit: &str) -> Result<(), BootstrapError> {
        self.run_captured(
            "Disable service",
            self.privileged(CommandLine::new("systemctl").args(["disable", unit])),
        )?;
        Ok(())
    }

    fn start(&self, unit: &str) -> Result<(), BootstrapError> {
        self.run_captured(
            "Start service",
            self.privileged(CommandLine::new("systemctl").args(["start", unit])),
        )?;
        Ok(())
    }

    fn stop(&self, unit: &str) -> Result<(), BootstrapError> {
        self.run_captured(
            "Stop service",
            self.privileged(CommandLine::new("systemctl").args(["stop", unit])),
        )?;
        Ok(())
    }

    fn is_active(&self, unit: &str) -> Result<bool, BootstrapError> {
        let line = CommandLine::new("systemctl").args(["is-active", "--quiet", unit]);
        tracing::debug!("Running: {}", line);
        let status = line
            .command()
            .status()
            .map_err(|e| spawn_error("Check service state", &line, e))?;
        Ok(status.success())
    }

    fn show_status(&self, unit: &str) -> Result<(), BootstrapError> {
        let line = CommandLine::new("systemctl").args(["status", "--no-pager", unit]);
        tracing::debug!("Running: {}", line);
        // Non-zero here only means "not running"; the output says why.
        let status = line
            .command()
            .status()
            .map_err(|e| spawn_error("Show service status", &line, e))?;
        tracing::debug!("systemctl status exited with {}", status);
        Ok(())
    }

    fn show_logs(&self, unit: &str, lines: u32, follow: bool) -> Result<(), BootstrapError> {
        let mut line = CommandLine::new("journalctl")
            .args(["-u", unit, "--no-pager", "-n"])
            .arg(lines.to_string());
        if follow {
            line = line.arg("-f");
        }
        self.run_streamed("Show service logs", line)
    }
}
