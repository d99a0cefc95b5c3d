//! systemd unit generation for the assistant.

mod installer;

pub use installer::{Installed, Installer, Uninstalled};

use std::path::PathBuf;

use strum::{Display, EnumString};

use crate::config::Settings;
use crate::core::Project;
use crate::provision::Environment;
use crate::ui;

/// How the assistant talks back.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, clap::ValueEnum,
)]
#[strum(serialize_all = "lowercase")]
pub enum RunMode {
    /// Text replies only
    #[default]
    Text,
    /// Spoken replies
    Voice,
}

impl RunMode {
    /// Entry-point flags for this mode. Both modes log at debug level so the
    /// journal is useful.
    pub fn flags(self) -> &'static [&'static str] {
        match self {
            RunMode::Text => &["--text", "--debug"],
            RunMode::Voice => &["--debug"],
        }
    }

    /// Parse an answer to the numbered menu. Blank selects the default.
    pub fn from_menu_choice(answer: &str) -> Option<Self> {
        match answer.trim() {
            "" | "1" => Some(RunMode::Text),
            "2" => Some(RunMode::Voice),
            _ => None,
        }
    }
}

/// Ask for the run mode with a numbered menu, falling back to text mode on
/// anything unrecognized.
pub fn ask_run_mode(
    prompter: &dyn crate::prompt::Prompter,
) -> Result<RunMode, crate::error::BootstrapError> {
    ui::info("Select how the service should run:");
    ui::hint("1) Text mode, replies printed to the journal (default)");
    ui::hint("2) Voice mode, spoken replies");
    let answer = prompter.input("Run mode [1/2]", "1")?;

    Ok(RunMode::from_menu_choice(&answer).unwrap_or_else(|| {
        ui::warn(&format!("Unknown choice '{answer}', using text mode"));
        RunMode::default()
    }))
}

/// Everything that goes into the generated unit file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUnit {
    /// File name, e.g. `jarvis.service`
    pub name: String,
    pub description: String,
    pub user: String,
    pub mode: RunMode,
    pub working_directory: PathBuf,
    pub environment_file: PathBuf,
    pub exec_start: Vec<String>,
    pub restart_sec: u32,
    pub start_limit_interval_sec: u32,
    pub start_limit_burst: u32,
    pub cpu_quota: Option<String>,
    pub memory_max: Option<String>,
    pub syslog_identifier: String,
}

impl ServiceUnit {
    pub fn for_project(project: &Project, settings: &Settings, mode: RunMode, user: &str) -> Self {
        let env = Environment::new(&project.env_dir);
        let mut exec_start = vec![
            env.python().to_string_lossy().into_owned(),
            project.entry_point.to_string_lossy().into_owned(),
        ];
        exec_start.extend(mode.flags().iter().map(|f| f.to_string()));

        Self {
            name: settings.service.unit_name(),
            description: settings.service.description.clone(),
            user: user.to_string(),
            mode,
            working_directory: project.root.clone(),
            environment_file: project.env_file.clone(),
            exec_start,
            restart_sec: settings.service.restart_sec,
            start_limit_interval_sec: settings.service.start_limit_interval_sec,
            start_limit_burst: settings.service.start_limit_burst,
            cpu_quota: settings.service.cpu_quota().map(String::from),
            memory_max: settings.service.memory_max().map(String::from),
            syslog_identifier: settings.service.name.clone(),
        }
    }

    /// `ExecStart=` value, each word quoted as needed.
    pub fn exec_command(&self) -> String {
        self.exec_start
            .iter()
            .map(|word| shell_escape::escape(word.as_str().into()).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn render(&self) -> String {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let limits: String = [("CPUQuota", &self.cpu_quota), ("MemoryMax", &self.memory_max)]
            .into_iter()
            .filter_map(|(key, value)| value.as_ref().map(|v| format!("{key}={v}\n")))
            .collect();

        format!(
            r#"# Generated by jarvis-service on {now}
# Run mode: {mode}
[Unit]
Description={description}
After=network-online.target
Wants=network-online.target
StartLimitIntervalSec={interval}
StartLimitBurst={burst}

[Service]
Type=simple
User={user}
WorkingDirectory={workdir}
EnvironmentFile={env_file}
Environment=PYTHONUNBUFFERED=1
ExecStart={exec}
Restart=on-failure
RestartSec={restart_sec}
{limits}NoNewPrivileges=true
PrivateTmp=true
ProtectSystem=full
StandardOutput=journal
StandardError=journal
SyslogIdentifier={syslog}

[Install]
WantedBy=multi-user.target
"#,
            mode = self.mode,
            description = self.description,
            interval = self.start_limit_interval_sec,
            burst = self.start_limit_burst,
            user = self.user,
            workdir = self.working_directory.display(),
            env_file = self.environment_file.display(),
            exec = self.exec_command(),
            restart_sec = self.restart_sec,
            syslog = self.syslog_identifier,
        )
    }
}

/// Commands worth running after a failed install.
pub fn remediation(unit: &str) -> Vec<String> {
    let mut hints = vec![
        format!("journalctl -u {unit} -n 50 --no-pager"),
        format!("systemctl status {unit}"),
    ];
    if let Ok(dir) = crate::core::get_assistant_log_dir() {
        hints.push(format!("Assistant logs: {}", dir.display()));
    }
    hints
}
