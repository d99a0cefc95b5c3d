use crate::core::get_config_dir;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    /// Path of the dotenv file relative to the project directory
    #[serde(default = "default_env_file")]
    pub env_file: PathBuf,
    #[serde(default)]
    pub environment: EnvironmentSettings,
    #[serde(default)]
    pub system: SystemSettings,
    #[serde(default)]
    pub service: ServiceSettings,
}

#[derive(Deserialize, Debug, Clone)]
pub struct EnvironmentSettings {
    /// Virtual environment directory (relative to the project directory or absolute)
    #[serde(default = "default_env_dir")]
    pub dir: PathBuf,
    /// Interpreter used to create the environment
    #[serde(default = "default_python")]
    pub python: String,
    #[serde(default = "default_requirements")]
    pub requirements: PathBuf,
    /// Installed when the requirements file is missing
    #[serde(default = "default_python_packages")]
    pub packages: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SystemSettings {
    #[serde(default = "default_package_manager")]
    pub package_manager: String,
    #[serde(default = "default_system_packages")]
    pub packages: Vec<String>,
    /// Privilege escalation command used for every privileged step
    #[serde(default = "default_escalation")]
    pub escalation: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ServiceSettings {
    /// Unit name without the `.service` suffix
    #[serde(default = "default_service_name")]
    pub name: String,
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(default = "default_entry_point")]
    pub entry_point: PathBuf,
    #[serde(default = "default_unit_dir")]
    pub unit_dir: PathBuf,
    #[serde(default = "default_restart_sec")]
    pub restart_sec: u32,
    #[serde(default = "default_start_limit_interval_sec")]
    pub start_limit_interval_sec: u32,
    #[serde(default = "default_start_limit_burst")]
    pub start_limit_burst: u32,
    /// `CPUQuota=` value, e.g. "80%". An empty string disables the cap.
    #[serde(default = "default_cpu_quota")]
    pub cpu_quota: Option<String>,
    /// `MemoryMax=` value, e.g. "1G". An empty string disables the cap.
    #[serde(default = "default_memory_max")]
    pub memory_max: Option<String>,
    /// Settle time before the post-start active check
    #[serde(default = "default_verify_delay_ms")]
    pub verify_delay_ms: u64,
}

fn default_env_file() -> PathBuf {
    PathBuf::from(".env")
}

fn default_env_dir() -> PathBuf {
    PathBuf::from("jarvis_env")
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_requirements() -> PathBuf {
    PathBuf::from("requirements.txt")
}

fn default_python_packages() -> Vec<String> {
    [
        "openai",
        "python-dotenv",
        "SpeechRecognition",
        "PyAudio",
        "pygame",
        "PyGithub",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_package_manager() -> String {
    "apt-get".to_string()
}

fn default_system_packages() -> Vec<String> {
    [
        "python3-venv",
        "python3-pip",
        "python3-dev",
        "portaudio19-dev",
        "ffmpeg",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_escalation() -> String {
    "sudo".to_string()
}

fn default_service_name() -> String {
    "jarvis".to_string()
}

fn default_description() -> String {
    "Jarvis voice assistant".to_string()
}

fn default_entry_point() -> PathBuf {
    PathBuf::from("jarvis.py")
}

fn default_unit_dir() -> PathBuf {
    PathBuf::from("/etc/systemd/system")
}

fn default_restart_sec() -> u32 {
    10
}

fn default_start_limit_interval_sec() -> u32 {
    300
}

fn default_start_limit_burst() -> u32 {
    5
}

fn default_cpu_quota() -> Option<String> {
    Some("80%".to_string())
}

fn default_memory_max() -> Option<String> {
    Some("1G".to_string())
}

fn default_verify_delay_ms() -> u64 {
    3000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            env_file: default_env_file(),
            environment: EnvironmentSettings::default(),
            system: SystemSettings::default(),
            service: ServiceSettings::default(),
        }
    }
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            dir: default_env_dir(),
            python: default_python(),
            requirements: default_requirements(),
            packages: default_python_packages(),
        }
    }
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            package_manager: default_package_manager(),
            packages: default_system_packages(),
            escalation: default_escalation(),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            description: default_description(),
            entry_point: default_entry_point(),
            unit_dir: default_unit_dir(),
            restart_sec: default_restart_sec(),
            start_limit_interval_sec: default_start_limit_interval_sec(),
            start_limit_burst: default_start_limit_burst(),
            cpu_quota: default_cpu_quota(),
            memory_max: default_memory_max(),
            verify_delay_ms: default_verify_delay_ms(),
        }
    }
}

impl ServiceSettings {
    pub fn unit_name(&self) -> String {
        format!("{}.service", self.name)
    }

    pub fn cpu_quota(&self) -> Option<&str> {
        non_empty(&self.cpu_quota)
    }

    pub fn memory_max(&self) -> Option<&str> {
        non_empty(&self.memory_max)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn load_settings(config_path: Option<&PathBuf>) -> anyhow::Result<Settings> {
    let mut config_vec = vec![];

    // User-provided settings file
    if let Some(config_path) = config_path {
        if config_path.exists() {
            config_vec.push(config_path.clone());
        } else {
            anyhow::bail!("Settings file {} not found", config_path.display());
        }
    } else if let Ok(default_path) = get_config_dir().map(|d| d.join("setup.toml")) {
        if default_path.exists() {
            config_vec.push(default_path);
        }
    }

    let settings = config::Config::builder();
    let settings = config_vec.iter().fold(settings, |s, path| {
        s.add_source(config::File::from(path.as_path()))
    });

    let settings: Settings = settings
        .add_source(
            config::Environment::with_prefix("JARVIS_SETUP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("environment.packages")
                .with_list_parse_key("system.packages"),
        )
        .build()?
        .try_deserialize()?;

    validate(&settings)?;
    Ok(settings)
}

fn validate(settings: &Settings) -> anyhow::Result<()> {
    use anyhow::Context;

    if let Some(quota) = settings.service.cpu_quota() {
        crate::utils::parse_cpu_quota(quota).context("Invalid service.cpu_quota")?;
    }
    if let Some(memory) = settings.service.memory_max() {
        crate::utils::parse_memory_max(memory).context("Invalid service.memory_max")?;
    }
    if settings.service.name.is_empty() || settings.service.name.contains('/') {
        anyhow::bail!("Invalid service.name '{}'", settings.service.name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_settings_from_file() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        temp_file
            .write_all(
                br#"
env_file = "config/jarvis.env"

[environment]
dir = "venv"
packages = ["openai"]

[service]
name = "jarvis-dev"
memory_max = "2G"
restart_sec = 30
"#,
            )
            .unwrap();

        let settings = load_settings(Some(&temp_file.path().to_path_buf())).unwrap();
        assert_eq!(settings.env_file, PathBuf::from("config/jarvis.env"));
        assert_eq!(settings.environment.dir, PathBuf::from("venv"));
        assert_eq!(settings.environment.packages, vec!["openai".to_string()]);
        assert_eq!(settings.service.unit_name(), "jarvis-dev.service");
        assert_eq!(settings.service.memory_max.as_deref(), Some("2G"));
        assert_eq!(settings.service.restart_sec, 30);
        // untouched sections keep their defaults
        assert_eq!(settings.system.package_manager, "apt-get");
        assert_eq!(settings.service.cpu_quota.as_deref(), Some("80%"));
    }

    #[test]
    fn test_load_settings_not_found() {
        let missing = PathBuf::from("/tmp/does-not-exist-jarvis-setup.toml");
        assert!(load_settings(Some(&missing)).is_err());
    }

    #[test]
    fn test_load_settings_rejects_bad_quota() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        temp_file
            .write_all(b"[service]\ncpu_quota = \"lots\"\n")
            .unwrap();

        let err = load_settings(Some(&temp_file.path().to_path_buf())).unwrap_err();
        assert!(err.to_string().contains("cpu_quota"));
    }

    #[test]
    fn test_empty_cap_disables_limit() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        temp_file
            .write_all(b"[service]\nmemory_max = \"\"\n")
            .unwrap();

        let settings = load_settings(Some(&temp_file.path().to_path_buf())).unwrap();
        assert_eq!(settings.service.memory_max(), None);
        assert_eq!(settings.service.cpu_quota(), Some("80%"));
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.service.unit_name(), "jarvis.service");
        assert_eq!(settings.service.unit_dir, PathBuf::from("/etc/systemd/system"));
        assert!(settings
            .system
            .packages
            .contains(&"portaudio19-dev".to_string()));
    }
}
