use std::path::{Component, Path, PathBuf};

use crate::config::Settings;

const VERSION_MESSAGE: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (built ",
    env!("VERGEN_BUILD_DATE"),
    ")\n",
    "Commit: ",
    env!("VERGEN_GIT_SHA"),
);

pub fn version() -> &'static str {
    let author = clap::crate_authors!();

    Box::leak(Box::new(format!(
        "\
{VERSION_MESSAGE}
Authors: {author}"
    )))
}

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Failed to get config directory"))
        .map(|p| p.join("jarvis"))
}

/// Directory where the assistant writes its own rolling logs.
pub fn get_assistant_log_dir() -> anyhow::Result<PathBuf> {
    dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Failed to get home directory"))
        .map(|p| p.join(".jarvis").join("logs"))
}

/// Resolved locations of everything the tools touch inside a Jarvis checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub root: PathBuf,
    pub env_dir: PathBuf,
    pub env_file: PathBuf,
    pub entry_point: PathBuf,
    pub requirements: PathBuf,
}

impl Project {
    /// Resolve the layout relative to `root`. Relative settings are joined onto
    /// the root, absolute ones are used as-is.
    pub fn resolve(root: &Path, settings: &Settings) -> anyhow::Result<Self> {
        let root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()?.join(root)
        };
        // systemd rejects unit paths with `.` or `..` components.
        let root = std::fs::canonicalize(&root).unwrap_or_else(|_| normalize(&root));

        Ok(Self {
            env_dir: normalize(&root.join(&settings.environment.dir)),
            env_file: normalize(&root.join(&settings.env_file)),
            entry_point: normalize(&root.join(&settings.service.entry_point)),
            requirements: normalize(&root.join(&settings.environment.requirements)),
            root,
        })
    }
}

/// Lexically drop `.` and resolve `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
