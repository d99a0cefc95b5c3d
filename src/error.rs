use std::path::PathBuf;
use std::process::ExitCode;

/// Failures that abort a setup or install run.
///
/// Format warnings on the API key are not errors; see [`crate::env_file::KeyWarning`].
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("{what} not found at {}. {hint}", .path.display())]
    Precondition {
        what: &'static str,
        path: PathBuf,
        hint: String,
    },

    #[error("{0}")]
    Permission(String),

    #[error("{step} failed: `{command}` exited with {status}{}", stderr_suffix(.stderr))]
    ExternalCommand {
        step: &'static str,
        command: String,
        status: String,
        stderr: String,
    },

    #[error(
        "Environment activation check failed: interpreter reports prefix {} but expected {}",
        .actual.display(),
        .expected.display()
    )]
    Activation { expected: PathBuf, actual: PathBuf },

    #[error("Service {unit} is not active after start")]
    NotActive { unit: String },

    #[error("Cancelled by user")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn stderr_suffix(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

impl BootstrapError {
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    fn code(&self) -> u8 {
        match self {
            BootstrapError::Precondition { .. } | BootstrapError::Activation { .. } => 2,
            BootstrapError::Permission(_) => 3,
            BootstrapError::ExternalCommand { .. } => 4,
            BootstrapError::NotActive { .. } => 5,
            BootstrapError::Cancelled => 130,
            BootstrapError::Io(_) => 1,
        }
    }
}

/// Walk an `anyhow` chain and pick the exit code of the first bootstrap error in it.
pub fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<BootstrapError>())
        .map(BootstrapError::exit_code)
        .unwrap_or(ExitCode::FAILURE)
}
