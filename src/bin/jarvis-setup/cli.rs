use clap::Parser;
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "jarvis-setup",
    author,
    version = jarvis_setup::core::version(),
    about = "Prepare a Jarvis checkout: system packages, Python environment and API key"
)]
#[command(styles = jarvis_setup::utils::STYLES)]
pub struct JarvisSetup {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Jarvis checkout to work on
    #[arg(short, long, global = true, default_value = ".")]
    pub dir: PathBuf,

    /// Path to the config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Answer every question with its default
    #[arg(short, long)]
    pub yes: bool,

    /// Do not install system packages (already present, or no sudo)
    #[arg(long)]
    pub skip_system_packages: bool,

    #[command(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::WarnLevel>,
}

#[derive(Debug, Parser)]
pub enum Commands {
    /// Read or change values in the .env file
    Env {
        #[command(subcommand)]
        command: EnvCommands,
    },

    /// Generate shell completion scripts
    Completion {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Parser)]
pub enum EnvCommands {
    /// Set a key, keeping every other line as it is
    Set {
        /// Variable name, e.g. JARVIS_THREAD_ID
        key: String,
        value: String,
    },

    /// List configured keys with values masked
    Show,
}
