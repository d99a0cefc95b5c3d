use clap::Parser;
use clap_complete::Shell;
use jarvis_setup::service::RunMode;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "jarvis-service",
    author,
    version = jarvis_setup::core::version(),
    about = "Run the Jarvis assistant as a systemd service"
)]
#[command(styles = jarvis_setup::utils::STYLES)]
pub struct JarvisService {
    #[command(subcommand)]
    pub command: Commands,

    /// Jarvis checkout the service runs from
    #[arg(short, long, global = true, default_value = ".")]
    pub dir: PathBuf,

    /// Path to the config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::WarnLevel>,
}

#[derive(Debug, Parser)]
pub enum Commands {
    /// Generate, install, enable and start the unit
    Install {
        /// Skip the run mode menu
        #[arg(long, value_enum)]
        mode: Option<RunMode>,

        /// Answer every question with its default
        #[arg(short, long)]
        yes: bool,
    },

    /// Print the unit that would be installed
    Render {
        #[arg(long, value_enum, default_value_t = RunMode::Text)]
        mode: RunMode,
    },

    /// Stop, disable and remove the unit
    Uninstall,

    /// Show `systemctl status` for the unit
    Status,

    /// Show the unit's journal
    Logs {
        /// Keep following new entries
        #[arg(short, long)]
        follow: bool,

        /// Number of lines to show
        #[arg(short = 'n', long, default_value_t = 50)]
        lines: u32,
    },

    /// Generate shell completion scripts
    Completion {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
