use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "communicator")]
#[command(about = "Manage files on a communicator device over its serial protocol", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (default: $COMMUNICATOR_CONFIG or <config dir>/communicator/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Bridge command connecting stdio to the device, e.g.
    /// "socat - /dev/ttyACM0,b{baud},raw,echo=0"
    #[arg(long, global = true, env = "COMMUNICATOR_BRIDGE")]
    pub bridge: Option<String>,

    /// Per-read timeout in milliseconds (0 waits forever)
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show device identity and storage usage
    Info,
    /// List files on the device
    Ls,
    /// Upload a local file
    Push {
        local: PathBuf,
        /// Destination name on the device (default: local file name)
        dest: Option<String>,
    },
    /// Download a file from the device
    Pull {
        remote: String,
        /// Output path (default: remote name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete a file on the device
    Rm { path: String },
    /// Rename a file on the device
    Mv { source: String, dest: String },
    /// Play a file on the device
    Play { path: String },
    /// List configurations recorded in conf_info
    Configs,
}

impl Cli {
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "communicator=debug",
            _ => "communicator=trace",
        }
    }
}

/// Device name for a pushed file when none is given.
pub fn default_dest(local: &Path) -> Option<String> {
    local
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}
