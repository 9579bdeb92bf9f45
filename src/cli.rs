use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "modeswitch", about = "Game-aware mouse, vibrance and pointer-speed switching")]
pub struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/modeswitch/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the automation daemon
    Run {
        /// Start with automation stopped (SIGUSR1 toggles)
        #[arg(long)]
        paused: bool,
    },

    /// List running executable names, optionally filtered
    Scan {
        /// Case-insensitive substring to match
        filter: Option<String>,
    },

    /// Manage the tracked game list
    Games {
        #[command(subcommand)]
        action: GamesAction,
    },

    /// Show which hardware surfaces are available
    Status,

    /// Force the desktop profile on all hardware now
    Reset,
}

#[derive(Subcommand)]
pub enum GamesAction {
    /// Print tracked executables
    List,

    /// Track an executable name (e.g. eldenring.exe)
    Add { name: String },

    /// Stop tracking an executable name
    Remove { name: String },
}
