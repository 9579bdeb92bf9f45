#![forbid(unsafe_code)]

mod cli;
mod config;
mod constants;
mod coordinator;
mod daemon;
mod engine;
mod error;
mod hardware;
mod mode;
mod process_monitor;
mod safety;

use clap::Parser;
use tracing::Level as TraceLevel;
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Command};
use config::Settings;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(Settings::default_path);

    match cli.command {
        Command::Run { paused } => daemon::run(&config_path, paused)?,
        Command::Scan { filter } => daemon::scan(filter.as_deref()),
        Command::Games { action } => daemon::games(&config_path, action)?,
        Command::Status => daemon::status(&config_path),
        Command::Reset => daemon::reset(&config_path)?,
    }

    Ok(())
}
