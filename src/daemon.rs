//! Headless front end: the `run` daemon and the one-shot commands

use anyhow::{Context, Result};
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM, SIGUSR1};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::cli::GamesAction;
use crate::config::{MouseSettings, Settings, SharedSettings};
use crate::constants::engine;
use crate::coordinator::{ApplyReport, HardwareCoordinator, Outcome};
use crate::engine::{self as automation, StatusUpdate};
use crate::hardware::{
    Backends, DisabledPointer, HidrawMouse, MouseBackend, NvidiaVibrance, PointerSpeedBackend,
    X11PointerSpeed,
};
use crate::process_monitor::{ProcessMonitor, SysinfoProcessSource};
use crate::safety::{SafetyProtocol, SafetyTrigger};

/// Probe every hardware surface; absent ones are logged, never fatal
pub fn build_backends(mouse_settings: &MouseSettings) -> Backends {
    let mut mouse = HidrawMouse::new(mouse_settings.clone());
    if !mouse.connect() {
        warn!("Mouse not found at startup, will retry on each transition");
    }

    let pointer: Box<dyn PointerSpeedBackend> = match X11PointerSpeed::connect() {
        Ok(pointer) => Box::new(pointer),
        Err(e) => {
            warn!(error = %e, "Pointer speed control unavailable");
            Box::new(DisabledPointer::new(format!("{e:#}")))
        }
    };

    Backends {
        mouse: Box::new(mouse),
        gpu: Box::new(NvidiaVibrance::detect()),
        pointer,
    }
}

/// Settings for the daemon; a broken file is reported and replaced by defaults
/// in memory only
fn load_or_default(path: &Path) -> Settings {
    Settings::load_from(path).unwrap_or_else(|e| {
        error!(error = %format!("{e:#}"), "Failed to load config, using defaults");
        Settings::default()
    })
}

fn log_update(update: &StatusUpdate) {
    match update {
        StatusUpdate::ModeChanged { mode, game: Some(game) } => {
            info!(mode = %mode, game = %game, "Mode changed")
        }
        StatusUpdate::ModeChanged { mode, game: None } => info!(mode = %mode, "Mode changed"),
        StatusUpdate::Started => info!("Automation running"),
        StatusUpdate::Stopped => info!("Automation paused"),
        StatusUpdate::Hardware(status) => info!(
            mouse = status.mouse_connected,
            gpu = status.gpu_available,
            pointer_default = status.pointer_default,
            "Hardware status"
        ),
    }
}

/// Run automation until SIGINT/SIGTERM. SIGHUP reloads the config file and
/// SIGUSR1 toggles automation.
pub fn run(config_path: &Path, paused: bool) -> Result<()> {
    let settings = load_or_default(config_path);
    info!(path = %config_path.display(), games = ?settings.games, "Starting automation daemon");

    let shutdown = Arc::new(AtomicBool::new(false));
    let reload = Arc::new(AtomicBool::new(false));
    let toggle = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&shutdown))
            .context("Failed to register shutdown signal handler")?;
    }
    signal_hook::flag::register(SIGHUP, Arc::clone(&reload))
        .context("Failed to register SIGHUP handler")?;
    signal_hook::flag::register(SIGUSR1, Arc::clone(&toggle))
        .context("Failed to register SIGUSR1 handler")?;

    let backends = build_backends(&settings.mouse);
    let shared = SharedSettings::new(settings);
    let (handle, status_rx) =
        automation::spawn(SysinfoProcessSource::new(), backends, shared.clone(), !paused)?;

    let drain_interval = Duration::from_millis(engine::STATUS_DRAIN_INTERVAL_MS);
    while !shutdown.load(Ordering::SeqCst) {
        if reload.swap(false, Ordering::SeqCst) {
            match Settings::load_from(config_path) {
                Ok(next) => {
                    info!(games = next.games.len(), "Config reloaded");
                    shared.replace(next);
                }
                Err(e) => error!(error = %format!("{e:#}"), "Config reload failed, keeping current settings"),
            }
        }

        if toggle.swap(false, Ordering::SeqCst) {
            let running = handle.toggle();
            info!(running = running, "Automation toggled");
        }

        match status_rx.recv_timeout(drain_interval) {
            Ok(update) => log_update(&update),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                error!("Automation thread ended unexpectedly");
                break;
            }
        }
    }

    info!("Shutting down, restoring desktop profile");
    handle.shutdown()?;
    for update in status_rx.try_iter() {
        log_update(&update);
    }
    Ok(())
}

pub fn scan(filter: Option<&str>) {
    let mut monitor = ProcessMonitor::new(SysinfoProcessSource::new());
    for name in monitor.scan(filter.unwrap_or("")) {
        println!("{name}");
    }
}

pub fn games(config_path: &Path, action: GamesAction) -> Result<()> {
    let mut settings = Settings::load_from(config_path)?;

    match action {
        GamesAction::List => {
            for game in &settings.games {
                println!("{game}");
            }
            return Ok(());
        }
        GamesAction::Add { name } => {
            if !settings.add_game(&name) {
                println!("'{}' is empty or already tracked", name.trim());
                return Ok(());
            }
        }
        GamesAction::Remove { name } => {
            if !settings.remove_game(&name) {
                println!("'{}' is not tracked", name.trim());
                return Ok(());
            }
        }
    }

    settings.save_to(config_path)?;
    info!(path = %config_path.display(), games = settings.games.len(), "Saved game list");
    for game in &settings.games {
        println!("{game}");
    }
    Ok(())
}

pub fn status(config_path: &Path) {
    let settings = load_or_default(config_path);
    let backends = build_backends(&settings.mouse);
    let status = backends.status();

    let yes_no = |b: bool| if b { "available" } else { "unavailable" };
    println!("mouse:   {}", yes_no(status.mouse_connected));
    println!("gpu:     {}", yes_no(status.gpu_available));
    println!("pointer: {}", pointer_summary(status.pointer_default));
    println!("games:   {}", settings.games.join(", "));
}

/// Core pointer control has no effect under libinput, so the index is not
/// presented as the speed in use
fn pointer_summary(default_index: u8) -> String {
    format!("default speed index {default_index} (X core pointer control, ignored by libinput)")
}

fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Applied => "applied".to_string(),
        Outcome::Skipped(reason) => format!("skipped ({reason})"),
        Outcome::Failed(e) => format!("failed ({e})"),
    }
}

fn print_report(report: &ApplyReport) {
    for (surface, outcome) in report.outcomes() {
        println!("{surface:<8} {}", describe(outcome));
    }
}

/// Force the desktop profile once, outside the daemon
pub fn reset(config_path: &Path) -> Result<()> {
    let settings = load_or_default(config_path);
    let mut coordinator = HardwareCoordinator::new(build_backends(&settings.mouse));
    let report = SafetyProtocol::execute(&mut coordinator, &settings, SafetyTrigger::Manual);
    print_report(&report);

    if report.has_transient_failure() {
        anyhow::bail!("desktop profile only partially restored");
    }
    Ok(())
}
