//! Automation state machine
//!
//! - **mod**: mode decision and the per-tick transition logic
//! - **runner**: the dedicated polling thread and its control handle

pub mod runner;

use std::collections::HashSet;
use std::sync::mpsc::{SyncSender, TrySendError};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::coordinator::HardwareCoordinator;
use crate::hardware::HardwareStatus;
use crate::mode::Mode;
use crate::process_monitor::{ProcessMonitor, ProcessSource};
use crate::safety::{SafetyProtocol, SafetyTrigger};

pub use runner::spawn;

/// First tracked game (in configured order) that is currently running
pub fn matched_game<'a>(games: &'a [String], running: &HashSet<String>) -> Option<&'a str> {
    games
        .iter()
        .find(|game| running.contains(game.as_str()))
        .map(String::as_str)
}

/// Game when any tracked executable runs, otherwise Desktop
pub fn decide_mode(games: &[String], running: &HashSet<String>) -> Mode {
    if matched_game(games, running).is_some() {
        Mode::Game
    } else {
        Mode::Desktop
    }
}

/// Runtime state, owned by the engine thread
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineState {
    pub mode: Mode,
    pub running: bool,
    pub last_applied: Option<Instant>,
}

/// Published from the engine thread to the presentation side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    ModeChanged { mode: Mode, game: Option<String> },
    Started,
    Stopped,
    Hardware(HardwareStatus),
}

/// Non-blocking sender side of the status channel
pub struct StatusSink {
    tx: Option<SyncSender<StatusUpdate>>,
}

impl StatusSink {
    pub fn new(tx: SyncSender<StatusUpdate>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Never blocks: a full channel drops the update
    pub fn publish(&mut self, update: StatusUpdate) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(update) {
            Ok(()) => {}
            Err(TrySendError::Full(update)) => {
                debug!(update = ?update, "Status channel full, dropping update");
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("Status receiver gone, disabling publication");
                self.tx = None;
            }
        }
    }
}

pub struct AutomationEngine<S: ProcessSource> {
    monitor: ProcessMonitor<S>,
    coordinator: HardwareCoordinator,
    state: EngineState,
    status: StatusSink,
    last_hardware: Option<HardwareStatus>,
}

impl<S: ProcessSource> AutomationEngine<S> {
    pub fn new(monitor: ProcessMonitor<S>, coordinator: HardwareCoordinator, status: StatusSink) -> Self {
        Self {
            monitor,
            coordinator,
            state: EngineState::default(),
            status,
            last_hardware: None,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn publish(&mut self, update: StatusUpdate) {
        self.status.publish(update);
    }

    pub(crate) fn set_running(&mut self, running: bool) {
        self.state.running = running;
    }

    /// One poll: sample processes, decide, and apply on a transition.
    ///
    /// The recorded mode only advances when no backend call failed
    /// transiently, so a failed transition is retried on the next tick.
    /// Hardware is only left alone when the coordinator also holds the
    /// target as fully applied: after a failed or interrupted transition
    /// every later target re-drives all three backends.
    pub fn tick(&mut self, settings: &Settings) {
        let running = self.monitor.poll();
        let target = decide_mode(&settings.games, &running);
        let game = matched_game(&settings.games, &running).map(str::to_string);

        if target == self.state.mode {
            if self.coordinator.applied_mode() == Some(target) {
                self.coordinator.refresh_vibrance(target, settings);
                self.publish_hardware();
                return;
            }
            warn!(mode = %target, "Previous transition incomplete, re-applying mode");
        } else {
            info!(from = %self.state.mode, to = %target, game = ?game, "Mode transition");
        }

        let report = self.coordinator.apply(target, settings);
        self.publish_hardware();

        if report.has_transient_failure() {
            warn!(mode = %target, "Mode not fully applied, retrying next tick");
            return;
        }

        let changed = self.state.mode != target;
        self.state.mode = target;
        self.state.last_applied = Some(Instant::now());
        if changed {
            self.status.publish(StatusUpdate::ModeChanged { mode: target, game });
        }
    }

    /// Force the desktop profile and record Desktop as the current mode
    pub fn halt(&mut self, settings: &Settings, trigger: SafetyTrigger) {
        SafetyProtocol::execute(&mut self.coordinator, settings, trigger);
        let changed = self.state.mode != Mode::Desktop;
        self.state.mode = Mode::Desktop;
        self.state.last_applied = Some(Instant::now());
        if changed {
            self.status.publish(StatusUpdate::ModeChanged {
                mode: Mode::Desktop,
                game: None,
            });
        }
    }

    fn publish_hardware(&mut self) {
        let status = self.coordinator.status();
        if self.last_hardware != Some(status) {
            self.last_hardware = Some(status);
            self.status.publish(StatusUpdate::Hardware(status));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::mock::{Call, MockRig, MOCK_POINTER_DEFAULT};
    use std::panic::{self, AssertUnwindSafe};
    use crate::process_monitor::fake::FakeProcessSource;
    use std::sync::mpsc::{sync_channel, Receiver};

    fn set(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn games(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn engine(gpu: bool) -> (AutomationEngine<FakeProcessSource>, FakeProcessSource, MockRig, Receiver<StatusUpdate>) {
        let source = FakeProcessSource::default();
        source.set(&[]);
        let (rig, backends) = MockRig::new(gpu);
        let (tx, rx) = sync_channel(64);
        let engine = AutomationEngine::new(
            ProcessMonitor::new(source.clone()),
            HardwareCoordinator::new(backends),
            StatusSink::new(tx),
        );
        (engine, source, rig, rx)
    }

    fn settings(tracked: &[&str]) -> Settings {
        Settings {
            games: games(tracked),
            ..Settings::default()
        }
    }

    fn mode_changes(rx: &Receiver<StatusUpdate>) -> Vec<Mode> {
        rx.try_iter()
            .filter_map(|u| match u {
                StatusUpdate::ModeChanged { mode, .. } => Some(mode),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_decide_mode_property() {
        let tracked = games(&["a.exe", "b.exe"]);
        assert_eq!(decide_mode(&tracked, &set(&["x.exe", "b.exe"])), Mode::Game);
        assert_eq!(decide_mode(&tracked, &set(&["x.exe"])), Mode::Desktop);
        assert_eq!(decide_mode(&tracked, &set(&[])), Mode::Desktop);
        assert_eq!(decide_mode(&[], &set(&["a.exe"])), Mode::Desktop);
    }

    #[test]
    fn test_matched_game_uses_list_order() {
        let tracked = games(&["b.exe", "a.exe"]);
        assert_eq!(matched_game(&tracked, &set(&["a.exe", "b.exe"])), Some("b.exe"));
    }

    #[test]
    fn test_game_launch_and_exit() {
        let (mut engine, source, rig, rx) = engine(true);
        let settings = settings(&["game.exe"]);

        engine.tick(&settings);
        assert_eq!(engine.state().mode, Mode::Desktop);

        source.set(&["explorer.exe", "game.exe"]);
        engine.tick(&settings);
        assert_eq!(engine.state().mode, Mode::Game);

        source.set(&["explorer.exe"]);
        engine.tick(&settings);
        assert_eq!(engine.state().mode, Mode::Desktop);

        assert_eq!(mode_changes(&rx), vec![Mode::Desktop, Mode::Game, Mode::Desktop]);
        assert_eq!(rig.log.count(&Call::MouseGame), 1);
        assert_eq!(rig.log.count(&Call::MouseDesktop), 2);
    }

    #[test]
    fn test_steady_state_does_no_hardware_io() {
        let (mut engine, source, rig, _rx) = engine(true);
        let settings = settings(&["game.exe"]);
        source.set(&["game.exe"]);

        engine.tick(&settings);
        let calls = rig.log.calls().len();
        for _ in 0..5 {
            engine.tick(&settings);
        }
        assert_eq!(rig.log.calls().len(), calls);
    }

    #[test]
    fn test_transient_failure_retried_next_tick() {
        let (mut engine, source, rig, _rx) = engine(true);
        let settings = settings(&["game.exe"]);
        source.set(&["game.exe"]);
        rig.faults.set(|f| f.mouse_io = true);

        engine.tick(&settings);
        assert_eq!(engine.state().mode, Mode::Unknown);
        engine.tick(&settings);
        assert_eq!(rig.log.count(&Call::MouseGame), 2);

        rig.faults.set(|f| f.mouse_io = false);
        engine.tick(&settings);
        assert_eq!(engine.state().mode, Mode::Game);
        engine.tick(&settings);
        assert_eq!(rig.log.count(&Call::MouseGame), 3);
    }

    #[test]
    fn test_game_exit_after_failed_transition_reverts() {
        let (mut engine, source, rig, _rx) = engine(true);
        let settings = settings(&["game.exe"]);
        source.set(&["explorer.exe"]);
        engine.tick(&settings);
        assert_eq!(engine.state().mode, Mode::Desktop);

        // Mouse switches to the game profile, then the GPU write fails
        rig.faults.set(|f| f.gpu_io = true);
        source.set(&["explorer.exe", "game.exe"]);
        engine.tick(&settings);
        assert_eq!(engine.state().mode, Mode::Desktop);
        assert_eq!(rig.log.count(&Call::MouseGame), 1);

        rig.faults.set(|f| f.gpu_io = false);
        source.set(&["explorer.exe"]);
        for _ in 0..5 {
            engine.tick(&settings);
        }

        assert_eq!(engine.state().mode, Mode::Desktop);
        assert_eq!(rig.log.count(&Call::MouseDesktop), 2);
        assert_eq!(rig.log.count(&Call::PointerSpeed(MOCK_POINTER_DEFAULT)), 2);
        assert_eq!(
            rig.log.calls().last(),
            Some(&Call::PointerSpeed(MOCK_POINTER_DEFAULT))
        );
    }

    #[test]
    fn test_game_exit_after_panicked_transition_reverts() {
        let (mut engine, source, rig, _rx) = engine(true);
        let settings = settings(&["game.exe"]);
        source.set(&["explorer.exe"]);
        engine.tick(&settings);

        rig.faults.set(|f| f.panic_on_mouse = true);
        source.set(&["explorer.exe", "game.exe"]);
        let result = panic::catch_unwind(AssertUnwindSafe(|| engine.tick(&settings)));
        assert!(result.is_err());

        rig.faults.set(|f| f.panic_on_mouse = false);
        source.set(&["explorer.exe"]);
        engine.tick(&settings);
        engine.tick(&settings);

        assert_eq!(engine.state().mode, Mode::Desktop);
        assert_eq!(rig.log.count(&Call::MouseDesktop), 2);
    }

    #[test]
    fn test_missing_mouse_still_advances() {
        let (mut engine, source, rig, _rx) = engine(false);
        let settings = settings(&["game.exe"]);
        source.set(&["game.exe"]);
        rig.faults.set(|f| f.mouse_missing = true);

        engine.tick(&settings);
        assert_eq!(engine.state().mode, Mode::Game);
    }

    #[test]
    fn test_process_enumeration_failure_means_desktop() {
        let (mut engine, source, _rig, _rx) = engine(true);
        let settings = settings(&["game.exe"]);
        source.set(&["game.exe"]);
        engine.tick(&settings);

        source.fail();
        engine.tick(&settings);
        assert_eq!(engine.state().mode, Mode::Desktop);
    }

    #[test]
    fn test_live_vibrance_change_only_touches_gpu() {
        let (mut engine, source, rig, _rx) = engine(true);
        let mut settings = settings(&["game.exe"]);
        source.set(&["game.exe"]);
        engine.tick(&settings);
        rig.log.clear();

        settings.game_vibrance = 70;
        engine.tick(&settings);
        assert_eq!(
            rig.log.calls(),
            vec![Call::Vibrance { level: 70, primary_only: true }]
        );
    }

    #[test]
    fn test_halt_forces_desktop() {
        let (mut engine, source, rig, rx) = engine(true);
        let settings = settings(&["game.exe"]);
        source.set(&["game.exe"]);
        engine.tick(&settings);

        engine.halt(&settings, SafetyTrigger::Stop);
        assert_eq!(engine.state().mode, Mode::Desktop);
        assert_eq!(rig.log.count(&Call::MouseDesktop), 1);
        assert_eq!(rig.log.count(&Call::PointerSpeed(MOCK_POINTER_DEFAULT)), 1);
        assert_eq!(
            rig.log.count(&Call::Vibrance { level: settings.desktop_vibrance, primary_only: true }),
            1
        );
        assert_eq!(mode_changes(&rx), vec![Mode::Game, Mode::Desktop]);

        // Game is still running, so the next tick re-enters game mode
        engine.tick(&settings);
        assert_eq!(engine.state().mode, Mode::Game);
    }

    #[test]
    fn test_status_sink_drops_when_full() {
        let (tx, rx) = sync_channel(1);
        let mut sink = StatusSink::new(tx);
        sink.publish(StatusUpdate::Started);
        sink.publish(StatusUpdate::Stopped);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![StatusUpdate::Started]);

        drop(rx);
        sink.publish(StatusUpdate::Started);
        assert!(sink.tx.is_none());
    }
}
