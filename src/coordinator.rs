//! Mode application across the three hardware surfaces
//!
//! The coordinator owns the backends and turns a target mode into one call
//! per surface. Every call is isolated: one backend failing never prevents
//! the others from being driven, and nothing here returns an error.

use tracing::{debug, error, info};

use crate::config::Settings;
use crate::error::{HardwareError, HardwareResult};
use crate::hardware::{Backends, HardwareStatus};
use crate::mode::Mode;

/// Result of driving one backend
#[derive(Debug)]
pub enum Outcome {
    Applied,
    /// Surface absent or disabled, call not attempted
    Skipped(String),
    /// Call attempted and failed; retried on the next transition
    Failed(HardwareError),
}

impl Outcome {
    fn from_result(result: HardwareResult<()>) -> Self {
        match result {
            Ok(()) => Self::Applied,
            Err(e) if e.is_transient() => Self::Failed(e),
            Err(e) => Self::Skipped(e.to_string()),
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Per-backend outcomes of one `apply`
#[derive(Debug)]
pub struct ApplyReport {
    pub mode: Mode,
    /// True when the mode was already applied and no hardware was touched
    pub unchanged: bool,
    pub mouse: Outcome,
    pub gpu: Outcome,
    pub pointer: Outcome,
}

impl ApplyReport {
    fn unchanged(mode: Mode, reason: &str) -> Self {
        Self {
            mode,
            unchanged: true,
            mouse: Outcome::Skipped(reason.to_string()),
            gpu: Outcome::Skipped(reason.to_string()),
            pointer: Outcome::Skipped(reason.to_string()),
        }
    }

    pub fn outcomes(&self) -> [(&'static str, &Outcome); 3] {
        [("mouse", &self.mouse), ("gpu", &self.gpu), ("pointer", &self.pointer)]
    }

    /// Any attempted call failed
    pub fn has_transient_failure(&self) -> bool {
        self.outcomes().iter().any(|(_, o)| o.is_failed())
    }

    /// Every attempted call succeeded (skips count as complete)
    pub fn is_complete(&self) -> bool {
        !self.has_transient_failure()
    }
}

fn vibrance_for(mode: Mode, settings: &Settings) -> Option<u8> {
    match mode {
        Mode::Game => Some(settings.game_vibrance),
        Mode::Desktop => Some(settings.desktop_vibrance),
        Mode::Unknown => None,
    }
}

pub struct HardwareCoordinator {
    backends: Backends,
    /// Last mode whose application completed without transient failure
    applied: Option<Mode>,
    /// Last `(level, primary_only)` successfully written to the GPU
    vibrance: Option<(u8, bool)>,
}

impl HardwareCoordinator {
    pub fn new(backends: Backends) -> Self {
        Self {
            backends,
            applied: None,
            vibrance: None,
        }
    }

    pub fn applied_mode(&self) -> Option<Mode> {
        self.applied
    }

    pub fn status(&self) -> HardwareStatus {
        self.backends.status()
    }

    /// Drive every backend into `mode`.
    ///
    /// Re-applying the mode that was last applied in full is a no-op, as is
    /// `Mode::Unknown`.
    pub fn apply(&mut self, mode: Mode, settings: &Settings) -> ApplyReport {
        if mode == Mode::Unknown {
            return ApplyReport::unchanged(mode, "no target mode");
        }
        if self.applied == Some(mode) {
            debug!(mode = %mode, "Mode already applied, skipping hardware");
            return ApplyReport::unchanged(mode, "already applied");
        }

        // Cleared first so a panic inside a backend leaves no stale marker
        self.applied = None;
        let report = self.drive(mode, settings);
        self.applied = report.is_complete().then_some(mode);
        report
    }

    /// Drive the desktop profile regardless of what was applied before
    pub fn force_desktop(&mut self, settings: &Settings) -> ApplyReport {
        let report = self.drive(Mode::Desktop, settings);
        self.applied = Some(Mode::Desktop);
        report
    }

    /// Record `mode` as applied without touching hardware
    pub(crate) fn mark_applied(&mut self, mode: Mode) {
        self.applied = Some(mode);
    }

    /// Re-write vibrance alone when the configured level for `mode` or the
    /// primary-only flag changed since the last write. Returns None when
    /// nothing needed writing.
    pub fn refresh_vibrance(&mut self, mode: Mode, settings: &Settings) -> Option<Outcome> {
        let level = vibrance_for(mode, settings)?;
        if self.applied != Some(mode) || !self.backends.gpu.available() {
            return None;
        }

        let wanted = (level, settings.single_monitor);
        if self.vibrance == Some(wanted) {
            return None;
        }

        info!(mode = %mode, level = level, primary_only = settings.single_monitor, "Vibrance setting changed, re-applying");
        let outcome = self.set_vibrance(level, settings.single_monitor);
        log_outcome(mode, "gpu", &outcome);
        Some(outcome)
    }

    fn set_vibrance(&mut self, level: u8, primary_only: bool) -> Outcome {
        if !self.backends.gpu.available() {
            return Outcome::Skipped("gpu control unavailable".to_string());
        }
        let outcome = Outcome::from_result(self.backends.gpu.set_vibrance(level, primary_only));
        if outcome.is_applied() {
            self.vibrance = Some((level, primary_only));
        }
        outcome
    }

    fn drive(&mut self, mode: Mode, settings: &Settings) -> ApplyReport {
        info!(mode = %mode, "Applying hardware mode");
        let primary_only = settings.single_monitor;

        let report = match mode {
            Mode::Game => {
                let mouse = Outcome::from_result(self.backends.mouse.set_game_mode());
                let gpu = self.set_vibrance(settings.game_vibrance, primary_only);
                let pointer = if settings.normalize_pointer {
                    let m = &settings.mouse;
                    match self.backends.pointer.optimize(m.desktop_dpi, m.game_dpi) {
                        Ok(index) => {
                            debug!(index = index, "Pointer speed normalised for game DPI");
                            Outcome::Applied
                        }
                        Err(e) => Outcome::from_result(Err(e)),
                    }
                } else {
                    Outcome::Skipped("pointer normalisation disabled".to_string())
                };
                ApplyReport {
                    mode,
                    unchanged: false,
                    mouse,
                    gpu,
                    pointer,
                }
            }
            Mode::Desktop => {
                let mouse = Outcome::from_result(self.backends.mouse.set_desktop_mode());
                let gpu = self.set_vibrance(settings.desktop_vibrance, primary_only);
                let pointer = Outcome::from_result(self.backends.pointer.reset());
                ApplyReport {
                    mode,
                    unchanged: false,
                    mouse,
                    gpu,
                    pointer,
                }
            }
            Mode::Unknown => ApplyReport::unchanged(mode, "no target mode"),
        };

        for (surface, outcome) in report.outcomes() {
            log_outcome(mode, surface, outcome);
        }
        report
    }
}

fn log_outcome(mode: Mode, surface: &str, outcome: &Outcome) {
    match outcome {
        Outcome::Applied => debug!(mode = %mode, surface = surface, "Applied"),
        Outcome::Skipped(reason) => {
            info!(mode = %mode, surface = surface, reason = %reason, "Skipped")
        }
        Outcome::Failed(e) => {
            error!(mode = %mode, surface = surface, error = %e, "Hardware call failed")
        }
    }
}
