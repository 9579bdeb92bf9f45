//! Forced revert to the desktop profile
//!
//! Runs on every path that leaves automation: stop, shutdown and an
//! unwinding engine thread. It is also called from `Drop`, so a panic inside
//! a backend is contained here instead of escaping into an unwind.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::coordinator::{ApplyReport, HardwareCoordinator, Outcome};
use crate::error::HardwareError;
use crate::mode::Mode;

/// Why the revert was requested; only used for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyTrigger {
    Stop,
    Shutdown,
    TickPanic,
    Manual,
}

impl fmt::Display for SafetyTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stop => "stop",
            Self::Shutdown => "shutdown",
            Self::TickPanic => "panic",
            Self::Manual => "manual",
        })
    }
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

pub struct SafetyProtocol;

impl SafetyProtocol {
    /// Drive every backend to the desktop profile, ignoring the applied mode.
    ///
    /// Never fails and never panics. Repeated calls issue the same hardware
    /// calls. The coordinator is left recording `Mode::Desktop`.
    pub fn execute(
        coordinator: &mut HardwareCoordinator,
        settings: &Settings,
        trigger: SafetyTrigger,
    ) -> ApplyReport {
        info!(trigger = %trigger, "Reverting hardware to desktop profile");

        let report = match panic::catch_unwind(AssertUnwindSafe(|| {
            coordinator.force_desktop(settings)
        })) {
            Ok(report) => report,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(trigger = %trigger, panic = %message, "Desktop revert panicked");
                coordinator.mark_applied(Mode::Desktop);
                let failed = || Outcome::Failed(HardwareError::command("safety", message.clone()));
                ApplyReport {
                    mode: Mode::Desktop,
                    unchanged: false,
                    mouse: failed(),
                    gpu: failed(),
                    pointer: failed(),
                }
            }
        };

        if report.is_complete() {
            info!(trigger = %trigger, "Desktop profile restored");
        } else {
            warn!(trigger = %trigger, "Desktop profile only partially restored");
        }
        report
    }
}
