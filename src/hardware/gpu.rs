//! NVIDIA digital vibrance backend
//!
//! Vibrance is expressed to users as a 0-100 level and to the driver as a
//! signed DVC value centred on 0. The proprietary Linux driver exposes it as
//! the `DigitalVibrance` display attribute through `nvidia-settings`.

use regex::Regex;
use std::io;
use std::process::Command;
use std::sync::LazyLock;
use tracing::{debug, error, info, warn};

use super::GpuBackend;
use crate::constants::{nvidia, vibrance};
use crate::error::{HardwareError, HardwareResult};

const SURFACE: &str = "gpu";

/// `[dpy:0] (DP-0) (connected, enabled)`
static DISPLAY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[dpy:(\d+)\]\s+\(([^)]+)\)\s+\(([^)]+)\)").expect("display regex is valid")
});

/// Map a UI level to the signed hardware DVC range
pub fn vibrance_to_dvc(level: i32) -> i32 {
    let scaled = (f64::from(level - vibrance::NEUTRAL_LEVEL) * vibrance::SCALE).round() as i32;
    scaled.clamp(-vibrance::DVC_LIMIT, vibrance::DVC_LIMIT)
}

/// Scale a DVC value onto the driver attribute range
pub fn dvc_to_attribute(dvc: i32) -> i32 {
    (dvc * -nvidia::ATTRIBUTE_MIN / vibrance::DVC_LIMIT)
        .clamp(nvidia::ATTRIBUTE_MIN, nvidia::ATTRIBUTE_MAX)
}

/// One enumerated display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayHandle {
    pub id: u32,
    pub name: String,
}

impl DisplayHandle {
    fn target(&self) -> String {
        format!("[dpy:{}]", self.id)
    }
}

/// Connected and enabled displays from `nvidia-settings -q dpys`, in driver order
pub fn parse_displays(output: &str) -> Vec<DisplayHandle> {
    DISPLAY_LINE
        .captures_iter(output)
        .filter(|caps| {
            let flags: Vec<&str> = caps[3].split(',').map(str::trim).collect();
            flags.contains(&"connected") && flags.contains(&"enabled")
        })
        .filter_map(|caps| {
            Some(DisplayHandle {
                id: caps[1].parse().ok()?,
                name: caps[2].to_string(),
            })
        })
        .take(nvidia::MAX_DISPLAY_HANDLES)
        .collect()
}

/// The driver control tool
pub trait NvidiaCli: Send {
    fn query_displays(&mut self) -> io::Result<String>;
    fn assign(&mut self, assignment: &str) -> io::Result<()>;
}

/// Runs the real `nvidia-settings` binary
pub struct SystemNvidiaSettings;

fn run(args: &[&str]) -> io::Result<String> {
    let output = Command::new(nvidia::SETTINGS_BIN).args(args).output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(io::Error::other(format!(
            "{} exited with {}: {}",
            nvidia::SETTINGS_BIN,
            output.status,
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

impl NvidiaCli for SystemNvidiaSettings {
    fn query_displays(&mut self) -> io::Result<String> {
        run(&["-q", "dpys"])
    }

    fn assign(&mut self, assignment: &str) -> io::Result<()> {
        run(&["-a", assignment]).map(|_| ())
    }
}

/// GPU backend driving `DigitalVibrance` on NVIDIA displays
pub struct NvidiaVibrance {
    cli: Box<dyn NvidiaCli>,
    displays: Vec<DisplayHandle>,
    available: bool,
}

impl NvidiaVibrance {
    /// Probe the driver through the system `nvidia-settings`
    pub fn detect() -> Self {
        Self::with_cli(Box::new(SystemNvidiaSettings))
    }

    pub fn with_cli(mut cli: Box<dyn NvidiaCli>) -> Self {
        let displays = match cli.query_displays() {
            Ok(output) => parse_displays(&output),
            Err(e) => {
                warn!(error = %e, "NVIDIA control not available");
                Vec::new()
            }
        };

        let available = !displays.is_empty();
        if available {
            info!(displays = ?displays.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(), "NVIDIA vibrance control ready");
        } else {
            warn!("No NVIDIA display enumerated, vibrance control disabled");
        }

        Self {
            cli,
            displays,
            available,
        }
    }
}

impl GpuBackend for NvidiaVibrance {
    fn available(&self) -> bool {
        self.available
    }

    fn set_vibrance(&mut self, level: u8, primary_only: bool) -> HardwareResult<()> {
        if !self.available {
            return Ok(());
        }

        let dvc = vibrance_to_dvc(i32::from(level));
        let value = dvc_to_attribute(dvc);
        let targets = if primary_only {
            &self.displays[..1]
        } else {
            &self.displays[..]
        };

        let mut first_error = None;
        for dpy in targets {
            let assignment = format!(
                "{}/{}={}",
                dpy.target(),
                nvidia::VIBRANCE_ATTRIBUTE,
                value
            );
            debug!(assignment = %assignment, "Setting vibrance");
            if let Err(e) = self.cli.assign(&assignment) {
                error!(display = %dpy.name, error = %e, "Failed to set vibrance");
                first_error.get_or_insert(HardwareError::io(SURFACE, e));
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!(level = level, dvc = dvc, displays = targets.len(), "Vibrance applied");
                Ok(())
            }
        }
    }
}
