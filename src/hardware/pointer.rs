//! OS pointer-speed scaling
//!
//! Speed is a 1-20 index into a fixed nonlinear multiplier table. On X11 the
//! multiplier is the core pointer acceleration fraction, written with
//! `ChangePointerControl`.
//!
//! Core acceleration only moves the cursor under drivers that honour it, such
//! as xf86-input-evdev. xf86-input-libinput, the default on current Xorg,
//! ignores it, so a successful write or the reported default index does not
//! show that the speed actually changed.

use anyhow::{Context, Result};
use tracing::{debug, info};
use x11rb::protocol::xproto::ConnectionExt as _;
use x11rb::rust_connection::RustConnection;

use super::PointerSpeedBackend;
use crate::constants::pointer::{
    BASE_INDEX, FRACTION_DENOMINATOR, MAX_INDEX, MIN_INDEX, MULTIPLIERS,
};
use crate::error::{HardwareError, HardwareResult};

const SURFACE: &str = "pointer";

pub fn clamp_index(index: u8) -> u8 {
    index.clamp(MIN_INDEX, MAX_INDEX)
}

pub fn multiplier(index: u8) -> f64 {
    MULTIPLIERS[usize::from(clamp_index(index) - MIN_INDEX)]
}

/// Index whose multiplier is closest to `desired`; ties go to the lower index
pub fn nearest_index(desired: f64) -> u8 {
    let mut best = MIN_INDEX;
    let mut best_diff = f64::INFINITY;
    for index in MIN_INDEX..=MAX_INDEX {
        let diff = (multiplier(index) - desired).abs();
        if diff < best_diff {
            best = index;
            best_diff = diff;
        }
    }
    best
}

/// Speed index keeping cursor travel constant when sensitivity goes from
/// `base` to `target` (e.g. desktop DPI to game DPI)
pub fn optimal_index(base: u32, target: u32) -> u8 {
    if target == 0 {
        return BASE_INDEX;
    }
    let desired = multiplier(BASE_INDEX) * f64::from(base) / f64::from(target);
    nearest_index(desired)
}

/// Acceleration fraction for an index, over a fixed denominator
pub fn index_to_fraction(index: u8) -> (u16, u16) {
    let numerator = (multiplier(index) * f64::from(FRACTION_DENOMINATOR)).round() as u16;
    (numerator, FRACTION_DENOMINATOR)
}

/// Nearest index for an acceleration fraction read back from the server
pub fn fraction_to_index(numerator: u16, denominator: u16) -> u8 {
    if denominator == 0 {
        return BASE_INDEX;
    }
    nearest_index(f64::from(numerator) / f64::from(denominator))
}

fn x11_error(e: impl std::fmt::Display) -> HardwareError {
    HardwareError::command(SURFACE, e.to_string())
}

/// Core pointer acceleration on the current X display
pub struct X11PointerSpeed {
    conn: RustConnection,
    default_index: u8,
}

impl X11PointerSpeed {
    /// Connect to `$DISPLAY` and capture the acceleration currently in effect
    pub fn connect() -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None).context("Failed to connect to X11")?;
        let reply = conn
            .get_pointer_control()
            .context("Failed to query pointer control")?
            .reply()
            .context("Failed to read pointer control reply")?;

        let default_index =
            fraction_to_index(reply.acceleration_numerator, reply.acceleration_denominator);
        info!(
            screen = screen_num,
            numerator = reply.acceleration_numerator,
            denominator = reply.acceleration_denominator,
            default_index = default_index,
            "Captured pointer speed"
        );

        Ok(Self {
            conn,
            default_index,
        })
    }
}

impl PointerSpeedBackend for X11PointerSpeed {
    fn default_index(&self) -> u8 {
        self.default_index
    }

    fn set_speed(&mut self, index: u8) -> HardwareResult<()> {
        let index = clamp_index(index);
        let (numerator, denominator) = index_to_fraction(index);
        debug!(index = index, numerator = numerator, denominator = denominator, "Setting pointer speed");

        self.conn
            .change_pointer_control(numerator as i16, denominator as i16, 0, true, false)
            .map_err(x11_error)?
            .check()
            .map_err(x11_error)?;
        info!(index = index, multiplier = multiplier(index), "Pointer speed applied");
        Ok(())
    }
}

/// Stand-in when no X display is reachable
pub struct DisabledPointer {
    reason: String,
}

impl DisabledPointer {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl PointerSpeedBackend for DisabledPointer {
    fn default_index(&self) -> u8 {
        BASE_INDEX
    }

    fn set_speed(&mut self, _index: u8) -> HardwareResult<()> {
        Err(HardwareError::DriverUnavailable(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiplier_table_bounds() {
        assert_eq!(multiplier(1), 0.03125);
        assert_eq!(multiplier(10), 1.0);
        assert_eq!(multiplier(20), 3.5);
        // Out of range indices clamp
        assert_eq!(multiplier(0), 0.03125);
        assert_eq!(multiplier(99), 3.5);
    }

    #[test]
    fn test_optimal_index_halves_for_double_dpi() {
        // 800 → 1600 DPI wants a 0.5 multiplier
        assert_eq!(optimal_index(800, 1600), 6);
        assert_eq!(optimal_index(1600, 1600), 10);
        assert_eq!(optimal_index(1600, 800), 14);
    }

    #[test]
    fn test_nearest_index_tie_goes_to_lower() {
        // 0.1875 sits exactly between 0.125 (3) and 0.25 (4)
        assert_eq!(optimal_index(3, 16), 3);
        // 1.125 sits exactly between 1.0 (10) and 1.25 (11)
        assert_eq!(nearest_index(1.125), 10);
    }

    #[test]
    fn test_nearest_index_saturates() {
        assert_eq!(nearest_index(0.0), 1);
        assert_eq!(nearest_index(100.0), 20);
        assert_eq!(optimal_index(800, 0), BASE_INDEX);
    }

    #[test]
    fn test_fraction_round_trip() {
        for index in MIN_INDEX..=MAX_INDEX {
            let (num, den) = index_to_fraction(index);
            assert_eq!(fraction_to_index(num, den), index);
        }
        assert_eq!(index_to_fraction(6), (16, 32));
        assert_eq!(fraction_to_index(2, 1), 14);
        assert_eq!(fraction_to_index(1, 0), BASE_INDEX);
    }

    #[test]
    fn test_disabled_pointer_reports_unavailable() {
        let mut pointer = DisabledPointer::new("no display");
        assert_eq!(pointer.default_index(), BASE_INDEX);
        assert!(matches!(
            pointer.reset(),
            Err(HardwareError::DriverUnavailable(_))
        ));
        assert!(matches!(
            pointer.optimize(800, 1600),
            Err(HardwareError::DriverUnavailable(_))
        ));
    }
}
