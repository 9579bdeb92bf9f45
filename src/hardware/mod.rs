//! Hardware capability contracts
//!
//! One narrow trait per hardware surface. The coordinator and engine only
//! ever see these traits; concrete backends are picked once at startup.

pub mod gpu;
#[cfg(test)]
pub mod mock;
pub mod mouse;
pub mod pointer;

use crate::error::HardwareResult;

pub use gpu::NvidiaVibrance;
pub use mouse::HidrawMouse;
pub use pointer::{DisabledPointer, X11PointerSpeed};

/// Pointer device with on-board DPI and polling-rate profiles
pub trait MouseBackend: Send {
    /// Discover and open the device. Returns true when a handle is held.
    fn connect(&mut self) -> bool;

    fn is_connected(&self) -> bool;

    /// Send the game DPI/polling-rate sequence
    fn set_game_mode(&mut self) -> HardwareResult<()>;

    /// Send the desktop DPI/polling-rate sequence
    fn set_desktop_mode(&mut self) -> HardwareResult<()>;
}

/// GPU colour vibrance control
pub trait GpuBackend: Send {
    /// Authoritative availability flag, checked before every vibrance call
    fn available(&self) -> bool;

    /// Set vibrance from a 0-100 level on the primary or all displays
    fn set_vibrance(&mut self, level: u8, primary_only: bool) -> HardwareResult<()>;
}

/// OS pointer-speed scaling
pub trait PointerSpeedBackend: Send {
    /// Index captured when the backend was constructed
    fn default_index(&self) -> u8;

    /// Apply a speed index (1-20), clamped to the table bounds
    fn set_speed(&mut self, index: u8) -> HardwareResult<()>;

    /// Apply the index whose multiplier best matches `base / target`
    fn optimize(&mut self, base: u32, target: u32) -> HardwareResult<u8> {
        let index = pointer::optimal_index(base, target);
        self.set_speed(index)?;
        Ok(index)
    }

    /// Restore the captured default
    fn reset(&mut self) -> HardwareResult<()> {
        let index = self.default_index();
        self.set_speed(index)
    }
}

/// The three backends the coordinator fans out to
pub struct Backends {
    pub mouse: Box<dyn MouseBackend>,
    pub gpu: Box<dyn GpuBackend>,
    pub pointer: Box<dyn PointerSpeedBackend>,
}

/// Passive availability report for the presentation side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareStatus {
    pub mouse_connected: bool,
    pub gpu_available: bool,
    pub pointer_default: u8,
}

impl Backends {
    pub fn status(&self) -> HardwareStatus {
        HardwareStatus {
            mouse_connected: self.mouse.is_connected(),
            gpu_available: self.gpu.available(),
            pointer_default: self.pointer.default_index(),
        }
    }
}
