//! Recording backends for engine and coordinator tests

use std::sync::{Arc, Mutex};

use super::{Backends, GpuBackend, MouseBackend, PointerSpeedBackend};
use crate::error::{HardwareError, HardwareResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    MouseGame,
    MouseDesktop,
    Vibrance { level: u8, primary_only: bool },
    PointerSpeed(u8),
}

/// Shared, ordered record of every hardware call
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// Failure switches flipped from tests
#[derive(Debug, Clone, Default)]
pub struct Faults(Arc<Mutex<FaultState>>);

#[derive(Debug, Default)]
pub struct FaultState {
    pub mouse_missing: bool,
    pub mouse_io: bool,
    pub gpu_io: bool,
    pub pointer_io: bool,
    pub panic_on_mouse: bool,
}

impl Faults {
    pub fn set(&self, f: impl FnOnce(&mut FaultState)) {
        f(&mut self.0.lock().unwrap());
    }

    fn get<T>(&self, f: impl FnOnce(&FaultState) -> T) -> T {
        f(&self.0.lock().unwrap())
    }
}

fn io_fault(surface: &'static str) -> HardwareError {
    HardwareError::io(surface, std::io::Error::other("injected fault"))
}

pub struct MockMouse {
    log: CallLog,
    faults: Faults,
}

impl MouseBackend for MockMouse {
    fn connect(&mut self) -> bool {
        !self.faults.get(|f| f.mouse_missing)
    }

    fn is_connected(&self) -> bool {
        !self.faults.get(|f| f.mouse_missing)
    }

    fn set_game_mode(&mut self) -> HardwareResult<()> {
        self.switch(Call::MouseGame)
    }

    fn set_desktop_mode(&mut self) -> HardwareResult<()> {
        self.switch(Call::MouseDesktop)
    }
}

impl MockMouse {
    fn switch(&mut self, call: Call) -> HardwareResult<()> {
        if self.faults.get(|f| f.panic_on_mouse) {
            panic!("injected mouse panic");
        }
        if self.faults.get(|f| f.mouse_missing) {
            return Err(HardwareError::DeviceUnavailable("mock".into()));
        }
        self.log.push(call);
        if self.faults.get(|f| f.mouse_io) {
            return Err(io_fault("mouse"));
        }
        Ok(())
    }
}

pub struct MockGpu {
    log: CallLog,
    faults: Faults,
    available: bool,
}

impl GpuBackend for MockGpu {
    fn available(&self) -> bool {
        self.available
    }

    fn set_vibrance(&mut self, level: u8, primary_only: bool) -> HardwareResult<()> {
        if !self.available {
            return Ok(());
        }
        self.log.push(Call::Vibrance {
            level,
            primary_only,
        });
        if self.faults.get(|f| f.gpu_io) {
            return Err(io_fault("gpu"));
        }
        Ok(())
    }
}

pub struct MockPointer {
    log: CallLog,
    faults: Faults,
    default_index: u8,
}

impl PointerSpeedBackend for MockPointer {
    fn default_index(&self) -> u8 {
        self.default_index
    }

    fn set_speed(&mut self, index: u8) -> HardwareResult<()> {
        self.log.push(Call::PointerSpeed(index));
        if self.faults.get(|f| f.pointer_io) {
            return Err(io_fault("pointer"));
        }
        Ok(())
    }
}

/// Mock backends plus handles to inspect and perturb them
pub struct MockRig {
    pub log: CallLog,
    pub faults: Faults,
}

/// Pointer default captured by every mock rig
pub const MOCK_POINTER_DEFAULT: u8 = 10;

impl MockRig {
    pub fn new(gpu_available: bool) -> (Self, Backends) {
        let log = CallLog::default();
        let faults = Faults::default();
        let backends = Backends {
            mouse: Box::new(MockMouse {
                log: log.clone(),
                faults: faults.clone(),
            }),
            gpu: Box::new(MockGpu {
                log: log.clone(),
                faults: faults.clone(),
                available: gpu_available,
            }),
            pointer: Box::new(MockPointer {
                log: log.clone(),
                faults: faults.clone(),
                default_index: MOCK_POINTER_DEFAULT,
            }),
        };
        (Self { log, faults }, backends)
    }
}
