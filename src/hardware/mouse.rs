//! HID backend for VXE R1 Pro / VGN Dragonfly F1 series mice
//!
//! The receiver exposes a vendor configuration collection on one of its USB
//! interfaces. Profile switches are plain register writes with no
//! acknowledgement, so the only thing keeping them reliable is pacing: the
//! firmware drops packets that arrive less than ~20 ms apart and ignores a
//! polling-rate change issued before the DPI write has settled. Under heavy
//! scheduling pressure these delays can still be too short; they are
//! configurable for that reason.

use nix::fcntl::OFlag;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::MouseBackend;
use crate::config::MouseSettings;
use crate::constants::{mouse, paths};
use crate::error::{HardwareError, HardwareResult};

const SURFACE: &str = "mouse";

/// One vendor report
pub type Packet = [u8; mouse::REPORT_LEN];

/// Polling rates the receiver firmware accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollingRate {
    Hz125,
    Hz250,
    Hz500,
    Hz1000,
    Hz2000,
    Hz4000,
    Hz8000,
}

impl PollingRate {
    pub fn from_hz(hz: u32) -> Option<Self> {
        Some(match hz {
            125 => Self::Hz125,
            250 => Self::Hz250,
            500 => Self::Hz500,
            1000 => Self::Hz1000,
            2000 => Self::Hz2000,
            4000 => Self::Hz4000,
            8000 => Self::Hz8000,
            _ => return None,
        })
    }

    /// Register value for this rate
    fn code(self) -> u8 {
        match self {
            Self::Hz125 => 0x08,
            Self::Hz250 => 0x04,
            Self::Hz500 => 0x02,
            Self::Hz1000 => 0x01,
            Self::Hz2000 => 0x10,
            Self::Hz4000 => 0x20,
            Self::Hz8000 => 0x40,
        }
    }
}

/// Build a register-write report: id, opcode, reg, len, data, checksum
pub fn register_write(register: u8, data: &[u8]) -> Packet {
    let mut packet = [0u8; mouse::REPORT_LEN];
    packet[0] = mouse::REPORT_ID;
    packet[1] = mouse::CMD_WRITE;
    packet[4] = register;
    packet[5] = data.len() as u8;
    let end = 6 + data.len();
    packet[6..end].copy_from_slice(data);
    let sum = packet[..end].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    packet[end] = mouse::CHECKSUM_SEED.wrapping_sub(sum);
    packet
}

/// Stage-1 DPI write followed by selecting stage 1
pub fn dpi_sequence(dpi: u32) -> Vec<Packet> {
    let dpi = dpi.clamp(mouse::MIN_DPI, mouse::MAX_DPI);
    let value = (dpi / mouse::DPI_STEP).saturating_sub(1);
    let lo = (value & 0xFF) as u8;
    let hi = ((value >> 8) & 0x03) as u8;
    vec![
        register_write(mouse::REG_STAGE1_DPI, &[lo, lo, hi | (hi << 2)]),
        register_write(mouse::REG_ACTIVE_STAGE, &[0x00]),
    ]
}

pub fn polling_rate_command(rate: PollingRate) -> Packet {
    register_write(mouse::REG_POLLING_RATE, &[rate.code()])
}

/// Packets making up one on-board profile switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MouseProfile {
    pub dpi_sequence: Vec<Packet>,
    pub polling_command: Packet,
}

impl MouseProfile {
    pub fn new(dpi: u32, polling_hz: u32) -> Self {
        let rate = PollingRate::from_hz(polling_hz).unwrap_or(PollingRate::Hz1000);
        Self {
            dpi_sequence: dpi_sequence(dpi),
            polling_command: polling_rate_command(rate),
        }
    }
}

/// Delays between packets of a profile switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub inter_packet: Duration,
    pub settle: Duration,
}

impl Pacing {
    pub fn from_settings(settings: &MouseSettings) -> Self {
        Self {
            inter_packet: Duration::from_millis(settings.inter_packet_delay_ms),
            settle: Duration::from_millis(settings.settle_delay_ms),
        }
    }
}

/// Write a profile: each DPI packet followed by the inter-packet delay,
/// then the settle delay, then the polling-rate command
pub fn send_profile<W: Write>(
    device: &mut W,
    profile: &MouseProfile,
    pacing: Pacing,
    sleep: &mut dyn FnMut(Duration),
) -> io::Result<()> {
    for packet in &profile.dpi_sequence {
        device.write_all(packet)?;
        sleep(pacing.inter_packet);
    }
    sleep(pacing.settle);
    device.write_all(&profile.polling_command)?;
    device.flush()
}

/// Fields of a hidraw node's uevent file that identify the device
#[derive(Debug, Default, PartialEq, Eq)]
struct HidIdentity {
    vendor: u16,
    product: u16,
    interface: Option<u8>,
}

/// Parse `HID_ID=0003:0000373B:00001040` and `HID_PHYS=usb-...-2/input1`
fn parse_uevent(contents: &str) -> Option<HidIdentity> {
    let mut identity = None;
    let mut interface = None;

    for line in contents.lines() {
        if let Some(id) = line.strip_prefix("HID_ID=") {
            let mut parts = id.split(':').skip(1);
            let vendor = u32::from_str_radix(parts.next()?, 16).ok()?;
            let product = u32::from_str_radix(parts.next()?, 16).ok()?;
            identity = Some((vendor as u16, product as u16));
        } else if let Some(phys) = line.strip_prefix("HID_PHYS=") {
            interface = phys
                .rsplit_once("/input")
                .and_then(|(_, n)| n.parse::<u8>().ok());
        }
    }

    identity.map(|(vendor, product)| HidIdentity {
        vendor,
        product,
        interface,
    })
}

/// Locate the hidraw node for the configured vendor/product/interface
pub fn find_hidraw_node(sys_root: &Path, settings: &MouseSettings) -> io::Result<Option<String>> {
    let mut names: Vec<String> = fs::read_dir(sys_root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    for name in names {
        let uevent = sys_root.join(&name).join(paths::HIDRAW_UEVENT);
        let Ok(contents) = fs::read_to_string(&uevent) else {
            continue;
        };
        let Some(identity) = parse_uevent(&contents) else {
            continue;
        };
        debug!(node = %name, vendor = %format!("{:04x}", identity.vendor), product = %format!("{:04x}", identity.product), interface = ?identity.interface, "hidraw node");

        if identity.vendor == settings.vendor_id
            && identity.product == settings.product_id
            && identity.interface == Some(settings.interface)
        {
            return Ok(Some(name));
        }
    }
    Ok(None)
}

/// Mouse backend writing vendor reports to a hidraw node
pub struct HidrawMouse {
    settings: MouseSettings,
    sys_root: PathBuf,
    dev_root: PathBuf,
    device: Option<File>,
    /// Set once the absence has been logged, cleared on reconnect
    reported_missing: bool,
    sleep: fn(Duration),
}

impl HidrawMouse {
    pub fn new(settings: MouseSettings) -> Self {
        Self::with_roots(settings, paths::SYS_CLASS_HIDRAW, paths::DEV)
    }

    pub fn with_roots(
        settings: MouseSettings,
        sys_root: impl Into<PathBuf>,
        dev_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            settings,
            sys_root: sys_root.into(),
            dev_root: dev_root.into(),
            device: None,
            reported_missing: false,
            sleep: std::thread::sleep,
        }
    }

    #[cfg(test)]
    fn without_delays(mut self) -> Self {
        self.sleep = |_| {};
        self
    }

    fn open_node(&self, name: &str) -> io::Result<File> {
        OpenOptions::new()
            .write(true)
            .custom_flags(OFlag::O_NONBLOCK.bits())
            .open(self.dev_root.join(name))
    }

    fn ensure_connected(&mut self) -> HardwareResult<()> {
        if self.device.is_some() || self.connect() {
            return Ok(());
        }
        if !self.reported_missing {
            warn!(
                vendor = %format!("{:04x}", self.settings.vendor_id),
                product = %format!("{:04x}", self.settings.product_id),
                "Mouse not connected, profile switches disabled until it reappears"
            );
            self.reported_missing = true;
        }
        Err(HardwareError::DeviceUnavailable(format!(
            "{:04x}:{:04x}",
            self.settings.vendor_id, self.settings.product_id
        )))
    }

    fn send(&mut self, profile: MouseProfile) -> HardwareResult<()> {
        self.ensure_connected()?;
        let pacing = Pacing::from_settings(&self.settings);
        let sleep = self.sleep;
        let Some(device) = self.device.as_mut() else {
            return Err(HardwareError::DeviceUnavailable("handle lost".into()));
        };

        if let Err(e) = send_profile(device, &profile, pacing, &mut |d| sleep(d)) {
            error!(error = %e, "Mouse write failed, dropping handle");
            self.device = None;
            return Err(HardwareError::io(SURFACE, e));
        }
        Ok(())
    }
}

impl MouseBackend for HidrawMouse {
    fn connect(&mut self) -> bool {
        let node = match find_hidraw_node(&self.sys_root, &self.settings) {
            Ok(Some(node)) => node,
            Ok(None) => return false,
            Err(e) => {
                error!(path = %self.sys_root.display(), error = %e, "Cannot enumerate hidraw devices");
                return false;
            }
        };

        match self.open_node(&node) {
            Ok(file) => {
                info!(node = %node, "Mouse connected");
                self.device = Some(file);
                self.reported_missing = false;
                true
            }
            Err(e) => {
                error!(node = %node, error = %e, "Failed to open mouse - is the udev rule installed?");
                false
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.device.is_some()
    }

    fn set_game_mode(&mut self) -> HardwareResult<()> {
        let profile = MouseProfile::new(self.settings.game_dpi, self.settings.game_polling_hz);
        self.send(profile)?;
        info!(dpi = self.settings.game_dpi, hz = self.settings.game_polling_hz, "Mouse game profile applied");
        Ok(())
    }

    fn set_desktop_mode(&mut self) -> HardwareResult<()> {
        let profile = MouseProfile::new(self.settings.desktop_dpi, self.settings.desktop_polling_hz);
        self.send(profile)?;
        info!(dpi = self.settings.desktop_dpi, hz = self.settings.desktop_polling_hz, "Mouse desktop profile applied");
        Ok(())
    }
}
