//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Configuration file location
pub mod config {
    /// Directory under the XDG config dir
    pub const APP_DIR: &str = "modeswitch";

    /// Config file name
    pub const FILENAME: &str = "config.json";
}

/// Filesystem paths used for device discovery
pub mod paths {
    /// sysfs class directory listing every hidraw node
    pub const SYS_CLASS_HIDRAW: &str = "/sys/class/hidraw";

    /// Directory holding the hidraw character devices
    pub const DEV: &str = "/dev";

    /// uevent file relative to a hidraw class entry
    pub const HIDRAW_UEVENT: &str = "device/uevent";
}

/// Automation engine timing
pub mod engine {
    /// Default process poll interval
    pub const POLL_INTERVAL_MS: u64 = 1000;

    /// Lower bound accepted from config
    pub const MIN_POLL_INTERVAL_MS: u64 = 100;

    /// Upper bound accepted from config
    pub const MAX_POLL_INTERVAL_MS: u64 = 60_000;

    /// Capacity of the engine → presentation status channel
    pub const STATUS_CHANNEL_CAPACITY: usize = 32;

    /// How often the presentation side drains status updates
    pub const STATUS_DRAIN_INTERVAL_MS: u64 = 100;

    /// Name of the automation thread
    pub const THREAD_NAME: &str = "automation";
}

/// VXE R1 Pro / VGN Dragonfly F1 receiver
pub mod mouse {
    /// USB vendor id of the receiver
    pub const VENDOR_ID: u16 = 0x373B;

    /// USB product id of the receiver
    pub const PRODUCT_ID: u16 = 0x1040;

    /// USB interface carrying the vendor configuration collection
    pub const INTERFACE: u8 = 1;

    /// Delay between two packets of a sequence.
    /// The receiver silently drops commands that arrive faster than this.
    pub const INTER_PACKET_DELAY_MS: u64 = 20;

    /// Delay after the DPI sequence before the polling-rate switch
    pub const SETTLE_DELAY_MS: u64 = 250;

    /// Vendor report id of the configuration collection
    pub const REPORT_ID: u8 = 0x08;

    /// Fixed report length including report id and checksum
    pub const REPORT_LEN: usize = 17;

    /// Register write opcode
    pub const CMD_WRITE: u8 = 0x07;

    /// Checksum seed: checksum = SEED - sum(bytes before it)
    pub const CHECKSUM_SEED: u8 = 0x55;

    /// Register holding the polling-rate code
    pub const REG_POLLING_RATE: u8 = 0x00;

    /// Register selecting the active DPI stage
    pub const REG_ACTIVE_STAGE: u8 = 0x04;

    /// Register holding the DPI value of stage 1
    pub const REG_STAGE1_DPI: u8 = 0x0C;

    /// DPI register granularity
    pub const DPI_STEP: u32 = 50;

    /// Lowest DPI the sensor accepts
    pub const MIN_DPI: u32 = 50;

    /// Highest DPI the sensor accepts
    pub const MAX_DPI: u32 = 26_000;

    /// Desktop profile defaults
    pub const DESKTOP_DPI: u32 = 800;
    pub const DESKTOP_POLLING_HZ: u32 = 1000;

    /// Game profile defaults
    pub const GAME_DPI: u32 = 1600;
    pub const GAME_POLLING_HZ: u32 = 2000;
}

/// Digital vibrance mapping
pub mod vibrance {
    /// UI-domain level that maps to hardware 0
    pub const NEUTRAL_LEVEL: i32 = 50;

    /// UI → hardware scale factor
    pub const SCALE: f64 = 1.26;

    /// Hardware DVC bound (symmetric)
    pub const DVC_LIMIT: i32 = 63;

    /// Default desktop level
    pub const DESKTOP_LEVEL: u8 = 50;

    /// Default in-game level
    pub const GAME_LEVEL: u8 = 100;
}

/// NVIDIA control surface
pub mod nvidia {
    /// CLI shipped with the proprietary driver
    pub const SETTINGS_BIN: &str = "nvidia-settings";

    /// Maximum number of display handles enumerated
    pub const MAX_DISPLAY_HANDLES: usize = 10;

    /// Driver attribute for digital vibrance
    pub const VIBRANCE_ATTRIBUTE: &str = "DigitalVibrance";

    /// Driver attribute range
    pub const ATTRIBUTE_MIN: i32 = -1024;
    pub const ATTRIBUTE_MAX: i32 = 1023;
}

/// OS pointer speed table
pub mod pointer {
    /// Sensitivity multiplier per speed index 1..=20
    pub const MULTIPLIERS: [f64; 20] = [
        0.03125, 0.0625, 0.125, 0.25, 0.375, 0.5, 0.625, 0.75, 0.875, 1.0, 1.25, 1.5, 1.75, 2.0,
        2.25, 2.5, 2.75, 3.0, 3.25, 3.5,
    ];

    pub const MIN_INDEX: u8 = 1;
    pub const MAX_INDEX: u8 = 20;

    /// Index whose multiplier is 1.0
    pub const BASE_INDEX: u8 = 10;

    /// Denominator used for X11 acceleration fractions
    pub const FRACTION_DENOMINATOR: u16 = 32;
}
