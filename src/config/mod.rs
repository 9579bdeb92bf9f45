//! Configuration management for modeswitch
//!
//! - **settings**: the persisted JSON document (game list, per-mode levels)
//! - **shared**: the live copy the daemon mutates and the engine snapshots

pub mod settings;
pub mod shared;

// Re-export commonly used types
pub use settings::{MouseSettings, Settings};
pub use shared::SharedSettings;
