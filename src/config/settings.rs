//! Persisted user settings
//!
//! JSON document holding the tracked game list and the per-mode hardware
//! levels. Every field is read independently: a missing or malformed value
//! falls back to its typed default without discarding the rest of the file.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::constants::{engine, mouse, vibrance};
use crate::hardware::mouse::PollingRate;

/// Settings shared between the configuration store and the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Tracked executable names (lowercase, unique, ordered)
    pub games: Vec<String>,

    /// Vibrance level (0-100) outside games
    pub desktop_vibrance: u8,

    /// Vibrance level (0-100) while a game runs
    pub game_vibrance: u8,

    /// Write vibrance to the primary display only
    pub single_monitor: bool,

    /// Rescale OS pointer speed in game mode so cursor travel matches desktop DPI
    pub normalize_pointer: bool,

    pub poll_interval_ms: u64,

    pub mouse: MouseSettings,
}

/// Device identity, DPI/polling profiles and pacing for the mouse backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MouseSettings {
    pub vendor_id: u16,
    pub product_id: u16,
    pub interface: u8,
    pub desktop_dpi: u32,
    pub game_dpi: u32,
    pub desktop_polling_hz: u32,
    pub game_polling_hz: u32,
    pub inter_packet_delay_ms: u64,
    pub settle_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            games: Vec::new(),
            desktop_vibrance: vibrance::DESKTOP_LEVEL,
            game_vibrance: vibrance::GAME_LEVEL,
            single_monitor: true,
            normalize_pointer: false,
            poll_interval_ms: engine::POLL_INTERVAL_MS,
            mouse: MouseSettings::default(),
        }
    }
}

impl Default for MouseSettings {
    fn default() -> Self {
        Self {
            vendor_id: mouse::VENDOR_ID,
            product_id: mouse::PRODUCT_ID,
            interface: mouse::INTERFACE,
            desktop_dpi: mouse::DESKTOP_DPI,
            game_dpi: mouse::GAME_DPI,
            desktop_polling_hz: mouse::DESKTOP_POLLING_HZ,
            game_polling_hz: mouse::GAME_POLLING_HZ,
            inter_packet_delay_ms: mouse::INTER_PACKET_DELAY_MS,
            settle_delay_ms: mouse::SETTLE_DELAY_MS,
        }
    }
}

/// Trim and lowercase an executable name; empty input yields None
pub fn normalize_game_name(name: &str) -> Option<String> {
    let name = name.trim().to_lowercase();
    (!name.is_empty()).then_some(name)
}

/// Normalise every entry and drop duplicates, keeping first occurrence order
pub fn normalize_games<I, S>(games: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for game in games {
        if let Some(name) = normalize_game_name(game.as_ref()) {
            if !out.contains(&name) {
                out.push(name);
            }
        }
    }
    out
}

/// Read one key, substituting the default when absent or of the wrong type
fn field<T: DeserializeOwned>(obj: &Map<String, Value>, keys: &[&str], default: T) -> T {
    let Some((key, value)) = keys
        .iter()
        .find_map(|key| obj.get(*key).map(|value| (*key, value)))
    else {
        return default;
    };

    match serde_json::from_value(value.clone()) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(key = key, value = %value, error = %e, "Invalid config value, using default");
            default
        }
    }
}

impl MouseSettings {
    fn from_value(value: Option<&Value>) -> Self {
        let defaults = Self::default();
        let Some(obj) = value.and_then(Value::as_object) else {
            if value.is_some() {
                warn!("Config key 'mouse' is not an object, using defaults");
            }
            return defaults;
        };

        Self {
            vendor_id: field(obj, &["vendor_id"], defaults.vendor_id),
            product_id: field(obj, &["product_id"], defaults.product_id),
            interface: field(obj, &["interface"], defaults.interface),
            desktop_dpi: field(obj, &["desktop_dpi"], defaults.desktop_dpi),
            game_dpi: field(obj, &["game_dpi"], defaults.game_dpi),
            desktop_polling_hz: field(obj, &["desktop_polling_hz"], defaults.desktop_polling_hz),
            game_polling_hz: field(obj, &["game_polling_hz"], defaults.game_polling_hz),
            inter_packet_delay_ms: field(
                obj,
                &["inter_packet_delay_ms"],
                defaults.inter_packet_delay_ms,
            ),
            settle_delay_ms: field(obj, &["settle_delay_ms"], defaults.settle_delay_ms),
        }
    }
}

impl Settings {
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(crate::constants::config::APP_DIR);
        path.push(crate::constants::config::FILENAME);
        path
    }

    /// Build settings from a parsed JSON document, field by field
    pub fn from_value(value: &Value) -> Self {
        let defaults = Self::default();
        let Some(obj) = value.as_object() else {
            warn!("Config root is not an object, using defaults");
            return defaults;
        };

        let games: Vec<String> = field(obj, &["games"], Vec::new());

        let mut settings = Self {
            games: normalize_games(games),
            desktop_vibrance: field(obj, &["desktop_vibrance"], defaults.desktop_vibrance),
            game_vibrance: field(obj, &["game_vibrance"], defaults.game_vibrance),
            single_monitor: field(obj, &["single_monitor"], defaults.single_monitor),
            normalize_pointer: field(
                obj,
                &["normalize_pointer", "murqin_mode"],
                defaults.normalize_pointer,
            ),
            poll_interval_ms: field(obj, &["poll_interval_ms"], defaults.poll_interval_ms),
            mouse: MouseSettings::from_value(obj.get("mouse")),
        };
        settings.validate_and_clamp();
        settings
    }

    /// Validate and clamp values to safe ranges
    fn validate_and_clamp(&mut self) {
        for (key, level) in [
            ("desktop_vibrance", &mut self.desktop_vibrance),
            ("game_vibrance", &mut self.game_vibrance),
        ] {
            if *level > 100 {
                warn!(key = key, level = *level, "vibrance exceeds 100, clamping");
                *level = 100;
            }
        }

        let interval = self
            .poll_interval_ms
            .clamp(engine::MIN_POLL_INTERVAL_MS, engine::MAX_POLL_INTERVAL_MS);
        if interval != self.poll_interval_ms {
            warn!(poll_interval_ms = self.poll_interval_ms, using = interval, "poll_interval_ms out of range, clamping");
            self.poll_interval_ms = interval;
        }

        let defaults = MouseSettings::default();
        let m = &mut self.mouse;
        for (key, dpi) in [("desktop_dpi", &mut m.desktop_dpi), ("game_dpi", &mut m.game_dpi)] {
            let clamped = (*dpi).clamp(mouse::MIN_DPI, mouse::MAX_DPI);
            if clamped != *dpi {
                warn!(key = key, dpi = *dpi, using = clamped, "DPI out of sensor range, clamping");
                *dpi = clamped;
            }
        }
        for (key, hz, fallback) in [
            ("desktop_polling_hz", &mut m.desktop_polling_hz, defaults.desktop_polling_hz),
            ("game_polling_hz", &mut m.game_polling_hz, defaults.game_polling_hz),
        ] {
            if PollingRate::from_hz(*hz).is_none() {
                warn!(key = key, hz = *hz, using = fallback, "Unsupported polling rate, using default");
                *hz = fallback;
            }
        }
    }

    /// Load settings from `path`.
    ///
    /// A missing file yields defaults. Unreadable files and JSON syntax errors
    /// are returned so callers never overwrite a file the user must fix.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let value: Value = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse JSON from {}", path.display()))?;

        let settings = Self::from_value(&value);
        info!(path = %path.display(), games = settings.games.len(), "Loaded config");
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(self)
            .context("Failed to serialize config to JSON")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file to {}", path.display()))?;
        Ok(())
    }

    /// Add a tracked executable. Returns false if it was empty or already present.
    pub fn add_game(&mut self, name: &str) -> bool {
        match normalize_game_name(name) {
            Some(name) if !self.games.contains(&name) => {
                self.games.push(name);
                true
            }
            _ => false,
        }
    }

    /// Remove a tracked executable. Returns false if it was not tracked.
    pub fn remove_game(&mut self, name: &str) -> bool {
        let Some(name) = normalize_game_name(name) else {
            return false;
        };
        let before = self.games.len();
        self.games.retain(|g| *g != name);
        self.games.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_games_dedupes_case_insensitively() {
        let games = normalize_games(["Game.EXE", " game.exe ", "other.exe", "", "OTHER.exe"]);
        assert_eq!(games, vec!["game.exe".to_string(), "other.exe".to_string()]);
    }

    #[test]
    fn test_from_value_missing_fields_use_defaults() {
        let settings = Settings::from_value(&json!({ "games": ["cs2"] }));
        assert_eq!(settings.games, vec!["cs2".to_string()]);
        assert_eq!(settings.desktop_vibrance, 50);
        assert_eq!(settings.game_vibrance, 100);
        assert!(settings.single_monitor);
        assert!(!settings.normalize_pointer);
        assert_eq!(settings.mouse, MouseSettings::default());
    }

    #[test]
    fn test_from_value_malformed_field_falls_back_alone() {
        let settings = Settings::from_value(&json!({
            "games": ["a.exe"],
            "desktop_vibrance": "loud",
            "game_vibrance": 80,
        }));
        assert_eq!(settings.desktop_vibrance, 50);
        assert_eq!(settings.game_vibrance, 80);
        assert_eq!(settings.games, vec!["a.exe".to_string()]);
    }

    #[test]
    fn test_from_value_accepts_legacy_murqin_key() {
        let settings = Settings::from_value(&json!({ "murqin_mode": true }));
        assert!(settings.normalize_pointer);
    }

    #[test]
    fn test_from_value_non_object_root() {
        assert_eq!(Settings::from_value(&json!([1, 2, 3])), Settings::default());
    }

    #[test]
    fn test_validate_and_clamp() {
        let settings = Settings::from_value(&json!({
            "game_vibrance": 250,
            "poll_interval_ms": 5,
            "mouse": { "game_dpi": 100000, "game_polling_hz": 3000 },
        }));
        assert_eq!(settings.game_vibrance, 100);
        assert_eq!(settings.poll_interval_ms, engine::MIN_POLL_INTERVAL_MS);
        assert_eq!(settings.mouse.game_dpi, mouse::MAX_DPI);
        assert_eq!(settings.mouse.game_polling_hz, mouse::GAME_POLLING_HZ);
    }

    #[test]
    fn test_add_and_remove_game() {
        let mut settings = Settings::default();
        assert!(settings.add_game("Game.exe"));
        assert!(!settings.add_game("GAME.EXE"));
        assert!(!settings.add_game("   "));
        assert_eq!(settings.games, vec!["game.exe".to_string()]);

        assert!(!settings.remove_game("missing.exe"));
        assert!(settings.remove_game(" Game.Exe"));
        assert!(settings.games.is_empty());
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_syntax_error_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Settings::load_from(&path).is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut settings = Settings::default();
        settings.add_game("valorant.exe");
        settings.game_vibrance = 75;
        settings.mouse.game_polling_hz = 4000;
        settings.save_to(&path).unwrap();

        assert_eq!(Settings::load_from(&path).unwrap(), settings);
    }
}
