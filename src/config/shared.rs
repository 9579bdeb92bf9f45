//! Live settings shared between the presentation side and the engine thread

use std::sync::{Arc, RwLock};

use super::Settings;

/// Writers replace the whole document; the engine clones one snapshot per tick
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<Settings>>,
}

impl SharedSettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Consistent copy of the current settings.
    /// A writer that panicked mid-update cannot leave a torn value behind
    /// because writers only ever assign a complete `Settings`.
    pub fn snapshot(&self) -> Settings {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn replace(&self, settings: Settings) {
        *self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = settings;
    }

    pub fn update(&self, f: impl FnOnce(&mut Settings)) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard);
    }
}
