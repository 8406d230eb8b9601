// Settings state
//
// The in-memory copy of the user settings, shared between the controller
// (which writes it through `ConfigManager`) and the preview server (which
// reads the current mod root on every request).

use crate::models::Settings;
use camino::Utf8PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

/// Thread-safe handle to the current [`Settings`]
///
/// Cloning the handle shares the same underlying settings. The mod root is
/// passed around explicitly through this handle rather than living in a global.
#[derive(Debug, Clone, Default)]
pub struct SettingsState {
    settings: Arc<RwLock<Settings>>,
}

impl SettingsState {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Arc::new(RwLock::new(settings)),
        }
    }

    /// Get a copy of the current settings
    pub fn snapshot(&self) -> Settings {
        self.read(Settings::clone)
    }

    /// Execute a function with read access to the settings
    ///
    /// # Example
    /// ```ignore
    /// let theme = state.read(|s| s.theme.clone());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Settings) -> R,
    {
        let settings = self.settings.read().unwrap_or_else(PoisonError::into_inner);
        f(&settings)
    }

    /// Replace the settings wholesale, typically with what was just persisted
    pub fn replace(&self, settings: Settings) {
        let mut current = self.settings.write().unwrap_or_else(PoisonError::into_inner);
        *current = settings;
    }

    /// The configured mod root, or `None` when unset
    pub fn mod_root(&self) -> Option<Utf8PathBuf> {
        self.read(Settings::mod_root)
    }
}
