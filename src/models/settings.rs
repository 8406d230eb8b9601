use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// User settings persisted in `ModShelf Settings.yaml`
///
/// Only the mod root and UI preferences are persisted; everything about the
/// library itself is rebuilt from directory scans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub mod_root_path: String,

    #[serde(default)]
    pub theme: String,

    #[serde(default)]
    pub language: String,

    #[serde(default)]
    pub show_folder_icon: bool,
}

impl Settings {
    /// The configured mod root, or `None` when unset
    pub fn mod_root(&self) -> Option<Utf8PathBuf> {
        let trimmed = self.mod_root_path.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Utf8PathBuf::from(trimmed))
        }
    }
}

/// Engine tuning, layered from `ModShelf Engine.yaml` and `MODSHELF_*` variables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Quiet window before a burst of raw events becomes one notification
    pub debounce_ms: u64,

    pub preview_host: String,

    pub preview_port: u16,

    /// Files larger than this are refused by the preview server
    pub preview_max_bytes: u64,

    /// Broadcast buffer per subscriber before it starts lagging
    pub event_capacity: usize,

    pub debug_logging: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 200,
            preview_host: "127.0.0.1".to_string(),
            preview_port: 24312,
            preview_max_bytes: 32 * 1024 * 1024,
            event_capacity: 256,
            debug_logging: false,
        }
    }
}

impl EngineConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn preview_addr(&self) -> String {
        format!("{}:{}", self.preview_host, self.preview_port)
    }
}
