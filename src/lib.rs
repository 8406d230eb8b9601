// ModShelf - engine behind a local character mod library
//
// This is the library crate: path confinement, directory scans, enable/disable
// renames, debounced directory watches, the event bus and the preview server.
// The binary crate (main.rs) is a headless host around `api::ModController`.

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod preview;
pub mod services;
pub mod state;
pub mod watch;

// Re-export commonly used types for convenience
pub use api::ModController;
pub use config::ConfigManager;
pub use error::{EngineError, EngineResult};
pub use events::{EngineEvent, EventBus};
pub use models::{CharacterFolder, EngineConfig, ModEntry, Settings};
pub use services::PathGuard;
pub use state::SettingsState;
pub use watch::{SessionKey, WatchManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
