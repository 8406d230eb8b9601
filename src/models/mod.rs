//! Data models for the ModShelf engine.
//!
//! - [`Settings`]: User settings persisted in `ModShelf Settings.yaml` (mod root, theme, ...)
//! - [`EngineConfig`]: Engine tuning (debounce window, preview server address, limits)
//! - [`CharacterFolder`] and [`ModEntry`]: Scan results, computed on demand and never cached
//!
//! # Architecture Note
//!
//! Scan results are plain values: the UI re-scans whenever the watch manager
//! reports a change instead of patching a cached copy.

pub mod library;
pub mod settings;

pub use library::{CharacterFolder, ModEntry};
pub use settings::{EngineConfig, Settings};
