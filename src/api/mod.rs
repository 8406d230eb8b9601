//! Presentation-layer boundary.
//!
//! [`ModController`] exposes every operation the UI calls: settings, scans,
//! toggles, watches, event subscriptions and preview URLs. It holds no UI
//! framework types, so any front end (webview bridge, CLI, tests) can drive it.

pub mod controller;

pub use controller::ModController;
