//! Services module - filesystem logic behind the mod library.
//!
//! Everything here is synchronous and framework-agnostic: no event bus, no
//! HTTP, no settings. The controller wires these together.
//!
//! # Components
//!
//! - [`PathGuard`]: Confines externally supplied paths to the mod root
//!   (lexical normalization, symlink resolution, dangling-link rejection)
//! - [`scanner`]: Lists character folders and mods, picks preview images
//! - [`naming`]: The `disabled` prefix rule deciding whether a mod is enabled
//! - [`toggle`]: Enables/disables mods by renaming and deletes them
//! - [`shell`]: Opens folders in the host file manager and shows the folder picker
//!
//! # Usage Example
//!
//! ```ignore
//! use modshelf::services::{PathGuard, scanner, toggle};
//!
//! let guard = PathGuard::new("/mods")?;
//! let alice = guard.resolve("Alice")?;
//! for entry in scanner::list_mods(&alice)? {
//!     println!("{} enabled={}", entry.name, entry.enabled);
//! }
//!
//! let mod_path = guard.resolve_descendant("Alice/Blue Dress")?;
//! let renamed = toggle::toggle(&mod_path)?; // Alice/disabled Blue Dress
//! ```

pub mod confinement;
pub mod naming;
pub mod scanner;
pub mod shell;
pub mod toggle;

pub use confinement::PathGuard;
pub use naming::{DISABLED_PREFIX, is_enabled, toggled_name};
pub use scanner::{PREVIEW_EXTENSIONS, find_preview, list_character_folders, list_mods};
pub use shell::{FolderOpener, SystemOpener, select_directory};
pub use toggle::{DeleteOutcome, delete, toggle};
