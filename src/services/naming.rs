//! Enabled/disabled naming rule for mod folders.
//!
//! A folder is disabled when its name starts, case-insensitively, with
//! `disabled` followed by any run of whitespace (possibly none). That means
//! `disabledfoo` counts as disabled; existing libraries rely on it, so the
//! rule stays as loose as it has always been.

use regex::Regex;
use std::sync::LazyLock;

/// Prefix added when disabling a folder
pub const DISABLED_PREFIX: &str = "disabled ";

static DISABLED_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^disabled\s*").expect("Invalid regex pattern"));

/// Whether a folder with this name is enabled
pub fn is_enabled(name: &str) -> bool {
    !DISABLED_PATTERN.is_match(name)
}

/// Name the folder gets after toggling
///
/// Disabled names lose the whole `disabled` + whitespace run; enabled names
/// gain [`DISABLED_PREFIX`]. Returns `None` when stripping would leave nothing.
pub fn toggled_name(name: &str) -> Option<String> {
    match DISABLED_PATTERN.find(name) {
        Some(found) => {
            let rest = &name[found.end()..];
            (!rest.is_empty()).then(|| rest.to_string())
        }
        None => Some(format!("{DISABLED_PREFIX}{name}")),
    }
}
