use camino::Utf8PathBuf;
use serde::Serialize;

/// One immediate subdirectory of the mod root
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterFolder {
    pub name: String,
    pub path: Utf8PathBuf,
}

/// One mod folder inside a character folder
///
/// `enabled` is derived from the folder name at scan time and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModEntry {
    pub name: String,
    pub path: Utf8PathBuf,
    pub enabled: bool,
    pub preview_path: Option<Utf8PathBuf>,
}
