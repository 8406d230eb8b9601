//! Mod library scanner.
//!
//! Lists character folders under the mod root and mod folders under a
//! character folder. Results are computed on demand and never cached.

use crate::error::{EngineError, EngineResult};
use crate::models::{CharacterFolder, ModEntry};
use crate::services::naming;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io::ErrorKind;

/// Image extensions considered for previews, in priority order
pub const PREVIEW_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "webp", "avif", "gif"];

/// Immediate subdirectories of the mod root, in enumeration order
pub fn list_character_folders(root: &Utf8Path) -> EngineResult<Vec<CharacterFolder>> {
    let folders: Vec<_> = subdirectories(root)?
        .into_iter()
        .map(|(name, path)| CharacterFolder { name, path })
        .collect();

    tracing::debug!("Found {} character folders in {}", folders.len(), root);
    Ok(folders)
}

/// Mod folders inside a character folder, with their enabled state and preview image
pub fn list_mods(character_path: &Utf8Path) -> EngineResult<Vec<ModEntry>> {
    let mods: Vec<_> = subdirectories(character_path)?
        .into_iter()
        .map(|(name, path)| {
            let preview_path = find_preview(&path);
            ModEntry {
                enabled: naming::is_enabled(&name),
                name,
                path,
                preview_path,
            }
        })
        .collect();

    tracing::debug!("Found {} mods in {}", mods.len(), character_path);
    Ok(mods)
}

/// Pick the preview image directly inside `mod_dir`
///
/// Candidates are regular files with a supported extension. A stem starting
/// with `preview` wins, then extension priority, then name.
pub fn find_preview(mod_dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let entries = fs::read_dir(mod_dir).ok()?;

    entries
        .filter_map(Result::ok)
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter_map(|name| preview_rank(&name).map(|rank| (rank, name)))
        .filter(|(_, name)| mod_dir.join(name).is_file())
        .min()
        .map(|(_, name)| mod_dir.join(name))
}

fn preview_rank(name: &str) -> Option<(bool, usize, String)> {
    let path = Utf8Path::new(name);
    let extension = path.extension()?.to_ascii_lowercase();
    let priority = PREVIEW_EXTENSIONS.iter().position(|ext| *ext == extension)?;
    let stem = path.file_stem().unwrap_or_default().to_ascii_lowercase();

    Some((!stem.starts_with("preview"), priority, name.to_lowercase()))
}

/// Names and paths of the immediate subdirectories of `dir`
///
/// `RootUnavailable` if `dir` is not an existing directory. If it disappears
/// between that check and the listing, the result is empty; entries that
/// vanish mid-scan are skipped.
fn subdirectories(dir: &Utf8Path) -> EngineResult<Vec<(String, Utf8PathBuf)>> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(EngineError::unavailable(dir.as_str(), "not a directory")),
        Err(e) => return Err(EngineError::unavailable(dir.as_str(), e.to_string())),
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!("{} vanished before it could be listed", dir);
            return Ok(Vec::new());
        }
        Err(e) => return Err(EngineError::unavailable(dir.as_str(), e.to_string())),
    };

    let mut found = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("Skipping unreadable entry in {}: {}", dir, e);
                continue;
            }
        };

        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                tracing::warn!("Skipping non-UTF-8 name in {}: {:?}", dir, raw);
                continue;
            }
        };

        let path = dir.join(&name);
        match fs::metadata(&path) {
            Ok(meta) if meta.is_dir() => found.push((name, path)),
            Ok(_) => {}
            Err(e) => tracing::debug!("Skipping {}: {}", path, e),
        }
    }

    Ok(found)
}
