//! Enable, disable and delete mod folders.
//!
//! Callers confine paths with [`PathGuard::resolve_descendant`](crate::services::PathGuard::resolve_descendant)
//! first; these functions trust the path they are given.

use crate::error::{EngineError, EngineResult};
use crate::services::naming;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::fs;
use std::io::{self, ErrorKind};

/// Result of a delete request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DeleteOutcome {
    Deleted,
    /// Nothing was there; deleting is idempotent
    AlreadyAbsent,
}

/// Flip a mod folder between enabled and disabled with a single rename
///
/// Returns the folder's new path. A symlinked mod is renamed as a link; what
/// it points at is left alone. The filesystem is left untouched on any error.
pub fn toggle(mod_path: &Utf8Path) -> EngineResult<Utf8PathBuf> {
    let entry = match fs::symlink_metadata(mod_path) {
        Ok(entry) => entry,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(EngineError::NotFound {
                path: mod_path.to_path_buf(),
            });
        }
        Err(e) => return Err(EngineError::invalid(mod_path.as_str(), e.to_string())),
    };
    if !is_folder(mod_path, &entry) {
        return Err(EngineError::invalid(mod_path.as_str(), "not a directory"));
    }

    let (Some(parent), Some(name)) = (mod_path.parent(), mod_path.file_name()) else {
        return Err(EngineError::invalid(mod_path.as_str(), "path has no folder name"));
    };
    let new_name = naming::toggled_name(name).ok_or_else(|| {
        EngineError::invalid(mod_path.as_str(), "removing the disabled prefix leaves an empty name")
    })?;

    let target = parent.join(&new_name);
    if target.symlink_metadata().is_ok() {
        tracing::warn!("Cannot rename {} to {}: target exists", name, new_name);
        return Err(EngineError::NameCollision { path: target });
    }

    match rename_no_replace(mod_path, &target) {
        Ok(()) => {}
        Err(e) if matches!(e.kind(), ErrorKind::AlreadyExists | ErrorKind::DirectoryNotEmpty) => {
            tracing::warn!("Cannot rename {} to {}: target appeared", name, new_name);
            return Err(EngineError::NameCollision { path: target });
        }
        Err(source) => {
            return Err(EngineError::RenameFailed {
                path: mod_path.to_path_buf(),
                source,
            });
        }
    }

    tracing::info!("Renamed {} -> {} in {}", name, new_name, parent);
    Ok(target)
}

/// Recursively delete a mod folder
///
/// A symlinked mod is unlinked; the folder it points at survives.
pub fn delete(mod_path: &Utf8Path) -> EngineResult<DeleteOutcome> {
    let entry = match fs::symlink_metadata(mod_path) {
        Ok(entry) => entry,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!("{} already absent", mod_path);
            return Ok(DeleteOutcome::AlreadyAbsent);
        }
        Err(e) => {
            return Err(EngineError::DeleteFailed {
                path: mod_path.to_path_buf(),
                reason: e.to_string(),
            });
        }
    };

    let result = if entry.file_type().is_symlink() {
        remove_link(mod_path, &entry)
    } else if entry.is_dir() {
        fs::remove_dir_all(mod_path)
    } else {
        return Err(EngineError::DeleteFailed {
            path: mod_path.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    };

    match result {
        Ok(()) => {
            tracing::info!("Deleted {}", mod_path);
            Ok(DeleteOutcome::Deleted)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(DeleteOutcome::AlreadyAbsent),
        Err(e) => {
            tracing::error!("Failed to delete {}: {}", mod_path, e);
            Err(EngineError::DeleteFailed {
                path: mod_path.to_path_buf(),
                reason: e.to_string(),
            })
        }
    }
}

/// A directory, or a link to one
fn is_folder(path: &Utf8Path, entry: &fs::Metadata) -> bool {
    if entry.file_type().is_symlink() {
        fs::metadata(path).is_ok_and(|target| target.is_dir())
    } else {
        entry.is_dir()
    }
}

fn remove_link(path: &Utf8Path, entry: &fs::Metadata) -> io::Result<()> {
    #[cfg(windows)]
    {
        use std::os::windows::fs::FileTypeExt;
        if entry.file_type().is_symlink_dir() {
            return fs::remove_dir(path);
        }
    }
    #[cfg(not(windows))]
    let _ = entry;

    fs::remove_file(path)
}

/// Rename `from` to `to`, failing with `AlreadyExists` rather than replacing `to`
#[cfg(all(target_os = "linux", target_env = "gnu"))]
fn rename_no_replace(from: &Utf8Path, to: &Utf8Path) -> io::Result<()> {
    use std::ffi::CString;

    let c_from = CString::new(from.as_str()).map_err(|e| io::Error::new(ErrorKind::InvalidInput, e))?;
    let c_to = CString::new(to.as_str()).map_err(|e| io::Error::new(ErrorKind::InvalidInput, e))?;

    // SAFETY: both pointers are NUL-terminated strings that outlive the call
    let rc = unsafe {
        libc::renameat2(
            libc::AT_FDCWD,
            c_from.as_ptr(),
            libc::AT_FDCWD,
            c_to.as_ptr(),
            libc::RENAME_NOREPLACE,
        )
    };
    if rc == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        // Filesystem or kernel without RENAME_NOREPLACE
        Some(libc::EINVAL) | Some(libc::ENOSYS) => fs::rename(from, to),
        _ => Err(err),
    }
}

/// Rename `from` to `to`
///
/// Without an atomic no-replace rename, a folder created at `to` after the
/// caller's existence check can still be replaced if it is empty.
#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
fn rename_no_replace(from: &Utf8Path, to: &Utf8Path) -> io::Result<()> {
    fs::rename(from, to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn library() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        (dir, root)
    }

    #[test]
    fn test_toggle_both_directions() {
        let (_dir, root) = library();
        fs::create_dir(root.join("Blue Dress")).unwrap();

        let disabled = toggle(&root.join("Blue Dress")).unwrap();
        assert_eq!(disabled, root.join("disabled Blue Dress"));
        assert!(disabled.is_dir());

        let enabled = toggle(&disabled).unwrap();
        assert_eq!(enabled, root.join("Blue Dress"));
        assert!(!disabled.exists());
    }

    #[test]
    fn test_toggle_errors() {
        let (_dir, root) = library();
        fs::write(root.join("notes.txt"), "x").unwrap();
        fs::create_dir(root.join("disabled")).unwrap();

        assert!(matches!(
            toggle(&root.join("missing")),
            Err(EngineError::NotFound { .. })
        ));
        assert!(matches!(
            toggle(&root.join("notes.txt")),
            Err(EngineError::InvalidPath { .. })
        ));
        assert!(matches!(
            toggle(&root.join("disabled")),
            Err(EngineError::InvalidPath { .. })
        ));
        assert!(root.join("disabled").is_dir());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (_dir, root) = library();
        let target = root.join("Old Mod");
        fs::create_dir_all(target.join("textures")).unwrap();
        fs::write(target.join("textures/a.dds"), "x").unwrap();

        assert_eq!(delete(&target).unwrap(), DeleteOutcome::Deleted);
        assert!(!target.exists());
        assert_eq!(delete(&target).unwrap(), DeleteOutcome::AlreadyAbsent);
    }

    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    #[test]
    fn test_rename_never_replaces_an_empty_folder() {
        let (_dir, root) = library();
        fs::create_dir(root.join("Blue Dress")).unwrap();
        fs::create_dir(root.join("disabled Blue Dress")).unwrap();

        let err = rename_no_replace(&root.join("Blue Dress"), &root.join("disabled Blue Dress"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert!(root.join("Blue Dress").is_dir());
        assert!(root.join("disabled Blue Dress").is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_linked_mod_is_renamed_as_a_link() {
        let (_dir, root) = library();
        fs::create_dir_all(root.join("Shared/Blue Dress")).unwrap();
        fs::create_dir(root.join("Alice")).unwrap();
        std::os::unix::fs::symlink(root.join("Shared/Blue Dress"), root.join("Alice/Blue Dress"))
            .unwrap();

        let disabled = toggle(&root.join("Alice/Blue Dress")).unwrap();
        assert_eq!(disabled, root.join("Alice/disabled Blue Dress"));
        assert!(disabled.symlink_metadata().unwrap().file_type().is_symlink());
        assert!(root.join("Shared/Blue Dress").is_dir());
        assert!(!root.join("Shared/disabled Blue Dress").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_deleting_a_linked_mod_keeps_its_target() {
        let (_dir, root) = library();
        fs::create_dir_all(root.join("Shared/Blue Dress")).unwrap();
        fs::write(root.join("Shared/Blue Dress/mod.ini"), "x").unwrap();
        std::os::unix::fs::symlink(root.join("Shared/Blue Dress"), root.join("link")).unwrap();

        assert_eq!(delete(&root.join("link")).unwrap(), DeleteOutcome::Deleted);
        assert!(root.join("link").symlink_metadata().is_err());
        assert!(root.join("Shared/Blue Dress/mod.ini").is_file());
    }

    #[test]
    fn test_delete_refuses_files() {
        let (_dir, root) = library();
        fs::write(root.join("file.txt"), "x").unwrap();

        assert!(matches!(
            delete(&root.join("file.txt")),
            Err(EngineError::DeleteFailed { .. })
        ));
        assert!(root.join("file.txt").exists());
    }
}
