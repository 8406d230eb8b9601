//! Host shell integration: revealing folders and the native folder picker.

use crate::error::{EngineError, EngineResult};
use camino::{Utf8Path, Utf8PathBuf};
use std::process::Command;

/// Hands a folder to the host's file manager
#[cfg_attr(test, mockall::automock)]
pub trait FolderOpener: Send + Sync {
    fn open(&self, path: &Utf8Path) -> EngineResult<()>;
}

/// Opens folders with `explorer`, `open` or `xdg-open` depending on the platform
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemOpener;

impl SystemOpener {
    pub fn program() -> &'static str {
        if cfg!(target_os = "windows") {
            "explorer"
        } else if cfg!(target_os = "macos") {
            "open"
        } else {
            "xdg-open"
        }
    }
}

impl FolderOpener for SystemOpener {
    fn open(&self, path: &Utf8Path) -> EngineResult<()> {
        if !path.is_dir() {
            return Err(EngineError::OpenFailed {
                path: path.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }

        let program = Self::program();
        let mut child = Command::new(program)
            .arg(path.as_std_path())
            .spawn()
            .map_err(|e| EngineError::OpenFailed {
                path: path.to_path_buf(),
                reason: format!("{program}: {e}"),
            })?;

        // Reap the child without holding up the caller
        std::thread::spawn(move || {
            if let Err(e) = child.wait() {
                tracing::warn!("Failed to wait for {}: {}", program, e);
            }
        });

        tracing::info!("Opened {} with {}", path, program);
        Ok(())
    }
}

/// Show the native folder picker; `None` if cancelled
#[cfg(feature = "native-dialog")]
pub fn select_directory() -> Option<Utf8PathBuf> {
    use rfd::FileDialog;

    FileDialog::new()
        .set_title("Select mod folder")
        .pick_folder()
        .and_then(|path| {
            Utf8PathBuf::try_from(path)
                .map_err(|e| {
                    tracing::error!("Failed to convert path to UTF-8: {}", e);
                    e
                })
                .ok()
        })
}

#[cfg(not(feature = "native-dialog"))]
pub fn select_directory() -> Option<Utf8PathBuf> {
    tracing::warn!("Folder picker unavailable: built without the native-dialog feature");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_program_for_platform() {
        let program = SystemOpener::program();
        assert!(["explorer", "open", "xdg-open"].contains(&program));
    }

    #[test]
    fn test_open_rejects_missing_folder() {
        let dir = TempDir::new().unwrap();
        let missing = Utf8PathBuf::try_from(dir.path().join("missing")).unwrap();

        assert!(matches!(
            SystemOpener.open(&missing),
            Err(EngineError::OpenFailed { .. })
        ));
    }
}
