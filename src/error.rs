// Engine error taxonomy
//
// Every operation the presentation layer can call through the controller fails
// with one of these variants. None of them are fatal to the process.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors surfaced by the scan, toggle, watch and preview operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed path input: empty, null bytes, not UTF-8, or no usable file name
    #[error("Invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// The resolved path lies outside the mod root
    #[error("Path {path:?} is outside the mod root")]
    PathEscape { path: String },

    /// The mod root or a target directory is missing or not a directory
    #[error("Directory unavailable: {path} ({reason})")]
    RootUnavailable { path: String, reason: String },

    /// A toggle would overwrite an existing folder
    #[error("A folder named {path} already exists")]
    NameCollision { path: Utf8PathBuf },

    #[error("{path} not found")]
    NotFound { path: Utf8PathBuf },

    #[error("Failed to delete {path}: {reason}")]
    DeleteFailed { path: Utf8PathBuf, reason: String },

    #[error("Failed to rename {path}: {source}")]
    RenameFailed {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to watch {path}: {reason}")]
    WatchInitFailed { path: Utf8PathBuf, reason: String },

    #[error("Failed to open {path}: {reason}")]
    OpenFailed { path: Utf8PathBuf, reason: String },
}

impl EngineError {
    pub(crate) fn invalid(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unavailable(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RootUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
