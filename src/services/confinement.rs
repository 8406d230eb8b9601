//! Path confinement.
//!
//! Every path that arrives from outside the process goes through a
//! [`PathGuard`] before any filesystem call touches it. A path is accepted only
//! if, after lexical normalization and symlink resolution, it is the mod root
//! or lies beneath it.

use crate::error::{EngineError, EngineResult};
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use std::io::ErrorKind;

/// Confines external paths to a canonical root directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathGuard {
    root: Utf8PathBuf,
}

impl PathGuard {
    /// Create a guard for `root`
    ///
    /// Fails with `RootUnavailable` if the root is blank, missing, or not a directory.
    pub fn new(root: impl AsRef<Utf8Path>) -> EngineResult<Self> {
        let root = root.as_ref();
        if root.as_str().trim().is_empty() {
            return Err(EngineError::unavailable("", "mod root is not set"));
        }

        let canonical = root.canonicalize_utf8().map_err(|e| match e.kind() {
            ErrorKind::InvalidData => EngineError::unavailable(root.as_str(), "not valid UTF-8"),
            _ => EngineError::unavailable(root.as_str(), e.to_string()),
        })?;

        if !canonical.is_dir() {
            return Err(EngineError::unavailable(root.as_str(), "not a directory"));
        }

        Ok(Self { root: canonical })
    }

    /// The canonical root every resolved path lives under
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Resolve `input` to an absolute path equal to or beneath the root
    ///
    /// Relative input is taken relative to the root. The path does not need to
    /// exist: its longest existing ancestor is canonicalized and the rest is
    /// re-appended.
    pub fn resolve(&self, input: &str) -> EngineResult<Utf8PathBuf> {
        if input.trim().is_empty() {
            return Err(EngineError::invalid(input, "path is empty"));
        }
        if input.contains('\0') {
            return Err(EngineError::invalid(input, "path contains a null byte"));
        }

        let candidate = Utf8Path::new(input);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };

        let resolved = canonicalize_existing(input, &normalize(&joined))?;
        if !resolved.starts_with(&self.root) {
            tracing::warn!("Rejected path outside mod root: {}", input);
            return Err(EngineError::PathEscape {
                path: input.to_string(),
            });
        }

        Ok(resolved)
    }

    /// Resolve `input` to an entry strictly beneath the root without following it
    ///
    /// The parent directory is confined with [`resolve`](Self::resolve); the
    /// last component is kept as named, so a symlinked mod resolves to the link
    /// and not to what it points at. The root itself is rejected.
    pub fn resolve_descendant(&self, input: &str) -> EngineResult<Utf8PathBuf> {
        if input.trim().is_empty() {
            return Err(EngineError::invalid(input, "path is empty"));
        }
        if input.contains('\0') {
            return Err(EngineError::invalid(input, "path contains a null byte"));
        }

        let candidate = Utf8Path::new(input);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };
        let normalized = normalize(&joined);

        let (Some(parent), Some(name)) = (normalized.parent(), normalized.file_name()) else {
            return Err(EngineError::PathEscape {
                path: input.to_string(),
            });
        };

        let parent = self.resolve(parent.as_str()).map_err(|e| match e {
            EngineError::InvalidPath { .. } => e,
            _ => EngineError::PathEscape {
                path: input.to_string(),
            },
        })?;
        Ok(parent.join(name))
    }

    /// Whether `input` resolves inside the root
    pub fn contains(&self, input: &str) -> bool {
        self.resolve(input).is_ok()
    }
}

/// One-shot confinement of `input` against `root`
pub fn resolve(root: &Utf8Path, input: &str) -> EngineResult<Utf8PathBuf> {
    PathGuard::new(root)?.resolve(input)
}

/// Collapse `.` and `..` without touching the filesystem
pub(crate) fn normalize(path: &Utf8Path) -> Utf8PathBuf {
    let mut normalized = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_str()),
        }
    }
    normalized
}

/// Canonicalize the longest existing ancestor of `path` and re-append the missing tail
fn canonicalize_existing(input: &str, path: &Utf8Path) -> EngineResult<Utf8PathBuf> {
    let mut existing = path;
    let mut tail = Vec::new();

    loop {
        match existing.canonicalize_utf8() {
            Ok(mut canonical) => {
                for part in tail.iter().rev() {
                    canonical.push(part);
                }
                return Ok(canonical);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // A dangling symlink could point anywhere
                if existing.symlink_metadata().is_ok() {
                    return Err(EngineError::PathEscape {
                        path: input.to_string(),
                    });
                }
                let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
                    return Err(EngineError::invalid(input, e.to_string()));
                };
                tail.push(name);
                existing = parent;
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(EngineError::invalid(input, "resolves to a path that is not valid UTF-8"));
            }
            Err(e) => return Err(EngineError::invalid(input, e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn guard() -> (TempDir, PathGuard) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("Alice/Blue Dress")).unwrap();
        let guard = PathGuard::new(Utf8Path::from_path(dir.path()).unwrap()).unwrap();
        (dir, guard)
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Utf8Path::new("/a/./b/../c")), Utf8PathBuf::from("/a/c"));
        assert_eq!(normalize(Utf8Path::new("/../..")), Utf8PathBuf::from("/"));
        assert_eq!(normalize(Utf8Path::new("a/b/..")), Utf8PathBuf::from("a"));
    }

    #[test]
    fn test_relative_and_absolute_inputs() {
        let (_dir, guard) = guard();
        let expected = guard.root().join("Alice").join("Blue Dress");

        assert_eq!(guard.resolve("Alice/Blue Dress").unwrap(), expected);
        assert_eq!(guard.resolve(expected.as_str()).unwrap(), expected);
        assert_eq!(guard.resolve("Alice/./x/../Blue Dress").unwrap(), expected);
    }

    #[test]
    fn test_traversal_is_rejected() {
        let (_dir, guard) = guard();

        assert!(matches!(
            guard.resolve("../../etc/passwd"),
            Err(EngineError::PathEscape { .. })
        ));
        assert!(matches!(
            guard.resolve("Alice/../../outside"),
            Err(EngineError::PathEscape { .. })
        ));
    }

    #[test]
    fn test_missing_tail_is_confined() {
        let (_dir, guard) = guard();
        let resolved = guard.resolve("Alice/Not Yet/Created").unwrap();
        assert_eq!(resolved, guard.root().join("Alice/Not Yet/Created"));
    }

    #[test]
    fn test_malformed_input() {
        let (_dir, guard) = guard();

        for input in ["", "   ", "Alice/\0evil"] {
            assert!(
                matches!(guard.resolve(input), Err(EngineError::InvalidPath { .. })),
                "{input:?} should be invalid"
            );
        }
    }

    #[test]
    fn test_root_itself() {
        let (_dir, guard) = guard();
        let root = guard.root().to_string();

        assert!(guard.resolve(&root).is_ok());
        assert!(matches!(
            guard.resolve_descendant(&root),
            Err(EngineError::PathEscape { .. })
        ));
        assert!(guard.resolve_descendant("Alice").is_ok());
    }

    #[test]
    fn test_unavailable_roots() {
        let dir = TempDir::new().unwrap();
        let base = Utf8Path::from_path(dir.path()).unwrap();
        fs::write(base.join("file.txt"), "x").unwrap();

        assert!(matches!(
            PathGuard::new(base.join("missing")),
            Err(EngineError::RootUnavailable { .. })
        ));
        assert!(matches!(
            PathGuard::new(base.join("file.txt")),
            Err(EngineError::RootUnavailable { .. })
        ));
        assert!(matches!(
            PathGuard::new(""),
            Err(EngineError::RootUnavailable { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks() {
        let (dir, guard) = guard();
        let outside = TempDir::new().unwrap();

        std::os::unix::fs::symlink(outside.path(), dir.path().join("Alice/escape")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("Alice/Blue Dress"), dir.path().join("Alice/alias"))
            .unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("Alice/dangling")).unwrap();

        assert!(matches!(
            guard.resolve("Alice/escape"),
            Err(EngineError::PathEscape { .. })
        ));
        assert!(matches!(
            guard.resolve("Alice/escape/child"),
            Err(EngineError::PathEscape { .. })
        ));
        assert!(matches!(
            guard.resolve("Alice/dangling"),
            Err(EngineError::PathEscape { .. })
        ));
        assert_eq!(
            guard.resolve("Alice/alias").unwrap(),
            guard.root().join("Alice/Blue Dress")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_descendant_keeps_the_link() {
        let (dir, guard) = guard();
        let outside = TempDir::new().unwrap();

        std::os::unix::fs::symlink(outside.path(), dir.path().join("Alice/escape")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("Alice/Blue Dress"), dir.path().join("Alice/alias"))
            .unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("root-link")).unwrap();

        assert_eq!(
            guard.resolve_descendant("Alice/alias").unwrap(),
            guard.root().join("Alice/alias")
        );
        assert_eq!(
            guard.resolve_descendant("Alice/escape").unwrap(),
            guard.root().join("Alice/escape")
        );
        assert!(matches!(
            guard.resolve_descendant("Alice/escape/child"),
            Err(EngineError::PathEscape { .. })
        ));
        // Entries reached through a linked parent resolve under the real parent
        assert_eq!(
            guard.resolve_descendant("root-link/Alice").unwrap(),
            guard.root().join("Alice")
        );
    }

    #[test]
    fn test_descendant_rejects_dot_components() {
        let (_dir, guard) = guard();

        for input in ["Alice/..", ".", "..", "Alice/../.."] {
            assert!(
                matches!(guard.resolve_descendant(input), Err(EngineError::PathEscape { .. })),
                "{input:?} should be rejected"
            );
        }
        assert!(matches!(
            guard.resolve_descendant("Alice/\0"),
            Err(EngineError::InvalidPath { .. })
        ));
    }
}
