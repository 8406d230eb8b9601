use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::fmt;

/// Fixed event name of the root session
pub const ROOT_EVENT: &str = "changed";

const DIRECTORY_PREFIX: &str = "dir:";

/// Subscription handle for one watch session
///
/// The key doubles as the event name the presentation layer listens on. The
/// root session is always `changed`; directory sessions are `dir:` followed by
/// the URL-safe base64 of the watched path, so the same directory always maps
/// to the same channel and the path can be recovered from the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn root() -> Self {
        Self(ROOT_EVENT.to_string())
    }

    pub fn for_directory(path: &Utf8Path) -> Self {
        Self(format!(
            "{DIRECTORY_PREFIX}{}",
            URL_SAFE_NO_PAD.encode(path.as_str())
        ))
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_EVENT
    }

    /// Recover the watched directory from a directory key
    pub fn directory(&self) -> Option<Utf8PathBuf> {
        let encoded = self.0.strip_prefix(DIRECTORY_PREFIX)?;
        let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
        String::from_utf8(bytes).ok().map(Utf8PathBuf::from)
    }

    /// Event name consumers subscribe to
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Observable lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Unwatched,
    Active { ref_count: usize },
}

/// Snapshot of one active session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub key: SessionKey,
    pub target: Utf8PathBuf,
    pub ref_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_key_is_stable_and_reversible() {
        let path = Utf8Path::new("/mods/Alice");
        let first = SessionKey::for_directory(path);
        let second = SessionKey::for_directory(path);

        assert_eq!(first, second);
        assert!(first.as_str().starts_with("dir:"));
        assert_eq!(first.directory().as_deref(), Some(path));
        assert!(!first.is_root());
    }

    #[test]
    fn test_distinct_paths_get_distinct_keys() {
        let alice = SessionKey::for_directory(Utf8Path::new("/mods/Alice"));
        let bob = SessionKey::for_directory(Utf8Path::new("/mods/Bob"));
        assert_ne!(alice, bob);
    }

    #[test]
    fn test_root_key() {
        let root = SessionKey::root();
        assert!(root.is_root());
        assert_eq!(root.as_str(), ROOT_EVENT);
        assert_eq!(root.directory(), None);
    }

    #[test]
    fn test_key_is_event_name_safe() {
        let key = SessionKey::for_directory(Utf8Path::new("C:\\Mods\\Hu Tao/日本語 ?&"));
        assert!(
            key.as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':'))
        );
    }
}
