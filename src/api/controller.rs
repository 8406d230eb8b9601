// Mod library controller - the operations the presentation layer calls
//
// This module contains the ModController which coordinates between:
// - ConfigManager (persisted settings)
// - SettingsState (in-memory settings shared with the preview server)
// - PathGuard (confinement of every incoming path)
// - Scanner / toggle services (filesystem work)
// - WatchManager and EventBus (change notifications)
//
// Settings operations return anyhow errors; library operations return the
// typed EngineError so the UI can tell a collision from a missing folder.

use crate::config::ConfigManager;
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventBus, EventSubscription};
use crate::metrics::Metrics;
use crate::models::{CharacterFolder, EngineConfig, ModEntry, Settings};
use crate::preview;
use crate::services::{
    DeleteOutcome, FolderOpener, PathGuard, SystemOpener, confinement, scanner, shell, toggle,
};
use crate::state::SettingsState;
use crate::watch::{
    NotifyBackend, SessionInfo, SessionKey, WatchBackend, WatchManager, WatchState,
};
use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::runtime::Handle;
use tokio::sync::broadcast;

/// Entry point for every operation the UI can request
///
/// # Example
/// ```ignore
/// let config_manager = Arc::new(ConfigManager::new("ModShelf Data")?);
/// let engine = config_manager.load_engine_config()?;
/// let controller = ModController::new(config_manager, &engine, runtime.handle().clone())?;
///
/// for character in controller.get_character_folders()? {
///     let mods = controller.get_mods(character.path.as_str())?;
/// }
/// ```
pub struct ModController {
    config_manager: Arc<ConfigManager>,

    /// Current settings, shared with the preview server
    settings: SettingsState,

    watches: WatchManager,
    bus: EventBus,
    opener: Arc<dyn FolderOpener>,
    metrics: Arc<Metrics>,

    /// Set once the preview server is bound
    preview_addr: OnceLock<SocketAddr>,
}

impl ModController {
    /// Create a controller using native watches and the system file manager
    pub fn new(
        config_manager: Arc<ConfigManager>,
        engine: &EngineConfig,
        runtime: Handle,
    ) -> Result<Self> {
        Self::with_backends(
            config_manager,
            engine,
            runtime,
            Arc::new(NotifyBackend),
            Arc::new(SystemOpener),
        )
    }

    /// Create a controller with explicit watch and opener implementations
    pub fn with_backends(
        config_manager: Arc<ConfigManager>,
        engine: &EngineConfig,
        runtime: Handle,
        backend: Arc<dyn WatchBackend>,
        opener: Arc<dyn FolderOpener>,
    ) -> Result<Self> {
        // A broken settings file must not keep the engine from starting
        let settings = config_manager.load_settings().unwrap_or_else(|e| {
            tracing::warn!("Could not load settings, starting from defaults: {:#}", e);
            Settings::default()
        });

        let metrics = Arc::new(Metrics::new());
        let bus = EventBus::new(engine.event_capacity, metrics.clone());
        let watches = WatchManager::new(
            backend,
            bus.clone(),
            metrics.clone(),
            engine.debounce_window(),
            runtime,
        );

        tracing::info!(
            "Controller initialized (mod root: {:?}, debounce: {}ms)",
            settings.mod_root_path,
            engine.debounce_ms
        );

        Ok(Self {
            config_manager,
            settings: SettingsState::new(settings),
            watches,
            bus,
            opener,
            metrics,
            preview_addr: OnceLock::new(),
        })
    }

    // ===== Settings =====

    /// The configured mod root, empty if unset
    pub fn get_mod_root_path(&self) -> String {
        self.settings.read(|s| s.mod_root_path.clone())
    }

    /// Persist a new mod root
    ///
    /// An empty path clears the root and ends the root watch. Otherwise the
    /// path must be an existing directory and is stored canonicalized; an
    /// active root watch follows it. Returns the stored value.
    pub fn save_mod_root_path(&self, path: &str) -> Result<String> {
        let trimmed = path.trim();
        let stored = if trimmed.is_empty() {
            String::new()
        } else {
            let canonical = Utf8Path::new(trimmed)
                .canonicalize_utf8()
                .with_context(|| format!("Mod root does not exist: {}", trimmed))?;
            if !canonical.is_dir() {
                bail!("Mod root is not a directory: {}", canonical);
            }
            canonical.into_string()
        };

        let settings = self
            .config_manager
            .update_settings(|s| s.mod_root_path = stored.clone())?;
        self.settings.replace(settings);

        if stored.is_empty() {
            if self.watches.release_key(&SessionKey::root()) {
                tracing::info!("Mod root cleared, root watch stopped");
            }
        } else {
            // A failed move ends the root session and is reported as `watcher-error`
            match self.watches.retarget_root(Utf8Path::new(&stored)) {
                Ok(true) => tracing::info!("Root watch moved to {}", stored),
                Ok(false) => {}
                Err(e) => tracing::warn!("Root watch stopped, could not follow {}: {}", stored, e),
            }
        }

        Ok(stored)
    }

    /// Ask the user for a folder with the native picker
    pub fn select_directory(&self) -> Option<String> {
        shell::select_directory().map(Utf8PathBuf::into_string)
    }

    pub fn get_theme(&self) -> String {
        self.settings.read(|s| s.theme.clone())
    }

    pub fn save_theme(&self, theme: &str) -> Result<()> {
        self.update_settings(|s| s.theme = theme.to_string())
    }

    pub fn get_language(&self) -> String {
        self.settings.read(|s| s.language.clone())
    }

    pub fn save_language(&self, language: &str) -> Result<()> {
        self.update_settings(|s| s.language = language.to_string())
    }

    pub fn get_show_folder_icon(&self) -> bool {
        self.settings.read(|s| s.show_folder_icon)
    }

    pub fn save_show_folder_icon(&self, show: bool) -> Result<()> {
        self.update_settings(|s| s.show_folder_icon = show)
    }

    fn update_settings<F>(&self, update_fn: F) -> Result<()>
    where
        F: FnOnce(&mut Settings),
    {
        let settings = self.config_manager.update_settings(update_fn)?;
        self.settings.replace(settings);
        Ok(())
    }

    // ===== Library =====

    /// Guard for the current mod root; `RootUnavailable` when unset
    fn guard(&self) -> EngineResult<PathGuard> {
        let root = self
            .settings
            .mod_root()
            .ok_or_else(|| EngineError::unavailable("", "mod root is not set"))?;
        PathGuard::new(root)
    }

    /// Character folders under the mod root; empty when no root is set
    pub fn get_character_folders(&self) -> EngineResult<Vec<CharacterFolder>> {
        if self.settings.mod_root().is_none() {
            tracing::debug!("No mod root set, nothing to scan");
            return Ok(Vec::new());
        }

        let guard = self.guard()?;
        scanner::list_character_folders(guard.root())
    }

    /// Mods inside a character folder
    ///
    /// Preview images the preview server would refuse are not reported.
    pub fn get_mods(&self, character_path: &str) -> EngineResult<Vec<ModEntry>> {
        let guard = self.guard()?;
        let path = guard.resolve(character_path)?;
        let mut mods = scanner::list_mods(&path)?;

        for entry in &mut mods {
            if let Some(preview) = entry.preview_path.take_if(|p| !guard.contains(p.as_str())) {
                tracing::debug!("Preview {} is outside the mod root, hiding it", preview);
            }
        }
        Ok(mods)
    }

    // ===== Watching =====

    /// Watch the mod root; changes arrive as `changed` events
    pub fn start_watching_root(&self) -> EngineResult<SessionKey> {
        let guard = self.guard()?;
        self.watches.subscribe_root(guard.root())
    }

    pub fn stop_watching_root(&self) -> bool {
        self.watches.unsubscribe_root()
    }

    /// Watch a character folder; changes arrive under the returned key
    pub fn start_watching_directory(&self, path: &str) -> EngineResult<SessionKey> {
        let directory = self.guard()?.resolve(path)?;
        if !directory.is_dir() {
            return Err(EngineError::unavailable(directory.as_str(), "not a directory"));
        }
        self.watches.subscribe(&directory)
    }

    /// Drop one subscriber of a character folder watch
    ///
    /// Works for folders that have vanished, after the root moved and after it
    /// became unavailable. Returns false if the folder was not watched.
    pub fn stop_watching_directory(&self, path: &str) -> EngineResult<bool> {
        if let Some(key) = self.watched_key(path) {
            return Ok(self.watches.unsubscribe_key(&key));
        }

        let key = match self.guard().and_then(|guard| guard.resolve(path)) {
            Ok(directory) => SessionKey::for_directory(&directory),
            Err(e @ EngineError::PathEscape { .. }) | Err(e @ EngineError::InvalidPath { .. }) => {
                return Err(e);
            }
            Err(_) => SessionKey::for_directory(Utf8Path::new(path)),
        };
        Ok(self.watches.unsubscribe_key(&key))
    }

    /// Key of an active session for `path`, matched without touching the disk
    fn watched_key(&self, path: &str) -> Option<SessionKey> {
        let candidate = Utf8Path::new(path);
        let absolute = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.settings.mod_root()?.join(candidate)
        };

        let key = SessionKey::for_directory(&confinement::normalize(&absolute));
        matches!(self.watches.state(&key), WatchState::Active { .. }).then_some(key)
    }

    /// Active watch sessions in subscription order
    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.watches.sessions()
    }

    // ===== Mod operations =====

    /// Enable or disable a mod; returns its new path
    pub fn switch_mod_status(&self, mod_path: &str) -> EngineResult<String> {
        let path = self.guard()?.resolve_descendant(mod_path)?;
        toggle::toggle(&path).map(Utf8PathBuf::into_string)
    }

    pub fn delete_folder(&self, path: &str) -> EngineResult<DeleteOutcome> {
        let path = self.guard()?.resolve_descendant(path)?;
        toggle::delete(&path)
    }

    /// Reveal a folder in the host file manager
    pub fn open_folder(&self, path: &str) -> EngineResult<()> {
        let path = self.guard()?.resolve_descendant(path)?;
        self.opener.open(&path)
    }

    // ===== Events =====

    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.bus.subscribe()
    }

    /// Events with one name: `changed`, a session key, or `watcher-error`
    pub fn subscribe_to(&self, name: &str) -> EventSubscription {
        self.bus.subscribe_to(name)
    }

    // ===== Preview =====

    /// Record where the preview server listens
    pub fn set_preview_addr(&self, addr: SocketAddr) {
        if self.preview_addr.set(addr).is_err() {
            tracing::warn!("Preview address already set, ignoring {}", addr);
        }
    }

    /// Image URL for a preview path, `None` while no preview server is running
    pub fn preview_url(&self, path: &str) -> EngineResult<Option<String>> {
        let path = self.guard()?.resolve(path)?;
        let Some(addr) = self.preview_addr.get() else {
            return Ok(None);
        };

        preview::image_url(*addr, &path)
            .map(|url| Some(url.into()))
            .map_err(|e| EngineError::invalid(path.as_str(), e.to_string()))
    }

    // ===== Lifecycle =====

    /// Settings handle for the preview server
    pub fn settings_state(&self) -> SettingsState {
        self.settings.clone()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Release every watch
    pub fn shutdown(&self) {
        tracing::info!("Shutting down controller");
        self.watches.shutdown();
    }
}
