use crate::models::{EngineConfig, Settings};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// File name of the persisted user settings
pub const SETTINGS_FILE: &str = "ModShelf Settings.yaml";

/// File name of the optional engine tuning file
pub const ENGINE_CONFIG_FILE: &str = "ModShelf Engine.yaml";

/// Environment prefix for engine overrides, e.g. `MODSHELF_DEBOUNCE_MS=300`
pub const ENV_PREFIX: &str = "MODSHELF";

/// Configuration manager for loading and saving settings files.
///
/// Manages two files inside the configuration directory:
/// - User settings (`ModShelf Settings.yaml`): mod root path and UI preferences
/// - Engine config (`ModShelf Engine.yaml`, optional): debounce window, preview server
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
    engine_config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing configuration files (e.g., "ModShelf Data")
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            settings_path: config_dir.join(SETTINGS_FILE),
            engine_config_path: config_dir.join(ENGINE_CONFIG_FILE),
            config_dir,
        })
    }

    /// Load the user settings file.
    ///
    /// # Returns
    /// The loaded Settings, or defaults if the file doesn't exist
    pub fn load_settings(&self) -> Result<Settings> {
        if !self.settings_path.exists() {
            tracing::warn!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
            return Ok(Settings::default());
        }

        let file_contents = fs::read_to_string(&self.settings_path)
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?;

        // An empty file is what a crashed first save leaves behind
        if file_contents.trim().is_empty() {
            return Ok(Settings::default());
        }

        let settings: Settings = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        tracing::info!("Loaded settings from {}", self.settings_path);
        Ok(settings)
    }

    /// Save the user settings file.
    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    /// Load settings, apply `update_fn`, and save.
    ///
    /// A settings file that cannot be parsed is replaced rather than blocking
    /// the update, so a corrupt file never locks the user out of changing the root.
    pub fn update_settings<F>(&self, update_fn: F) -> Result<Settings>
    where
        F: FnOnce(&mut Settings),
    {
        let mut settings = match self.load_settings() {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Replacing unreadable settings file: {:#}", e);
                Settings::default()
            }
        };

        update_fn(&mut settings);
        self.save_settings(&settings)?;
        Ok(settings)
    }

    /// Load engine tuning from the optional YAML file layered under `MODSHELF_*` variables.
    pub fn load_engine_config(&self) -> Result<EngineConfig> {
        let layered = config::Config::builder()
            .add_source(
                config::File::from(self.engine_config_path.as_std_path())
                    .format(config::FileFormat::Yaml)
                    .required(false),
            )
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .with_context(|| {
                format!("Failed to load engine config: {}", self.engine_config_path)
            })?;

        let engine_config: EngineConfig = layered
            .try_deserialize()
            .context("Failed to parse engine config")?;

        tracing::debug!("Engine config: {:?}", engine_config);
        Ok(engine_config)
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }
}
