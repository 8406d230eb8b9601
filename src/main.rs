//! ModShelf - mod library engine
//!
//! Headless host for the engine. It initializes:
//! - Configuration loading ([`ConfigManager`]) from `ModShelf Data/`
//! - Logging infrastructure (file rotation + console output)
//! - Tokio runtime for debounce timers, the watch supervisor and the preview server
//! - The [`ModController`] every UI operation goes through
//!
//! # Execution Flow
//!
//! 1. Load `ModShelf Engine.yaml` / `MODSHELF_*` overrides
//! 2. Initialize logging → logs/modshelf.<date>
//! 3. Create the tokio runtime
//! 4. Create the controller and bind the preview server
//! 5. Watch the mod root (if one is configured) and log every engine event
//! 6. Serve until Ctrl+C, then release all watches
//!
//! # Configuration Files
//!
//! Expected in `ModShelf Data/` (created on first run):
//! - `ModShelf Settings.yaml`: mod root path and UI preferences
//! - `ModShelf Engine.yaml` (optional): debounce window, preview server address and limits

use anyhow::{Context, Result};
use modshelf::api::ModController;
use modshelf::events::EngineEvent;
use modshelf::preview::PreviewServer;
use modshelf::{APP_NAME, ConfigManager, VERSION};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Directory holding settings and engine config
const DATA_DIR: &str = "ModShelf Data";

fn main() -> Result<()> {
    let config_manager = Arc::new(ConfigManager::new(DATA_DIR)?);
    let engine = config_manager.load_engine_config()?;

    let _log_guard =
        modshelf::logging::setup_logging_with_console("logs", "modshelf", engine.debug_logging, true)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("modshelf-worker")
        .build()
        .context("Failed to create tokio runtime")?;

    let controller = Arc::new(ModController::new(
        config_manager,
        &engine,
        runtime.handle().clone(),
    )?);

    let result = runtime.block_on(run(controller.clone(), engine.preview_addr(), engine.preview_max_bytes));

    controller.shutdown();
    controller.metrics().log_summary();

    runtime.shutdown_timeout(std::time::Duration::from_secs(5));
    tracing::info!("Shutdown complete");

    result
}

async fn run(controller: Arc<ModController>, preview_addr: String, max_bytes: u64) -> Result<()> {
    let server = PreviewServer::bind(preview_addr, controller.settings_state(), max_bytes).await?;
    controller.set_preview_addr(server.local_addr());

    let mut events = controller.subscribe_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(EngineEvent::Changed { key }) => tracing::info!("Change in {}", key),
                Ok(EngineEvent::WatcherError { key, message }) => {
                    tracing::warn!("Watcher error on {}: {}", key, message)
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event logger lagged by {} events", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    if controller.get_mod_root_path().is_empty() {
        tracing::info!("No mod root configured yet");
    } else {
        match controller.start_watching_root() {
            Ok(key) => tracing::info!("Watching mod root as {}", key),
            Err(e) => tracing::warn!("Could not watch mod root: {}", e),
        }
    }

    server
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C, serving until killed: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Interrupt received, shutting down");
        })
        .await
}
