//! Zibbit game server binary.
//!
//! Wires the game engine to its store, runs the phase scheduler, and
//! serves the HTTP/SSE API until interrupted.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `zibbit-config.yaml` (or `ZIBBIT_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Connect to the store (`Dragonfly`, or in-memory)
//! 4. Spawn the phase scheduler
//! 5. Spawn the HTTP server
//! 6. Wait for `Ctrl-C` or for either task to stop

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use zibbit_core::GameEngine;
use zibbit_core::broadcast::EVENT_TOPIC_PATTERN;
use zibbit_core::config::{InfrastructureConfig, LoggingConfig, StoreBackend, ZibbitConfig};
use zibbit_server::startup::spawn_server;
use zibbit_server::{AppState, ServerConfig};
use zibbit_store::{DragonflyPool, GameStore, MemoryStore};

use crate::error::EngineError;

/// Config file used when `ZIBBIT_CONFIG` is unset.
const DEFAULT_CONFIG_PATH: &str = "zibbit-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any initialization step fails or a background
/// task stops.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration.
    let (config, source) = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!("zibbit starting");
    info!(
        source = %source,
        game_length_seconds = config.game.game_length_seconds,
        game_cooldown_seconds = config.game.game_cooldown_seconds,
        vote_threshold = config.game.vote_threshold,
        flag_threshold = config.game.flag_threshold,
        store_backend = ?config.infrastructure.store_backend,
        "Configuration loaded"
    );

    // 3. Connect to the store.
    let store = connect_store(&config.infrastructure).await?;
    let engine = GameEngine::new(store, config.game.clone());

    // 4. Phase scheduler.
    let mut scheduler = tokio::spawn(engine.scheduler().run());

    // 5. HTTP server.
    let server_config = ServerConfig {
        host: config.infrastructure.app_host.clone(),
        port: config.infrastructure.app_port,
    };
    let state = Arc::new(AppState::new(
        engine,
        config.infrastructure.sse_poll_interval(),
    ));
    let mut server = spawn_server(server_config, state)?;

    // 6. Run until interrupted.
    tokio::select! {
        _ = &mut server => {
            error!("Game server task ended");
            scheduler.abort();
            Err(EngineError::Stopped { component: "game server" })
        }
        _ = &mut scheduler => {
            error!("Scheduler task ended");
            server.abort();
            Err(EngineError::Stopped { component: "scheduler" })
        }
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for Ctrl-C");
            }
            info!("Shutting down");
            server.abort();
            scheduler.abort();
            Ok(())
        }
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level when set.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Load configuration from the YAML file, or defaults if it is absent.
///
/// Returns the config and a description of where it came from, for
/// logging once tracing is up.
fn load_config() -> Result<(ZibbitConfig, String), EngineError> {
    let path = std::env::var_os("ZIBBIT_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    if path.exists() {
        let config = ZibbitConfig::from_file(&path)?;
        Ok((config, path.display().to_string()))
    } else {
        Ok((ZibbitConfig::from_env()?, "defaults".to_owned()))
    }
}

/// Open the configured store backend.
async fn connect_store(
    infra: &InfrastructureConfig,
) -> Result<Arc<dyn GameStore>, EngineError> {
    match infra.store_backend {
        StoreBackend::Dragonfly => {
            info!(url = %infra.dragonfly_url, "Connecting to Dragonfly");
            let pool = DragonflyPool::connect(&infra.dragonfly_url, EVENT_TOPIC_PATTERN).await?;
            Ok(Arc::new(pool))
        }
        StoreBackend::Memory => {
            info!("Using in-memory store; state is local to this process");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
