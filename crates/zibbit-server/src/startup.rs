//! Background startup helper used by the `zibbit` binary.
//!
//! [`spawn_server`] launches the HTTP server on a background Tokio task
//! so the binary can run it next to the phase scheduler.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::server::{ServerConfig, ServerError, start_server};
use crate::state::AppState;

/// Errors that can occur when spawning the game server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server configuration is unusable.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// Spawn the game HTTP server on a background Tokio task.
///
/// The address is validated eagerly so obvious misconfigurations are
/// reported before anything is spawned. Bind and serve failures inside
/// the task are logged, and the task then finishes; the caller should
/// watch the returned handle.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if host and port do not form an address.
pub fn spawn_server(
    config: ServerConfig,
    state: Arc<AppState>,
) -> Result<JoinHandle<()>, StartupError> {
    let addr = config.addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = start_server(&config, state).await {
            tracing::error!(error = %e, "Game server exited with error");
        }
    });

    tracing::info!(%addr, "Game server spawned on background task");
    Ok(handle)
}
