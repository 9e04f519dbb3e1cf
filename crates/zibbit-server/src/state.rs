//! Shared application state for the game API server.

use std::time::Duration;

use zibbit_core::GameEngine;

/// Default keep-alive interval of the event stream.
const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(5);

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The game every request operates on.
    pub engine: GameEngine,
    /// How often an idle event stream sends a keep-alive comment.
    pub keep_alive: Duration,
}

impl AppState {
    /// Create application state around an engine.
    pub const fn new(engine: GameEngine, keep_alive: Duration) -> Self {
        Self { engine, keep_alive }
    }

    /// Application state with the default keep-alive interval.
    pub const fn with_engine(engine: GameEngine) -> Self {
        Self::new(engine, DEFAULT_KEEP_ALIVE)
    }
}
