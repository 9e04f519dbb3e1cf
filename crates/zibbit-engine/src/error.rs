//! Error types for the `zibbit` binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during startup and while serving.

/// Top-level error for the `zibbit` binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: zibbit_core::config::ConfigError,
    },

    /// Connecting to the store failed.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: zibbit_store::StoreError,
    },

    /// The HTTP server could not be started.
    #[error("server error: {source}")]
    Startup {
        /// The underlying startup error.
        #[from]
        source: zibbit_server::startup::StartupError,
    },

    /// A background task ended although it should run forever.
    #[error("{component} stopped unexpectedly")]
    Stopped {
        /// Which task ended.
        component: &'static str,
    },
}
