//! Configuration loading and typed config structures for Zibbit.
//!
//! The canonical configuration lives in `zibbit-config.yaml` at the project
//! root. Every field has a default, so an empty (or missing) file yields a
//! playable game. Environment variables named after the field in upper case
//! (`GAME_LENGTH_SECONDS`, `VOTE_THRESHOLD`, `DRAGONFLY_URL`, ...) override
//! the YAML values.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use zibbit_types::GameConstants;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override could not be parsed.
    #[error("invalid value {value:?} for {name}: {reason}")]
    Override {
        /// Environment variable name.
        name: &'static str,
        /// The raw value found.
        value: String,
        /// Parser error message.
        reason: String,
    },

    /// The configuration parsed but cannot drive a game.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level Zibbit configuration.
///
/// Mirrors the structure of `zibbit-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ZibbitConfig {
    /// Game rules and timings.
    #[serde(default)]
    pub game: GameConfig,

    /// Store and HTTP listener settings.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ZibbitConfig {
    /// Load configuration from a YAML file, apply environment overrides,
    /// and validate the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML,
    /// [`ConfigError::Override`] for an unparseable env override, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, apply environment overrides,
    /// and validate the result.
    ///
    /// # Errors
    ///
    /// Same as [`ZibbitConfig::from_file`], minus the I/O case.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Override`] or [`ConfigError::Invalid`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::parse("")
    }

    /// Override values from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Override values using `lookup` as the variable source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Override`] if a present value does not parse.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let game = &mut self.game;
        override_with(&lookup, "GAME_LENGTH_SECONDS", &mut game.game_length_seconds)?;
        override_with(&lookup, "GAME_COOLDOWN_SECONDS", &mut game.game_cooldown_seconds)?;
        override_with(&lookup, "CANDIDATE_DECAY_SECONDS", &mut game.candidate_decay_seconds)?;
        override_with(
            &lookup,
            "CANDIDATE_SUBMISSION_COOLDOWN_SECONDS",
            &mut game.candidate_submission_cooldown_seconds,
        )?;
        override_with(
            &lookup,
            "CANDIDATE_VOTE_EXTENSION_SECONDS",
            &mut game.candidate_vote_extension_seconds,
        )?;
        override_with(&lookup, "MAX_PHRASE_WORD_LENGTH", &mut game.max_phrase_word_length)?;
        override_with(&lookup, "VOTE_THRESHOLD", &mut game.vote_threshold)?;
        override_with(&lookup, "FLAG_THRESHOLD", &mut game.flag_threshold)?;
        override_with(&lookup, "MAX_LIVE_CANDIDATES", &mut game.max_live_candidates)?;

        let infra = &mut self.infrastructure;
        override_with(&lookup, "STORE_BACKEND", &mut infra.store_backend)?;
        override_with(&lookup, "DRAGONFLY_URL", &mut infra.dragonfly_url)?;
        override_with(&lookup, "APP_HOST", &mut infra.app_host)?;
        override_with(&lookup, "APP_PORT", &mut infra.app_port)?;
        override_with(&lookup, "SSE_POLL_SECONDS", &mut infra.sse_poll_seconds)?;

        override_with(&lookup, "LOG_LEVEL", &mut self.logging.level)?;
        override_with(&lookup, "LOG_JSON", &mut self.logging.json)?;
        Ok(())
    }

    /// Reject configurations that cannot drive a game.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let game = &self.game;
        let nonzero = [
            ("game_length_seconds", game.game_length_seconds),
            ("game_cooldown_seconds", game.game_cooldown_seconds),
            ("candidate_decay_seconds", game.candidate_decay_seconds),
            (
                "candidate_submission_cooldown_seconds",
                game.candidate_submission_cooldown_seconds,
            ),
            ("max_phrase_word_length", u64::from(game.max_phrase_word_length)),
            ("vote_threshold", u64::from(game.vote_threshold)),
            ("flag_threshold", u64::from(game.flag_threshold)),
            ("sse_poll_seconds", self.infrastructure.sse_poll_seconds),
        ];
        if let Some((name, _)) = nonzero.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::Invalid {
                reason: format!("{name} must be at least 1"),
            });
        }
        if game.candidate_submission_cooldown_seconds < game.candidate_decay_seconds {
            return Err(ConfigError::Invalid {
                reason: "candidate_submission_cooldown_seconds must not be shorter than \
                         candidate_decay_seconds"
                    .to_owned(),
            });
        }
        Ok(())
    }
}

fn override_with<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    target: &mut T,
) -> Result<(), ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(value) = lookup(name) else {
        return Ok(());
    };
    let parsed = value.trim().parse::<T>();
    match parsed {
        Ok(v) => {
            *target = v;
            Ok(())
        }
        Err(e) => Err(ConfigError::Override {
            name,
            value,
            reason: e.to_string(),
        }),
    }
}

/// Game rules and timings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GameConfig {
    /// Length of a game in seconds.
    #[serde(default = "default_game_length_seconds")]
    pub game_length_seconds: u64,

    /// Length of the cooldown between games in seconds.
    #[serde(default = "default_game_cooldown_seconds")]
    pub game_cooldown_seconds: u64,

    /// Lifetime of an unvoted candidate in seconds.
    #[serde(default = "default_candidate_decay_seconds")]
    pub candidate_decay_seconds: u64,

    /// How long an identical phrase is blocked after submission.
    #[serde(default = "default_candidate_submission_cooldown_seconds")]
    pub candidate_submission_cooldown_seconds: u64,

    /// Decay extension unit; the n-th vote adds n times this.
    #[serde(default = "default_candidate_vote_extension_seconds")]
    pub candidate_vote_extension_seconds: u64,

    /// Maximum number of words in a phrase.
    #[serde(default = "default_max_phrase_word_length")]
    pub max_phrase_word_length: u32,

    /// Votes needed to promote a candidate.
    #[serde(default = "default_vote_threshold")]
    pub vote_threshold: u32,

    /// Flags needed to remove a story word.
    #[serde(default = "default_flag_threshold")]
    pub flag_threshold: u32,

    /// Best-effort cap on live candidates; 0 disables it.
    #[serde(default)]
    pub max_live_candidates: u32,
}

impl GameConfig {
    /// Game length as a [`Duration`].
    pub const fn game_length(&self) -> Duration {
        Duration::from_secs(self.game_length_seconds)
    }

    /// Cooldown between games as a [`Duration`].
    pub const fn game_cooldown(&self) -> Duration {
        Duration::from_secs(self.game_cooldown_seconds)
    }

    /// Lifetime of an unvoted candidate.
    pub const fn candidate_decay(&self) -> Duration {
        Duration::from_secs(self.candidate_decay_seconds)
    }

    /// Submission cooldown for an identical phrase.
    pub const fn submission_cooldown(&self) -> Duration {
        Duration::from_secs(self.candidate_submission_cooldown_seconds)
    }

    /// Decay time bought by a vote that brings the count to `votes`.
    pub fn vote_extension(&self, votes: u32) -> Duration {
        Duration::from_secs(
            self.candidate_vote_extension_seconds
                .saturating_mul(u64::from(votes)),
        )
    }

    /// The parameters echoed to clients in snapshots.
    pub const fn constants(&self) -> GameConstants {
        GameConstants {
            game_length_seconds: self.game_length_seconds,
            game_cooldown_seconds: self.game_cooldown_seconds,
            candidate_decay_seconds: self.candidate_decay_seconds,
            candidate_submission_cooldown_seconds: self.candidate_submission_cooldown_seconds,
            candidate_vote_extension_seconds: self.candidate_vote_extension_seconds,
            max_phrase_word_length: self.max_phrase_word_length,
            vote_threshold: self.vote_threshold,
            flag_threshold: self.flag_threshold,
            max_live_candidates: self.max_live_candidates,
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            game_length_seconds: default_game_length_seconds(),
            game_cooldown_seconds: default_game_cooldown_seconds(),
            candidate_decay_seconds: default_candidate_decay_seconds(),
            candidate_submission_cooldown_seconds: default_candidate_submission_cooldown_seconds(),
            candidate_vote_extension_seconds: default_candidate_vote_extension_seconds(),
            max_phrase_word_length: default_max_phrase_word_length(),
            vote_threshold: default_vote_threshold(),
            flag_threshold: default_flag_threshold(),
            max_live_candidates: 0,
        }
    }
}

/// Which [`GameStore`](zibbit_store::GameStore) backend to run against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Shared `Dragonfly` (Redis-compatible) server.
    #[default]
    Dragonfly,
    /// In-process store, for a single instance or local testing.
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dragonfly" | "redis" => Ok(Self::Dragonfly),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown store backend {other:?}")),
        }
    }
}

/// Store and HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InfrastructureConfig {
    /// Which store backend to use.
    #[serde(default)]
    pub store_backend: StoreBackend,

    /// Dragonfly (Redis-compatible) URL.
    #[serde(default = "default_dragonfly_url")]
    pub dragonfly_url: String,

    /// Interface the HTTP server binds to.
    #[serde(default = "default_app_host")]
    pub app_host: String,

    /// Port the HTTP server listens on.
    #[serde(default = "default_app_port")]
    pub app_port: u16,

    /// Keep-alive interval of the event stream in seconds.
    #[serde(default = "default_sse_poll_seconds")]
    pub sse_poll_seconds: u64,
}

impl InfrastructureConfig {
    /// Keep-alive interval of the event stream.
    pub const fn sse_poll_interval(&self) -> Duration {
        Duration::from_secs(self.sse_poll_seconds)
    }
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::default(),
            dragonfly_url: default_dragonfly_url(),
            app_host: default_app_host(),
            app_port: default_app_port(),
            sse_poll_seconds: default_sse_poll_seconds(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_game_length_seconds() -> u64 {
    120
}

const fn default_game_cooldown_seconds() -> u64 {
    60
}

const fn default_candidate_decay_seconds() -> u64 {
    10
}

const fn default_candidate_submission_cooldown_seconds() -> u64 {
    20
}

const fn default_candidate_vote_extension_seconds() -> u64 {
    1
}

const fn default_max_phrase_word_length() -> u32 {
    5
}

const fn default_vote_threshold() -> u32 {
    3
}

const fn default_flag_threshold() -> u32 {
    3
}

fn default_dragonfly_url() -> String {
    "redis://localhost:6379".to_owned()
}

fn default_app_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_app_port() -> u16 {
    8000
}

const fn default_sse_poll_seconds() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_owned()
}
