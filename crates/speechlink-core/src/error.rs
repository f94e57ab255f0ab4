use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("invalid setting: {0}")]
    Invalid(String),

    #[error("not initialized")]
    NotInitialized,

    #[error("already initialized")]
    AlreadyInitialized,
}

/// Failures reported by an engine binding.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to open session: {0}")]
    OpenFailed(String),

    #[error("failed to submit audio: {0}")]
    SubmitFailed(String),

    #[error("failed to request stop: {0}")]
    StopFailed(String),

    #[error("unknown session: {0}")]
    UnknownSession(u64),

    #[error("engine not found: {0}")]
    NotFound(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Caller-facing error taxonomy for a recognition call.
///
/// `Config` is never retried automatically, `Timeout` and `Engine` may be
/// retried (with backoff for the latter), `Stream` needs the caller to fix
/// its audio source first.
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("recognition timed out after {0:?}")]
    Timeout(Duration),

    #[error("engine error: {0}")]
    Engine(String),

    #[error("stream error: {0}")]
    Stream(String),
}

impl RecognitionError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Engine(_))
    }
}

impl From<EngineError> for RecognitionError {
    fn from(err: EngineError) -> Self {
        Self::Engine(err.to_string())
    }
}
