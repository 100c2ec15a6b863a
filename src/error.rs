use thiserror::Error;

/// Everything the engine can report back across its boundary.
///
/// No operation panics on these; each public operation returns
/// `EngineResult` and the caller decides whether to retry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Source handle failed to open, probe or decode.
    #[error("Failed to load source {path}: {reason}")]
    SourceLoad { path: String, reason: String },

    /// The output device refused to start (autoplay lock, device busy).
    #[error("Audio output could not be unlocked: {0}")]
    HardwareUnlockDenied(String),

    #[error("Wake lock unavailable: {0}")]
    WakeLockUnavailable(String),

    #[error("Media session error: {0}")]
    MediaSession(String),

    #[error("No audio output device found")]
    NoOutputDevice,

    #[error("Audio stream error: {0}")]
    Stream(String),

    #[error("Track index {index} out of range (queue length {len})")]
    InvalidIndex { index: usize, len: usize },

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Engine is not running")]
    Disconnected,
}

impl EngineError {
    pub fn source_load(path: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::SourceLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
