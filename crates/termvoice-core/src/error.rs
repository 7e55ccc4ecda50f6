use thiserror::Error;

/// Top-level error type for termvoice.
///
/// Most session-level failures degrade to "skip the visual effect" and are
/// only logged; this type covers the operations that can genuinely fail:
/// loading configuration, opening a recognition stream, parsing a replay
/// script, and talking to a session runtime that has gone away.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TermVoiceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Speech error: {0}")]
    Speech(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for TermVoiceError {
    fn from(err: toml::de::Error) -> Self {
        TermVoiceError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for TermVoiceError {
    fn from(err: toml::ser::Error) -> Self {
        TermVoiceError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for TermVoiceError {
    fn from(err: serde_json::Error) -> Self {
        TermVoiceError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for termvoice operations.
pub type Result<T> = std::result::Result<T, TermVoiceError>;
