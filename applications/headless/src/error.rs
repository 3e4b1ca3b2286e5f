/// Headless driver error types
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HeadlessError>;

#[derive(Debug, Error)]
pub enum HeadlessError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Library manifest error: {0}")]
    Manifest(String),

    #[error("Unknown {entity}: {id}")]
    Unknown { entity: &'static str, id: String },

    #[error("Player error: {0}")]
    Playback(#[from] cadenza_playback::PlaybackError),

    #[error("Core error: {0}")]
    Core(#[from] cadenza_core::CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl HeadlessError {
    pub fn unknown(entity: &'static str, id: impl ToString) -> Self {
        Self::Unknown {
            entity,
            id: id.to_string(),
        }
    }
}
