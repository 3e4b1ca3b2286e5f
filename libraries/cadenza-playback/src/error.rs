//! Error types for playback orchestration

use cadenza_core::CoreError;
use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// No track is currently loaded
    #[error("No track loaded")]
    NoTrackLoaded,

    /// Invalid seek position
    #[error("Invalid seek position: {0}")]
    InvalidSeekPosition(f64),

    /// Pipeline rejected a command
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// The builder was not given a pipeline factory
    #[error("No pipeline factory configured")]
    MissingPipelines,

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Catalog or settings collaborator failure
    #[error(transparent)]
    Core(#[from] CoreError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlaybackError {
    /// Shorthand for pipeline failures
    pub fn pipeline(msg: impl Into<String>) -> Self {
        Self::Pipeline(msg.into())
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
