//! Error types for the playback coordination engine

use thiserror::Error;

use crate::protocol::StreamId;

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum Error {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Stream registry errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Stream not found: {0}")]
    NotFound(StreamId),

    #[error("Stream already exists: {0}")]
    AlreadyExists(StreamId),

    #[error("Maximum streams reached: {0}")]
    MaxStreamsReached(usize),

    #[error("Position out of range: {0}")]
    InvalidIndex(usize),
}

/// Player command channel errors
///
/// These never escape the audio manager: a command on a channel that is not
/// ready is dropped and the UI layer re-registers once the renderer is up.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Channel not ready for stream {0}")]
    NotReady(StreamId),

    #[error("Channel closed for stream {0}")]
    Closed(StreamId),
}

/// Custom layout errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("Layout is not a custom layout: type={0}")]
    NotCustom(String),

    #[error("Invalid grid snap step: {0}")]
    InvalidStep(f32),
}

/// Result type alias for the engine
pub type Result<T> = std::result::Result<T, Error>;
