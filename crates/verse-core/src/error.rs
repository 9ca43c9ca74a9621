//! Error taxonomy shared by the playback engine and the stores.
//!
//! Every kind is recoverable: the component that hits it reverts to a
//! well-defined state and hands the error to the caller as a signal.

use thiserror::Error;

/// Audio for one verse could not be resolved, opened or decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("audio for verse {chapter}:{verse} unavailable: {reason}")]
pub struct ResourceError {
    pub chapter: u32,
    pub verse: u32,
    pub reason: String,
}

impl ResourceError {
    pub fn new(chapter: u32, verse: u32, reason: impl Into<String>) -> Self {
        Self {
            chapter,
            verse,
            reason: reason.into(),
        }
    }
}

/// The durable key-value store could not be read or written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("invalid storage key `{0}`")]
    InvalidKey(String),

    #[error("failed to read `{key}`: {reason}")]
    Read { key: String, reason: String },

    #[error("failed to write `{key}`: {reason}")]
    Write { key: String, reason: String },

    #[error("stored value for `{key}` is malformed: {reason}")]
    Decode { key: String, reason: String },

    #[error("failed to encode value for `{key}`: {reason}")]
    Encode { key: String, reason: String },
}

impl PersistenceError {
    pub fn key(&self) -> &str {
        match self {
            Self::InvalidKey(key) => key,
            Self::Read { key, .. }
            | Self::Write { key, .. }
            | Self::Decode { key, .. }
            | Self::Encode { key, .. } => key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    /// `play` was asked for a position outside the active verse list.
    #[error("verse index {index} is out of range for a list of {len} verses")]
    InvalidIndex { index: usize, len: usize },

    #[error(transparent)]
    ResourceUnavailable(#[from] ResourceError),
}
