//! Error types surfaced by the player.

use thiserror::Error;

/// Errors reported by loading, transport and mix operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlayerError {
    #[error("failed to fetch track \"{track}\": {reason}")]
    Fetch { track: String, reason: String },

    #[error("failed to decode track \"{track}\": {reason}")]
    Decode { track: String, reason: String },

    #[error("audio backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("manifest error: {0}")]
    Manifest(String),
}

impl PlayerError {
    /// Name of the track that caused the error, if the error is track-scoped.
    pub fn track_name(&self) -> Option<&str> {
        match self {
            Self::Fetch { track, .. } | Self::Decode { track, .. } => Some(track),
            _ => None,
        }
    }
}
