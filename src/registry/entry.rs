//! Per-stream registry entry

use serde::{Deserialize, Serialize};

use crate::health::QualityLevel;
use crate::protocol::{StreamId, StreamIdentity, StreamPosition};

/// One stream on screen plus its UI state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEntry {
    pub identity: StreamIdentity,
    pub is_playing: bool,
    /// Mirror of the audio manager's state, refreshed after every audio change
    pub is_muted: bool,
    pub is_favorite: bool,
    pub quality: QualityLevel,
    /// Mirror of the stored custom-layout frame, if this stream has one
    pub position: Option<StreamPosition>,
}

impl StreamEntry {
    pub fn new(identity: StreamIdentity) -> Self {
        Self {
            identity,
            is_playing: true,
            is_muted: true,
            is_favorite: false,
            quality: QualityLevel::Auto,
            position: None,
        }
    }

    pub fn id(&self) -> &StreamId {
        &self.identity.id
    }
}
