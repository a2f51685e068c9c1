//! Stream registry implementation
//!
//! Ordered list of the streams currently on screen. Order is grid order:
//! the first entry occupies the first cell.

use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::health::QualityLevel;
use crate::protocol::{StreamId, StreamIdentity, StreamPosition};
use crate::registry::entry::StreamEntry;

/// Registry of active streams
#[derive(Debug, Clone)]
pub struct StreamRegistry {
    entries: Vec<StreamEntry>,
    config: RegistryConfig,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            entries: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Append a stream to the end of the grid
    pub fn add(&mut self, identity: StreamIdentity) -> Result<&StreamEntry, RegistryError> {
        if self.contains(&identity.id) {
            return Err(RegistryError::AlreadyExists(identity.id));
        }
        if self.entries.len() >= self.config.max_streams {
            return Err(RegistryError::MaxStreamsReached(self.config.max_streams));
        }

        tracing::info!(
            stream = %identity.id,
            user = %identity.user_login,
            total = self.entries.len() + 1,
            "Stream added"
        );
        self.entries.push(StreamEntry::new(identity));
        Ok(&self.entries[self.entries.len() - 1])
    }

    pub fn remove(&mut self, id: &StreamId) -> Result<StreamEntry, RegistryError> {
        let index = self.index_of(id)?;
        let entry = self.entries.remove(index);
        tracing::info!(stream = %id, remaining = self.entries.len(), "Stream removed");
        Ok(entry)
    }

    pub fn get(&self, id: &StreamId) -> Option<&StreamEntry> {
        self.entries.iter().find(|entry| entry.id() == id)
    }

    pub fn contains(&self, id: &StreamId) -> bool {
        self.get(id).is_some()
    }

    /// Stream ids in grid order
    pub fn ids(&self) -> Vec<StreamId> {
        self.entries.iter().map(|entry| entry.id().clone()).collect()
    }

    pub fn entries(&self) -> &[StreamEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.config.max_streams
    }

    pub fn set_playing(&mut self, id: &StreamId, playing: bool) -> Result<(), RegistryError> {
        self.get_mut(id)?.is_playing = playing;
        Ok(())
    }

    /// Refresh the mute mirror; only the session calls this, after the audio
    /// manager has acted
    pub(crate) fn set_muted(&mut self, id: &StreamId, muted: bool) -> Result<(), RegistryError> {
        self.get_mut(id)?.is_muted = muted;
        Ok(())
    }

    /// Flip the favorite flag and return the new value
    pub fn toggle_favorite(&mut self, id: &StreamId) -> Result<bool, RegistryError> {
        let entry = self.get_mut(id)?;
        entry.is_favorite = !entry.is_favorite;
        Ok(entry.is_favorite)
    }

    pub fn favorites(&self) -> impl Iterator<Item = &StreamEntry> {
        self.entries.iter().filter(|entry| entry.is_favorite)
    }

    pub fn set_quality(&mut self, id: &StreamId, quality: QualityLevel) -> Result<(), RegistryError> {
        self.get_mut(id)?.quality = quality;
        Ok(())
    }

    /// Frames are owned by the session's layout configuration and copied here
    pub(crate) fn set_position(
        &mut self,
        id: &StreamId,
        position: Option<StreamPosition>,
    ) -> Result<(), RegistryError> {
        self.get_mut(id)?.position = position;
        Ok(())
    }

    /// Move a stream to another grid slot, shifting the others
    pub fn move_stream(&mut self, id: &StreamId, to: usize) -> Result<(), RegistryError> {
        if to >= self.entries.len() {
            return Err(RegistryError::InvalidIndex(to));
        }
        let from = self.index_of(id)?;
        let entry = self.entries.remove(from);
        self.entries.insert(to, entry);
        tracing::debug!(stream = %id, from, to, "Stream moved");
        Ok(())
    }

    fn index_of(&self, id: &StreamId) -> Result<usize, RegistryError> {
        self.entries
            .iter()
            .position(|entry| entry.id() == id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))
    }

    fn get_mut(&mut self, id: &StreamId) -> Result<&mut StreamEntry, RegistryError> {
        self.entries
            .iter_mut()
            .find(|entry| entry.id() == id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}
