//! Viewing session
//!
//! Screen-scoped owner of every engine component. Adding or removing a stream
//! flows through the registry, the audio manager, the playback supervisor,
//! health tracking and layout in one place so they never disagree about
//! which streams exist.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::audio::AudioExclusivityManager;
use crate::config::EngineConfig;
use crate::error::{LayoutError, RegistryError, Result};
use crate::floating::FloatingWindowController;
use crate::health::{HealthAggregator, HealthSample, HealthUpdate};
use crate::layout::{
    ChromeInsets, GridDimensions, LayoutConfiguration, LayoutEngine, LayoutMode, Orientation,
    PersistedLayout, Size,
};
use crate::player::{LoadState, PlaybackSupervisor, PlayerChannel, PlayerEvent};
use crate::protocol::{PlayerLifecycle, PlayerNotification, StreamId, StreamIdentity, StreamPosition};
use crate::registry::{StreamEntry, StreamRegistry};

/// All per-screen state for a multi-stream view
pub struct ViewingSession {
    config: EngineConfig,
    registry: StreamRegistry,
    audio: Arc<AudioExclusivityManager>,
    supervisor: PlaybackSupervisor,
    health: HealthAggregator,
    engine: LayoutEngine,
    layout: LayoutConfiguration,
    viewport: Size,
    orientation: Orientation,
    insets: ChromeInsets,
    grid: GridDimensions,
}

impl ViewingSession {
    /// Create a session and the receiver for its player events
    ///
    /// Adding streams arms player timers, so that must happen inside a Tokio
    /// runtime.
    pub fn new(
        config: EngineConfig,
        viewport: Size,
        insets: ChromeInsets,
    ) -> (Self, mpsc::UnboundedReceiver<PlayerEvent>) {
        let (supervisor, events) = PlaybackSupervisor::new(config.playback.clone());
        let engine = LayoutEngine::new(config.layout.clone());
        let orientation = Orientation::of(viewport);
        let layout = LayoutConfiguration::default();
        let grid = engine.compute_layout(0, layout.mode, viewport, orientation, insets);

        let session = Self {
            registry: StreamRegistry::with_config(config.registry.clone()),
            audio: Arc::new(AudioExclusivityManager::new(&config.audio)),
            supervisor,
            health: HealthAggregator::new(config.health.clone()),
            engine,
            layout,
            viewport,
            orientation,
            insets,
            grid,
            config,
        };
        (session, events)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    /// Shared audio manager, for player components that hold their own reference
    pub fn audio(&self) -> Arc<AudioExclusivityManager> {
        Arc::clone(&self.audio)
    }

    pub fn supervisor(&self) -> &PlaybackSupervisor {
        &self.supervisor
    }

    pub fn health(&self) -> &HealthAggregator {
        &self.health
    }

    pub fn grid(&self) -> &GridDimensions {
        &self.grid
    }

    pub fn layout(&self) -> &LayoutConfiguration {
        &self.layout
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    // ---- streams ----

    /// Add a stream and mount its player
    pub fn add_stream(&mut self, identity: StreamIdentity, channel: PlayerChannel) -> Result<()> {
        let id = identity.id.clone();
        let external_url = identity.channel_url(&self.config.playback.external_base_url);
        self.registry.add(identity)?;

        self.audio.register(id.clone(), channel);
        self.supervisor.track(id, external_url);
        self.refresh_audio_mirror();
        self.sync_position_mirror();
        self.relayout();
        Ok(())
    }

    /// Hand a stream's player a new channel once its renderer is up
    ///
    /// The current mute and play state is re-issued over the new channel.
    pub fn attach_player(&mut self, id: &StreamId, channel: PlayerChannel) -> Result<()> {
        if !self.registry.contains(id) {
            return Err(RegistryError::NotFound(id.clone()).into());
        }
        self.audio.register(id.clone(), channel);
        Ok(())
    }

    /// Remove a stream, cancelling its timers and forgetting its state
    pub fn remove_stream(&mut self, id: &StreamId) -> Result<StreamEntry> {
        let entry = self.registry.remove(id)?;

        self.audio.unregister(id);
        self.supervisor.untrack(id);
        self.health.remove(id);
        self.layout.remove_stream(id);
        self.refresh_audio_mirror();
        self.relayout();
        Ok(entry)
    }

    pub fn toggle_favorite(&mut self, id: &StreamId) -> Result<bool> {
        Ok(self.registry.toggle_favorite(id)?)
    }

    /// Move a stream to another grid slot
    pub fn move_stream(&mut self, id: &StreamId, to: usize) -> Result<()> {
        Ok(self.registry.move_stream(id, to)?)
    }

    // ---- player lifecycle ----

    /// Handle a raw notification posted by a player
    ///
    /// Payloads that are not JSON are logged and ignored like any other
    /// unrecognized message.
    pub fn handle_notification(&mut self, id: &StreamId, raw: &str) -> Result<LoadState> {
        let notification = match PlayerNotification::parse(raw) {
            Ok(notification) => notification,
            Err(e) => {
                tracing::warn!(stream = %id, error = %e, "Malformed player notification");
                PlayerNotification::Unrecognized(serde_json::Value::String(raw.to_string()))
            }
        };
        self.handle_lifecycle(id, PlayerLifecycle::Message(notification))
    }

    pub fn handle_lifecycle(&mut self, id: &StreamId, lifecycle: PlayerLifecycle) -> Result<LoadState> {
        Ok(self.supervisor.on_lifecycle(id, lifecycle)?)
    }

    /// Manual retry from the error overlay
    pub fn retry_stream(&mut self, id: &StreamId) -> Result<bool> {
        Ok(self.supervisor.retry_now(id)?)
    }

    pub fn show_controls(&self, id: &StreamId) -> Result<()> {
        Ok(self.supervisor.show_controls(id)?)
    }

    pub fn hide_controls(&self, id: &StreamId) -> Result<()> {
        Ok(self.supervisor.hide_controls(id)?)
    }

    // ---- audio and playback ----

    pub fn set_active_stream(&mut self, id: &StreamId) -> Result<()> {
        self.audio.set_active_stream(id)?;
        self.refresh_audio_mirror();
        Ok(())
    }

    pub fn mute_stream(&mut self, id: &StreamId) -> Result<()> {
        self.audio.mute_stream(id)?;
        self.refresh_audio_mirror();
        Ok(())
    }

    pub fn unmute_stream(&mut self, id: &StreamId) -> Result<()> {
        self.audio.unmute_stream(id)?;
        self.refresh_audio_mirror();
        Ok(())
    }

    pub fn toggle_mute(&mut self, id: &StreamId) -> Result<bool> {
        let muted = self.audio.toggle_mute(id)?;
        self.refresh_audio_mirror();
        Ok(muted)
    }

    pub fn mute_all(&mut self) {
        self.audio.mute_all();
        self.refresh_audio_mirror();
    }

    pub fn unmute_all(&mut self) -> bool {
        let restored = self.audio.unmute_all();
        self.refresh_audio_mirror();
        restored
    }

    pub fn play(&mut self, id: &StreamId) -> Result<()> {
        self.audio.play(id)?;
        self.refresh_audio_mirror();
        Ok(())
    }

    pub fn pause(&mut self, id: &StreamId) -> Result<()> {
        self.audio.pause(id)?;
        self.refresh_audio_mirror();
        Ok(())
    }

    pub fn set_all_playing(&mut self, playing: bool) {
        self.audio.set_all_playing(playing);
        self.refresh_audio_mirror();
    }

    /// Copy mute and play flags from the audio manager into the registry
    ///
    /// Session methods do this themselves; call it after driving the shared
    /// manager directly.
    pub fn refresh_audio_mirror(&mut self) {
        for snapshot in self.audio.snapshot() {
            let id = &snapshot.stream_id;
            let synced = self.registry.set_muted(id, snapshot.is_muted);
            if let Err(e) = synced.and_then(|_| self.registry.set_playing(id, snapshot.is_playing)) {
                tracing::debug!(error = %e, "Audio handle without a registry entry");
            }
        }
    }

    // ---- layout ----

    /// Switch layout mode
    ///
    /// Entering custom mode restores frames stored on an earlier visit and
    /// keeps every other stream where it currently is on screen. Leaving it
    /// keeps the stored frames for a later return.
    pub fn set_layout_mode(&mut self, mode: LayoutMode) -> Result<()> {
        if mode == LayoutMode::Custom && self.layout.mode != LayoutMode::Custom {
            let current = self.frames()?;
            self.layout.promote_to_custom(current);
        } else {
            self.layout.mode = mode;
        }
        tracing::debug!(mode = ?mode, "Layout mode changed");
        self.sync_position_mirror();
        self.relayout();
        Ok(())
    }

    /// Store a custom frame for one stream, returning the clamped frame
    pub fn set_custom_position(&mut self, position: StreamPosition) -> Result<StreamPosition> {
        if self.layout.mode != LayoutMode::Custom {
            return Err(LayoutError::NotCustom(format!("{:?}", self.layout.mode)).into());
        }
        if !self.registry.contains(&position.stream_id) {
            return Err(RegistryError::NotFound(position.stream_id.clone()).into());
        }
        let clamped = self.engine.custom_bounds(self.viewport)?.clamp(&position);
        self.layout.set_position(clamped.clone());
        self.sync_position_mirror();
        Ok(clamped)
    }

    pub fn bring_to_front(&mut self, id: &StreamId) -> bool {
        let raised = self.layout.bring_to_front(id);
        self.sync_position_mirror();
        raised
    }

    /// Adopt a saved custom layout
    pub fn load_layout(&mut self, layout: PersistedLayout) {
        tracing::info!(layout = %layout.name, frames = layout.positions.len(), "Custom layout loaded");
        self.layout = layout.into_configuration();
        self.sync_position_mirror();
        self.relayout();
    }

    /// Snapshot the current frames as a saveable custom layout
    pub fn save_layout(&self, name: impl Into<String>) -> Result<PersistedLayout> {
        Ok(PersistedLayout::new(name, self.frames()?))
    }

    /// Viewport or chrome changed (rotation, split screen, toolbar toggled)
    ///
    /// Geometry is recomputed; streams and stored custom frames are not
    /// touched.
    pub fn set_viewport(&mut self, viewport: Size, insets: ChromeInsets) {
        self.viewport = viewport;
        self.orientation = Orientation::of(viewport);
        self.insets = insets;
        self.relayout();
    }

    /// Frames to render, in grid order
    pub fn frames(&self) -> Result<Vec<StreamPosition>> {
        let ids = self.registry.ids();
        Ok(self
            .layout
            .resolve(&self.engine, &ids, self.viewport, self.orientation, self.insets)?)
    }

    /// A floating window docked in the bottom-right corner of the viewport
    pub fn floating_window(&self) -> FloatingWindowController {
        FloatingWindowController::docked(self.config.floating.clone(), self.viewport)
    }

    // ---- health ----

    pub fn ingest_health(&mut self, id: &StreamId, sample: &HealthSample) -> Result<HealthUpdate> {
        if !self.registry.contains(id) {
            return Err(RegistryError::NotFound(id.clone()).into());
        }
        Ok(self.health.ingest(id, sample))
    }

    /// Copy stored custom frames from the layout into the registry
    ///
    /// The layout configuration owns custom frames; registry entries carry a
    /// read-only copy.
    fn sync_position_mirror(&mut self) {
        for id in self.registry.ids() {
            let position = self.layout.position_of(&id).cloned();
            if let Err(e) = self.registry.set_position(&id, position) {
                tracing::debug!(error = %e, "Stream vanished while syncing frames");
            }
        }
    }

    fn relayout(&mut self) {
        self.grid = self.engine.compute_layout(
            self.registry.len(),
            self.layout.mode,
            self.viewport,
            self.orientation,
            self.insets,
        );
    }
}
