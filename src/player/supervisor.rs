//! Load-state supervision for embedded players
//!
//! Tracks every player from first load to ready or terminal failure. A load
//! that neither succeeds nor fails within the timeout counts as failed.
//! Failures are retried with exponential backoff up to the configured limit,
//! after which the stream sits in a failed state until retried by hand.
//!
//! All timers are spawned tokio tasks holding a weak reference back to the
//! supervisor. Each carries the generation it was armed under; a timer whose
//! generation no longer matches does nothing. Untracking a stream aborts its
//! timers outright.

use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::PlaybackConfig;
use crate::error::RegistryError;
use crate::protocol::{PlayerLifecycle, PlayerNotification, StreamId};

/// Load state of one player
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// Waiting for the player to report ready; `attempt` is 1-based
    Loading { attempt: u32 },
    Ready,
    /// A load failed; attempt number `attempt` starts after `delay`
    Retrying { attempt: u32, delay: Duration },
    /// All automatic retries are used up
    Failed { attempts: u32, message: String },
}

/// Events reported to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    Ready {
        stream_id: StreamId,
    },
    /// The caller should reload the player's source
    ReloadRequested {
        stream_id: StreamId,
        attempt: u32,
    },
    /// Terminal failure; `external_url` opens the stream outside the app
    LoadFailed {
        stream_id: StreamId,
        attempts: u32,
        message: String,
        external_url: String,
    },
    ControlsHidden {
        stream_id: StreamId,
    },
}

#[derive(Debug, Clone, Copy)]
enum LoadTimer {
    Timeout,
    Retry,
}

#[derive(Debug)]
struct LoadEntry {
    state: LoadState,
    external_url: String,
    generation: u64,
    load_timer: Option<JoinHandle<()>>,
    controls_visible: bool,
    controls_generation: u64,
    controls_timer: Option<JoinHandle<()>>,
}

impl LoadEntry {
    fn cancel_load_timer(&mut self) {
        self.generation += 1;
        if let Some(timer) = self.load_timer.take() {
            timer.abort();
        }
    }

    fn cancel_controls_timer(&mut self) {
        self.controls_generation += 1;
        if let Some(timer) = self.controls_timer.take() {
            timer.abort();
        }
    }
}

struct Inner {
    entries: DashMap<StreamId, LoadEntry>,
    config: PlaybackConfig,
    events: mpsc::UnboundedSender<PlayerEvent>,
}

/// Supervises loading, retries and controls visibility for all players
///
/// Methods that arm timers must be called from within a Tokio runtime.
pub struct PlaybackSupervisor {
    inner: Arc<Inner>,
}

impl PlaybackSupervisor {
    /// Create a supervisor and the receiver its events are delivered on
    pub fn new(config: PlaybackConfig) -> (Self, mpsc::UnboundedReceiver<PlayerEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            entries: DashMap::new(),
            config,
            events,
        });
        (Self { inner }, rx)
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.inner.config
    }

    /// Start tracking a freshly mounted player
    ///
    /// Tracking an already tracked stream restarts its load from attempt 1.
    pub fn track(&self, id: StreamId, external_url: String) {
        let mut entry = self.inner.entries.entry(id.clone()).or_insert_with(|| LoadEntry {
            state: LoadState::Loading { attempt: 1 },
            external_url: String::new(),
            generation: 0,
            load_timer: None,
            controls_visible: false,
            controls_generation: 0,
            controls_timer: None,
        });
        entry.external_url = external_url;
        entry.state = LoadState::Loading { attempt: 1 };
        self.inner
            .arm_load_timer(&id, &mut entry, self.inner.config.load_timeout(), LoadTimer::Timeout);

        tracing::debug!(stream = %id, "Tracking player load");
    }

    /// Stop tracking a stream and abort its pending timers
    pub fn untrack(&self, id: &StreamId) -> bool {
        match self.inner.entries.remove(id) {
            Some((_, mut entry)) => {
                entry.cancel_load_timer();
                entry.cancel_controls_timer();
                true
            }
            None => false,
        }
    }

    pub fn is_tracked(&self, id: &StreamId) -> bool {
        self.inner.entries.contains_key(id)
    }

    pub fn state(&self, id: &StreamId) -> Option<LoadState> {
        self.inner.entries.get(id).map(|entry| entry.state.clone())
    }

    /// Apply a lifecycle signal from the renderer and return the new state
    pub fn on_lifecycle(
        &self,
        id: &StreamId,
        lifecycle: PlayerLifecycle,
    ) -> Result<LoadState, RegistryError> {
        let mut entry = self
            .inner
            .entries
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;

        let current = entry.state.clone();
        match lifecycle {
            PlayerLifecycle::LoadStarted => {
                if !matches!(current, LoadState::Retrying { .. }) {
                    // A reload after ready or failure starts a fresh attempt;
                    // during a load the timeout restarts from now
                    let attempt = match current {
                        LoadState::Loading { attempt } => attempt,
                        _ => 1,
                    };
                    entry.state = LoadState::Loading { attempt };
                    self.inner.arm_load_timer(
                        id,
                        &mut entry,
                        self.inner.config.load_timeout(),
                        LoadTimer::Timeout,
                    );
                }
            }
            PlayerLifecycle::LoadSucceeded | PlayerLifecycle::Message(PlayerNotification::Ready) => {
                if current != LoadState::Ready {
                    entry.cancel_load_timer();
                    entry.state = LoadState::Ready;
                    tracing::info!(stream = %id, "Player ready");
                    self.inner.emit(PlayerEvent::Ready {
                        stream_id: id.clone(),
                    });
                }
            }
            PlayerLifecycle::LoadFailed(message)
            | PlayerLifecycle::Message(PlayerNotification::Error { message }) => match current {
                LoadState::Loading { attempt } => {
                    entry.cancel_load_timer();
                    self.inner.fail_attempt(id, &mut entry, attempt, message);
                }
                _ => {
                    tracing::debug!(stream = %id, %message, "Ignoring player error outside a load");
                }
            },
            PlayerLifecycle::Message(PlayerNotification::Unrecognized(value)) => {
                tracing::warn!(stream = %id, message = %value, "Unrecognized player notification");
            }
        }

        Ok(entry.state.clone())
    }

    /// Manually retry a stream
    ///
    /// Works from the failed state and while waiting on a backoff delay;
    /// restarts the attempt count. Returns `false` if the stream is loading or
    /// ready already.
    pub fn retry_now(&self, id: &StreamId) -> Result<bool, RegistryError> {
        let mut entry = self
            .inner
            .entries
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;

        if !matches!(entry.state, LoadState::Failed { .. } | LoadState::Retrying { .. }) {
            return Ok(false);
        }

        tracing::info!(stream = %id, "Manual player retry");
        self.inner.start_attempt(id, &mut entry, 1);
        Ok(true)
    }

    /// Show on-screen controls and (re)start the auto-hide timer
    pub fn show_controls(&self, id: &StreamId) -> Result<(), RegistryError> {
        let mut entry = self
            .inner
            .entries
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;

        entry.cancel_controls_timer();
        entry.controls_visible = true;

        let generation = entry.controls_generation;
        let delay = self.inner.config.controls_auto_hide();
        let weak = Arc::downgrade(&self.inner);
        let stream_id = id.clone();
        entry.controls_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.on_controls_due(&stream_id, generation);
            }
        }));
        Ok(())
    }

    /// Hide controls immediately
    pub fn hide_controls(&self, id: &StreamId) -> Result<(), RegistryError> {
        let mut entry = self
            .inner
            .entries
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
        entry.cancel_controls_timer();
        entry.controls_visible = false;
        Ok(())
    }

    pub fn controls_visible(&self, id: &StreamId) -> bool {
        self.inner
            .entries
            .get(id)
            .is_some_and(|entry| entry.controls_visible)
    }
}

impl Inner {
    fn emit(&self, event: PlayerEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("Player event receiver dropped");
        }
    }

    fn arm_load_timer(
        self: &Arc<Self>,
        id: &StreamId,
        entry: &mut LoadEntry,
        delay: Duration,
        kind: LoadTimer,
    ) {
        entry.cancel_load_timer();
        let generation = entry.generation;
        let weak: Weak<Self> = Arc::downgrade(self);
        let stream_id = id.clone();

        entry.load_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.on_load_timer(&stream_id, generation, kind);
            }
        }));
    }

    fn on_load_timer(self: &Arc<Self>, id: &StreamId, generation: u64, kind: LoadTimer) {
        let Some(mut entry) = self.entries.get_mut(id) else {
            return;
        };
        if entry.generation != generation {
            return;
        }
        // This task is the one firing; dropping the handle does not abort it
        entry.load_timer = None;

        match (kind, entry.state.clone()) {
            (LoadTimer::Timeout, LoadState::Loading { attempt }) => {
                let message = format!("no ready signal within {} ms", self.config.load_timeout_ms);
                self.fail_attempt(id, &mut entry, attempt, message);
            }
            (LoadTimer::Retry, LoadState::Retrying { attempt, .. }) => {
                self.start_attempt(id, &mut entry, attempt);
            }
            _ => {}
        }
    }

    /// Begin load attempt `attempt`: ask the caller to reload and arm the timeout
    fn start_attempt(self: &Arc<Self>, id: &StreamId, entry: &mut LoadEntry, attempt: u32) {
        entry.state = LoadState::Loading { attempt };
        self.arm_load_timer(id, entry, self.config.load_timeout(), LoadTimer::Timeout);
        self.emit(PlayerEvent::ReloadRequested {
            stream_id: id.clone(),
            attempt,
        });
    }

    fn fail_attempt(self: &Arc<Self>, id: &StreamId, entry: &mut LoadEntry, attempt: u32, message: String) {
        // Failing attempt n uses up retry n
        if attempt <= self.config.max_retries {
            let delay = self.config.retry_delay(attempt);
            tracing::warn!(
                stream = %id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                %message,
                "Player load failed, retrying"
            );
            entry.state = LoadState::Retrying {
                attempt: attempt + 1,
                delay,
            };
            self.arm_load_timer(id, entry, delay, LoadTimer::Retry);
        } else {
            tracing::info!(stream = %id, attempts = attempt, %message, "Player load failed");
            entry.cancel_load_timer();
            entry.state = LoadState::Failed {
                attempts: attempt,
                message: message.clone(),
            };
            self.emit(PlayerEvent::LoadFailed {
                stream_id: id.clone(),
                attempts: attempt,
                message,
                external_url: entry.external_url.clone(),
            });
        }
    }

    fn on_controls_due(&self, id: &StreamId, generation: u64) {
        let Some(mut entry) = self.entries.get_mut(id) else {
            return;
        };
        if entry.controls_generation != generation || !entry.controls_visible {
            return;
        }
        entry.controls_timer = None;
        entry.controls_visible = false;
        self.emit(PlayerEvent::ControlsHidden {
            stream_id: id.clone(),
        });
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for mut entry in self.entries.iter_mut() {
            entry.cancel_load_timer();
            entry.cancel_controls_timer();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supervisor() -> (PlaybackSupervisor, mpsc::UnboundedReceiver<PlayerEvent>) {
        PlaybackSupervisor::new(PlaybackConfig::default())
    }

    fn id(s: &str) -> StreamId {
        StreamId::new(s)
    }

    async fn advance_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<PlayerEvent>) -> Vec<PlayerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn reload(stream: &str, attempt: u32) -> PlayerEvent {
        PlayerEvent::ReloadRequested {
            stream_id: id(stream),
            attempt,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_before_timeout() {
        let (sup, mut rx) = supervisor();
        sup.track(id("a"), "https://www.twitch.tv/a".into());

        advance_ms(10_000).await;
        let state = sup
            .on_lifecycle(&id("a"), PlayerLifecycle::Message(PlayerNotification::Ready))
            .unwrap();
        assert_eq!(state, LoadState::Ready);

        // The old timeout would have fired at 15 s
        advance_ms(20_000).await;
        assert_eq!(sup.state(&id("a")), Some(LoadState::Ready));
        assert_eq!(drain(&mut rx), vec![PlayerEvent::Ready { stream_id: id("a") }]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_backoff_to_terminal_failure() {
        let (sup, mut rx) = supervisor();
        sup.track(id("a"), "https://www.twitch.tv/a".into());

        advance_ms(15_001).await;
        assert_eq!(
            sup.state(&id("a")),
            Some(LoadState::Retrying {
                attempt: 2,
                delay: Duration::from_secs(1)
            })
        );
        assert!(drain(&mut rx).is_empty());

        advance_ms(1_000).await;
        assert_eq!(sup.state(&id("a")), Some(LoadState::Loading { attempt: 2 }));
        assert_eq!(drain(&mut rx), vec![reload("a", 2)]);

        let state = sup
            .on_lifecycle(&id("a"), PlayerLifecycle::LoadFailed("network".into()))
            .unwrap();
        assert_eq!(
            state,
            LoadState::Retrying {
                attempt: 3,
                delay: Duration::from_secs(2)
            }
        );
        advance_ms(2_001).await;
        assert_eq!(drain(&mut rx), vec![reload("a", 3)]);

        sup.on_lifecycle(
            &id("a"),
            PlayerLifecycle::Message(PlayerNotification::Error {
                message: "network".into(),
            }),
        )
        .unwrap();
        advance_ms(3_999).await;
        assert!(drain(&mut rx).is_empty());
        advance_ms(2).await;
        assert_eq!(drain(&mut rx), vec![reload("a", 4)]);

        let state = sup
            .on_lifecycle(&id("a"), PlayerLifecycle::LoadFailed("network".into()))
            .unwrap();
        assert_eq!(
            state,
            LoadState::Failed {
                attempts: 4,
                message: "network".into()
            }
        );
        assert_eq!(
            drain(&mut rx),
            vec![PlayerEvent::LoadFailed {
                stream_id: id("a"),
                attempts: 4,
                message: "network".into(),
                external_url: "https://www.twitch.tv/a".into(),
            }]
        );

        // Terminal: nothing else happens on its own
        advance_ms(60_000).await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_retry_restarts_attempts() {
        let config = PlaybackConfig {
            max_retries: 0,
            ..PlaybackConfig::default()
        };
        let (sup, mut rx) = PlaybackSupervisor::new(config);
        sup.track(id("a"), "url".into());

        assert!(!sup.retry_now(&id("a")).unwrap());

        sup.on_lifecycle(&id("a"), PlayerLifecycle::LoadFailed("gone".into()))
            .unwrap();
        assert!(matches!(sup.state(&id("a")), Some(LoadState::Failed { attempts: 1, .. })));

        assert!(sup.retry_now(&id("a")).unwrap());
        assert_eq!(sup.state(&id("a")), Some(LoadState::Loading { attempt: 1 }));
        let events = drain(&mut rx);
        assert_eq!(events.last(), Some(&reload("a", 1)));

        sup.on_lifecycle(&id("a"), PlayerLifecycle::LoadSucceeded).unwrap();
        assert_eq!(drain(&mut rx), vec![PlayerEvent::Ready { stream_id: id("a") }]);

        assert_eq!(
            sup.retry_now(&id("missing")),
            Err(RegistryError::NotFound(id("missing")))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_untrack_cancels_timers() {
        let (sup, mut rx) = supervisor();
        sup.track(id("a"), "url".into());
        sup.track(id("b"), "url".into());
        sup.show_controls(&id("a")).unwrap();

        assert!(sup.untrack(&id("a")));
        assert!(!sup.untrack(&id("a")));

        advance_ms(16_001).await;
        let events = drain(&mut rx);
        assert_eq!(events, vec![reload("b", 2)]);
        assert!(!sup.is_tracked(&id("a")));
        assert_eq!(sup.state(&id("a")), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_started_restarts_timeout() {
        let (sup, mut rx) = supervisor();
        sup.track(id("a"), "url".into());

        advance_ms(10_000).await;
        sup.on_lifecycle(&id("a"), PlayerLifecycle::LoadStarted).unwrap();
        advance_ms(10_000).await;
        assert_eq!(sup.state(&id("a")), Some(LoadState::Loading { attempt: 1 }));

        advance_ms(5_001).await;
        assert!(matches!(
            sup.state(&id("a")),
            Some(LoadState::Retrying { attempt: 2, .. })
        ));
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrecognized_message_is_ignored() {
        let (sup, _rx) = supervisor();
        sup.track(id("a"), "url".into());
        let state = sup
            .on_lifecycle(
                &id("a"),
                PlayerLifecycle::Message(PlayerNotification::Unrecognized(
                    serde_json::json!({"type": "quality_changed"}),
                )),
            )
            .unwrap();
        assert_eq!(state, LoadState::Loading { attempt: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_controls_auto_hide_restarts() {
        let (sup, mut rx) = supervisor();
        sup.track(id("a"), "url".into());
        sup.on_lifecycle(&id("a"), PlayerLifecycle::LoadSucceeded).unwrap();
        drain(&mut rx);

        sup.show_controls(&id("a")).unwrap();
        advance_ms(2_000).await;
        sup.show_controls(&id("a")).unwrap();
        advance_ms(2_000).await;
        assert!(sup.controls_visible(&id("a")));

        advance_ms(1_001).await;
        assert!(!sup.controls_visible(&id("a")));
        assert_eq!(
            drain(&mut rx),
            vec![PlayerEvent::ControlsHidden { stream_id: id("a") }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hide_controls_cancels_timer() {
        let (sup, mut rx) = supervisor();
        sup.track(id("a"), "url".into());
        sup.on_lifecycle(&id("a"), PlayerLifecycle::LoadSucceeded).unwrap();
        drain(&mut rx);

        sup.show_controls(&id("a")).unwrap();
        sup.hide_controls(&id("a")).unwrap();
        advance_ms(5_000).await;
        assert!(drain(&mut rx).is_empty());
        assert!(sup.show_controls(&id("zz")).is_err());
    }
}
