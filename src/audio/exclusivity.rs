//! Audio exclusivity manager
//!
//! The manager is the only component allowed to send mute or unmute
//! commands. After every operation at most one registered player is
//! unmuted, and every player other than the active one is muted.

use parking_lot::Mutex;

use crate::config::AudioConfig;
use crate::error::{ChannelError, RegistryError};
use crate::player::{PlayerChannel, PlayerHandle};
use crate::protocol::{PlayerAction, StreamId};

/// Mute/play state of one registered player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSnapshot {
    pub stream_id: StreamId,
    pub is_muted: bool,
    pub is_playing: bool,
    pub is_active: bool,
}

#[derive(Default)]
struct AudioState {
    /// Registration order; mute sweeps walk it front to back
    handles: Vec<PlayerHandle>,
    active: Option<StreamId>,
}

impl AudioState {
    fn position(&self, id: &StreamId) -> Option<usize> {
        self.handles.iter().position(|h| &h.stream_id == id)
    }

    fn handle_mut(&mut self, id: &StreamId) -> Result<&mut PlayerHandle, RegistryError> {
        self.handles
            .iter_mut()
            .find(|h| &h.stream_id == id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))
    }
}

/// Single authority over which player is audible
///
/// Owned by the viewing session and shared by reference with every player
/// component; there is no process-wide instance.
pub struct AudioExclusivityManager {
    state: Mutex<AudioState>,
    auto_activate_first: bool,
}

impl AudioExclusivityManager {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            state: Mutex::new(AudioState::default()),
            auto_activate_first: config.auto_activate_first,
        }
    }

    /// Register a player
    ///
    /// A new player starts muted unless it is the only registered one and
    /// auto-activation is on. Registering an id again swaps in the new
    /// channel and re-issues the current state over it.
    pub fn register(&self, stream_id: StreamId, channel: PlayerChannel) {
        let mut state = self.state.lock();

        if let Some(index) = state.position(&stream_id) {
            let handle = &mut state.handles[index];
            handle.channel = channel;
            for action in handle.state_commands() {
                deliver(handle, action);
            }
            tracing::debug!(stream = %stream_id, muted = handle.is_muted, "Player re-registered");
            return;
        }

        let activate = self.auto_activate_first && state.handles.is_empty();
        let mut handle = PlayerHandle::new(stream_id.clone(), channel);

        if activate {
            deliver(&mut handle, PlayerAction::Unmute);
            state.active = Some(stream_id.clone());
        } else {
            deliver(&mut handle, PlayerAction::Mute);
        }
        state.handles.push(handle);

        tracing::info!(
            stream = %stream_id,
            active = activate,
            players = state.handles.len(),
            "Player registered"
        );
    }

    /// Remove a player; if it held focus, nothing is audible until a new
    /// stream is chosen
    pub fn unregister(&self, stream_id: &StreamId) -> Option<PlayerHandle> {
        let mut state = self.state.lock();
        let index = state.position(stream_id)?;
        let handle = state.handles.remove(index);

        if state.active.as_ref() == Some(stream_id) {
            state.active = None;
            tracing::info!(stream = %stream_id, "Active player unregistered, audio focus cleared");
        } else {
            tracing::info!(stream = %stream_id, "Player unregistered");
        }

        Some(handle)
    }

    /// Move audio focus to `stream_id`
    ///
    /// Every other unmuted player is muted before the target is unmuted, so
    /// two players are never audible at the same time.
    pub fn set_active_stream(&self, stream_id: &StreamId) -> Result<(), RegistryError> {
        let mut state = self.state.lock();
        Self::activate(&mut state, stream_id)
    }

    fn activate(state: &mut AudioState, stream_id: &StreamId) -> Result<(), RegistryError> {
        let target = state
            .position(stream_id)
            .ok_or_else(|| RegistryError::NotFound(stream_id.clone()))?;

        for (index, handle) in state.handles.iter_mut().enumerate() {
            if index != target && !handle.is_muted {
                deliver(handle, PlayerAction::Mute);
            }
        }
        deliver(&mut state.handles[target], PlayerAction::Unmute);

        let previous = state.active.replace(stream_id.clone());
        tracing::info!(stream = %stream_id, previous = ?previous, "Audio focus changed");
        Ok(())
    }

    /// Mute one player without moving focus
    pub fn mute_stream(&self, stream_id: &StreamId) -> Result<(), RegistryError> {
        let mut state = self.state.lock();
        deliver(state.handle_mut(stream_id)?, PlayerAction::Mute);
        Ok(())
    }

    /// Unmute one player
    ///
    /// Unmuting anything but the focused player moves focus to it.
    pub fn unmute_stream(&self, stream_id: &StreamId) -> Result<(), RegistryError> {
        let mut state = self.state.lock();
        Self::unmute(&mut state, stream_id)
    }

    fn unmute(state: &mut AudioState, stream_id: &StreamId) -> Result<(), RegistryError> {
        if state.active.as_ref() == Some(stream_id) {
            deliver(state.handle_mut(stream_id)?, PlayerAction::Unmute);
            Ok(())
        } else {
            Self::activate(state, stream_id)
        }
    }

    /// Flip the mute state of one player and return the new state
    pub fn toggle_mute(&self, stream_id: &StreamId) -> Result<bool, RegistryError> {
        let mut state = self.state.lock();
        let muted = state.handle_mut(stream_id)?.is_muted;
        if muted {
            Self::unmute(&mut state, stream_id)?;
        } else {
            deliver(state.handle_mut(stream_id)?, PlayerAction::Mute);
        }
        Ok(!muted)
    }

    /// Mute every audible player, keeping focus for a later `unmute_all`
    pub fn mute_all(&self) {
        let mut state = self.state.lock();
        for handle in state.handles.iter_mut().filter(|h| !h.is_muted) {
            deliver(handle, PlayerAction::Mute);
        }
    }

    /// Restore audio of the focused player; returns false when nothing has
    /// focus
    pub fn unmute_all(&self) -> bool {
        let mut state = self.state.lock();
        let Some(active) = state.active.clone() else {
            return false;
        };
        Self::activate(&mut state, &active).is_ok()
    }

    pub fn play(&self, stream_id: &StreamId) -> Result<(), RegistryError> {
        let mut state = self.state.lock();
        deliver(state.handle_mut(stream_id)?, PlayerAction::Play);
        Ok(())
    }

    pub fn pause(&self, stream_id: &StreamId) -> Result<(), RegistryError> {
        let mut state = self.state.lock();
        deliver(state.handle_mut(stream_id)?, PlayerAction::Pause);
        Ok(())
    }

    /// Pause or resume every player
    pub fn set_all_playing(&self, playing: bool) {
        let action = if playing {
            PlayerAction::Play
        } else {
            PlayerAction::Pause
        };
        let mut state = self.state.lock();
        for handle in state.handles.iter_mut() {
            deliver(handle, action);
        }
    }

    pub fn active_stream(&self) -> Option<StreamId> {
        self.state.lock().active.clone()
    }

    pub fn is_muted(&self, stream_id: &StreamId) -> Option<bool> {
        let state = self.state.lock();
        state.position(stream_id).map(|i| state.handles[i].is_muted)
    }

    pub fn is_playing(&self, stream_id: &StreamId) -> Option<bool> {
        let state = self.state.lock();
        state.position(stream_id).map(|i| state.handles[i].is_playing)
    }

    pub fn contains(&self, stream_id: &StreamId) -> bool {
        self.state.lock().position(stream_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.state.lock().handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().handles.is_empty()
    }

    /// Ids of players currently unmuted
    pub fn audible_streams(&self) -> Vec<StreamId> {
        self.state
            .lock()
            .handles
            .iter()
            .filter(|h| !h.is_muted)
            .map(|h| h.stream_id.clone())
            .collect()
    }

    /// Per-player state in registration order
    pub fn snapshot(&self) -> Vec<AudioSnapshot> {
        let state = self.state.lock();
        state
            .handles
            .iter()
            .map(|h| AudioSnapshot {
                stream_id: h.stream_id.clone(),
                is_muted: h.is_muted,
                is_playing: h.is_playing,
                is_active: state.active.as_ref() == Some(&h.stream_id),
            })
            .collect()
    }
}

impl Default for AudioExclusivityManager {
    fn default() -> Self {
        Self::new(&AudioConfig::default())
    }
}

/// Issue a command, swallowing channel failures
fn deliver(handle: &mut PlayerHandle, action: PlayerAction) {
    match handle.issue(action) {
        Ok(()) => {}
        Err(ChannelError::NotReady(id)) => {
            tracing::trace!(stream = %id, ?action, "Channel not ready, command dropped");
        }
        Err(ChannelError::Closed(id)) => {
            tracing::debug!(stream = %id, ?action, "Channel closed, command dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::CommandReceiver;
    use crate::protocol::PlayerCommand;
    use proptest::prelude::*;
    use tokio::sync::mpsc;

    fn id(s: &str) -> StreamId {
        StreamId::new(s)
    }

    fn manual() -> AudioExclusivityManager {
        AudioExclusivityManager::new(&AudioConfig {
            auto_activate_first: false,
        })
    }

    /// Register every id on one shared channel so command order is observable
    fn register_all(manager: &AudioExclusivityManager, ids: &[&str]) -> CommandReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        for s in ids {
            manager.register(id(s), PlayerChannel::ready(tx.clone()));
        }
        rx
    }

    fn drain(rx: &mut CommandReceiver) -> Vec<(PlayerAction, String)> {
        let mut out = Vec::new();
        while let Ok(raw) = rx.try_recv() {
            let cmd = PlayerCommand::from_json(&raw).unwrap();
            out.push((cmd.action, cmd.id.to_string()));
        }
        out
    }

    fn muted_map(manager: &AudioExclusivityManager) -> Vec<(String, bool)> {
        manager
            .snapshot()
            .into_iter()
            .map(|s| (s.stream_id.to_string(), s.is_muted))
            .collect()
    }

    #[test]
    fn test_first_registered_becomes_active() {
        let manager = AudioExclusivityManager::default();
        let mut rx = register_all(&manager, &["a", "b"]);

        assert_eq!(manager.active_stream(), Some(id("a")));
        assert_eq!(
            drain(&mut rx),
            vec![
                (PlayerAction::Unmute, "a".to_string()),
                (PlayerAction::Mute, "b".to_string()),
            ]
        );
        assert_eq!(manager.audible_streams(), vec![id("a")]);
    }

    #[test]
    fn test_switching_scenario() {
        let manager = manual();
        let mut rx = register_all(&manager, &["A", "B", "C"]);
        drain(&mut rx);
        assert_eq!(manager.active_stream(), None);

        manager.set_active_stream(&id("B")).unwrap();
        assert_eq!(drain(&mut rx), vec![(PlayerAction::Unmute, "B".to_string())]);
        assert_eq!(
            muted_map(&manager),
            vec![
                ("A".to_string(), true),
                ("B".to_string(), false),
                ("C".to_string(), true),
            ]
        );

        manager.set_active_stream(&id("C")).unwrap();
        assert_eq!(
            drain(&mut rx),
            vec![
                (PlayerAction::Mute, "B".to_string()),
                (PlayerAction::Unmute, "C".to_string()),
            ]
        );
        assert_eq!(
            muted_map(&manager),
            vec![
                ("A".to_string(), true),
                ("B".to_string(), true),
                ("C".to_string(), false),
            ]
        );
    }

    #[test]
    fn test_unregister_active_clears_focus() {
        let manager = AudioExclusivityManager::default();
        let _rx = register_all(&manager, &["a", "b"]);

        assert!(manager.unregister(&id("a")).is_some());
        assert_eq!(manager.active_stream(), None);
        assert!(manager.audible_streams().is_empty());
        assert!(manager.unregister(&id("a")).is_none());
    }

    #[test]
    fn test_unknown_stream_rejected() {
        let manager = manual();
        assert_eq!(
            manager.set_active_stream(&id("ghost")),
            Err(RegistryError::NotFound(id("ghost")))
        );
        assert!(manager.mute_stream(&id("ghost")).is_err());
    }

    #[test]
    fn test_mute_active_keeps_focus() {
        let manager = AudioExclusivityManager::default();
        let mut rx = register_all(&manager, &["a", "b"]);
        drain(&mut rx);

        manager.mute_stream(&id("a")).unwrap();
        assert_eq!(manager.active_stream(), Some(id("a")));
        assert!(manager.audible_streams().is_empty());

        manager.unmute_stream(&id("a")).unwrap();
        assert_eq!(drain(&mut rx).last(), Some(&(PlayerAction::Unmute, "a".to_string())));
        assert_eq!(manager.audible_streams(), vec![id("a")]);
    }

    #[test]
    fn test_unmute_other_transfers_focus() {
        let manager = AudioExclusivityManager::default();
        let mut rx = register_all(&manager, &["a", "b"]);
        drain(&mut rx);

        manager.unmute_stream(&id("b")).unwrap();
        assert_eq!(manager.active_stream(), Some(id("b")));
        assert_eq!(
            drain(&mut rx),
            vec![
                (PlayerAction::Mute, "a".to_string()),
                (PlayerAction::Unmute, "b".to_string()),
            ]
        );
    }

    #[test]
    fn test_mute_all_and_restore() {
        let manager = AudioExclusivityManager::default();
        let mut rx = register_all(&manager, &["a", "b", "c"]);
        manager.set_active_stream(&id("c")).unwrap();
        drain(&mut rx);

        manager.mute_all();
        assert_eq!(drain(&mut rx), vec![(PlayerAction::Mute, "c".to_string())]);
        assert!(manager.audible_streams().is_empty());

        assert!(manager.unmute_all());
        assert_eq!(manager.audible_streams(), vec![id("c")]);

        manager.unregister(&id("c"));
        assert!(!manager.unmute_all());
    }

    #[test]
    fn test_reregister_reissues_state() {
        let manager = AudioExclusivityManager::default();
        manager.register(id("a"), PlayerChannel::pending());
        assert_eq!(manager.is_muted(&id("a")), Some(false));

        let (channel, mut rx) = PlayerChannel::pair();
        manager.register(id("a"), channel);
        assert_eq!(manager.len(), 1);
        assert_eq!(
            drain(&mut rx),
            vec![
                (PlayerAction::Unmute, "a".to_string()),
                (PlayerAction::Play, "a".to_string()),
            ]
        );
    }

    #[test]
    fn test_toggle_and_playback() {
        let manager = manual();
        let mut rx = register_all(&manager, &["a", "b"]);
        drain(&mut rx);

        assert!(!manager.toggle_mute(&id("b")).unwrap());
        assert_eq!(manager.active_stream(), Some(id("b")));
        assert!(manager.toggle_mute(&id("b")).unwrap());

        manager.pause(&id("a")).unwrap();
        assert_eq!(manager.is_playing(&id("a")), Some(false));
        manager.set_all_playing(true);
        assert_eq!(manager.is_playing(&id("a")), Some(true));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Register(u8),
        Unregister(u8),
        SetActive(u8),
        Mute(u8),
        Unmute(u8),
        MuteAll,
        UnmuteAll,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..5).prop_map(Op::Register),
            (0u8..5).prop_map(Op::Unregister),
            (0u8..5).prop_map(Op::SetActive),
            (0u8..5).prop_map(Op::Mute),
            (0u8..5).prop_map(Op::Unmute),
            Just(Op::MuteAll),
            Just(Op::UnmuteAll),
        ]
    }

    proptest! {
        #[test]
        fn prop_at_most_one_audible(auto in any::<bool>(), ops in prop::collection::vec(op(), 1..60)) {
            let manager = AudioExclusivityManager::new(&AudioConfig { auto_activate_first: auto });
            let (tx, _rx) = mpsc::unbounded_channel();

            for op in ops {
                let key = |n: u8| id(&format!("s{n}"));
                match op {
                    Op::Register(n) => manager.register(key(n), PlayerChannel::ready(tx.clone())),
                    Op::Unregister(n) => { manager.unregister(&key(n)); }
                    Op::SetActive(n) => { let _ = manager.set_active_stream(&key(n)); }
                    Op::Mute(n) => { let _ = manager.mute_stream(&key(n)); }
                    Op::Unmute(n) => { let _ = manager.unmute_stream(&key(n)); }
                    Op::MuteAll => manager.mute_all(),
                    Op::UnmuteAll => { manager.unmute_all(); }
                }

                let snapshot = manager.snapshot();
                let audible: Vec<_> = snapshot.iter().filter(|s| !s.is_muted).collect();
                prop_assert!(audible.len() <= 1);
                for s in &snapshot {
                    if !s.is_active {
                        prop_assert!(s.is_muted);
                    }
                }
            }
        }
    }
}
