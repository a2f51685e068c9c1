//! Per-stream player handle

use crate::error::ChannelError;
use crate::player::channel::PlayerChannel;
use crate::protocol::{PlayerAction, PlayerCommand, StreamId};

/// One mounted player
///
/// Exactly one handle exists per active stream. The mute flag mirrors the
/// last command issued, not an acknowledgement from the renderer.
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    pub stream_id: StreamId,
    pub is_playing: bool,
    pub is_muted: bool,
    pub channel: PlayerChannel,
}

impl PlayerHandle {
    /// New handle: muted and playing, the state an embedded player starts in
    pub fn new(stream_id: StreamId, channel: PlayerChannel) -> Self {
        Self {
            stream_id,
            is_playing: true,
            is_muted: true,
            channel,
        }
    }

    /// Send one command and update the local flags
    ///
    /// The flags change even if the channel is not ready yet, so the state is
    /// re-issued correctly once the renderer attaches.
    pub(crate) fn issue(&mut self, action: PlayerAction) -> Result<(), ChannelError> {
        match action {
            PlayerAction::Mute => self.is_muted = true,
            PlayerAction::Unmute => self.is_muted = false,
            PlayerAction::Play => self.is_playing = true,
            PlayerAction::Pause => self.is_playing = false,
        }
        self.channel
            .send(&PlayerCommand::new(action, self.stream_id.clone()))
    }

    /// Commands that bring a freshly attached renderer in line with the flags
    pub(crate) fn state_commands(&self) -> [PlayerAction; 2] {
        [
            if self.is_muted {
                PlayerAction::Mute
            } else {
                PlayerAction::Unmute
            },
            if self.is_playing {
                PlayerAction::Play
            } else {
                PlayerAction::Pause
            },
        ]
    }
}
