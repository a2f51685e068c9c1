//! Fire-and-forget command channel to an embedded player

use tokio::sync::mpsc;

use crate::error::ChannelError;
use crate::protocol::PlayerCommand;

/// Sending half of a player's command channel; carries serialized JSON
pub type CommandSender = mpsc::UnboundedSender<String>;

/// Receiving half, held by the renderer bridge
pub type CommandReceiver = mpsc::UnboundedReceiver<String>;

/// Command channel to one embedded player
///
/// The channel starts out pending until the renderer exists. Commands sent
/// while pending are dropped; the UI layer re-registers the player once the
/// renderer reports it is ready.
#[derive(Debug, Clone, Default)]
pub struct PlayerChannel {
    sender: Option<CommandSender>,
}

impl PlayerChannel {
    /// A channel whose renderer does not exist yet
    pub fn pending() -> Self {
        Self { sender: None }
    }

    /// A channel backed by an existing renderer
    pub fn ready(sender: CommandSender) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// Create a connected channel and the receiver the renderer bridge drains
    pub fn pair() -> (Self, CommandReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::ready(tx), rx)
    }

    /// Attach the renderer once it comes up
    pub fn attach(&mut self, sender: CommandSender) {
        self.sender = Some(sender);
    }

    pub fn is_ready(&self) -> bool {
        self.sender.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Post a command without waiting for any acknowledgement
    pub fn send(&self, command: &PlayerCommand) -> Result<(), ChannelError> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| ChannelError::NotReady(command.id.clone()))?;

        sender
            .send(command.to_json())
            .map_err(|_| ChannelError::Closed(command.id.clone()))
    }
}
