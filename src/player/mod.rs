//! Embedded player plumbing
//!
//! Each stream is rendered by an out-of-process player reached only through
//! an asynchronous command channel. This module holds the channel and handle
//! abstractions plus the supervisor that tracks load state, retries and
//! controls timers.

pub mod channel;
pub mod handle;
pub mod supervisor;

pub use channel::{CommandReceiver, CommandSender, PlayerChannel};
pub use handle::PlayerHandle;
pub use supervisor::{LoadState, PlaybackSupervisor, PlayerEvent};
