//! # Multistream Engine
//!
//! Playback coordination for watching several live streams at once.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                           VIEWING SESSION (screen)                           │
//! │                                                                             │
//! │  ┌──────────────────┐      add / remove       ┌──────────────────────────┐  │
//! │  │  StreamRegistry  │◄───────────────────────►│   PlaybackSupervisor     │  │
//! │  │ (registry)       │                         │ (player::supervisor)     │  │
//! │  │  ids, favorite,  │                         │  load timeout, retry,    │  │
//! │  │  quality, frame  │                         │  auto-hide timers        │  │
//! │  └────────┬─────────┘                         └────────────┬─────────────┘  │
//! │           │ stream count                                   │ ready/failed   │
//! │           ▼                                                ▼                │
//! │  ┌──────────────────┐                         ┌──────────────────────────┐  │
//! │  │  LayoutEngine    │  bounds                 │ AudioExclusivityManager  │  │
//! │  │ (layout)         │─────────┐               │ (audio)                  │  │
//! │  │  grid / custom   │         │               │  one audible player      │  │
//! │  └──────────────────┘         ▼               └────────────┬─────────────┘  │
//! │                      ┌──────────────────┐                  │ mute/unmute    │
//! │                      │ FloatingWindow   │                  │ play/pause     │
//! │                      │ Controller       │                  │                │
//! │                      │ (floating)       │                  │                │
//! │                      └──────────────────┘                  │                │
//! │  ┌──────────────────┐                                      │                │
//! │  │ HealthAggregator │──► subscribers (status indicator)    │                │
//! │  │ (health)         │                                      │                │
//! │  └──────────────────┘                                      │                │
//! └────────────────────────────────────────────────────────────┼────────────────┘
//!                                                              │ JSON commands
//!                                                              ▼
//!            ┌──────────────┐  ┌──────────────┐  ┌──────────────┐
//!            │  Player A    │  │  Player B    │  │  Player C    │
//!            │ (renderer)   │  │ (renderer)   │  │ (renderer)   │
//!            └──────┬───────┘  └──────┬───────┘  └──────┬───────┘
//!                   └─────── notifications (player_ready, player_error) ───► session
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod floating;
pub mod health;
pub mod layout;
pub mod player;
pub mod protocol;
pub mod registry;
pub mod session;

pub use error::{Error, Result};
pub use protocol::{StreamId, StreamIdentity};
pub use player::PlayerEvent;
pub use session::ViewingSession;

/// Application-wide constants
pub mod constants {
    /// Maximum number of simultaneously registered streams (a full 4x4 grid)
    pub const MAX_STREAMS: usize = 16;

    /// Default space between grid cells in logical units
    pub const DEFAULT_GRID_GAP: f32 = 8.0;

    /// Default space between the grid and the viewport edge
    pub const DEFAULT_GRID_PADDING: f32 = 8.0;

    /// Minimum cell size on each axis; layouts overflow rather than shrink below it
    pub const MIN_CELL_SIZE: f32 = 100.0;

    /// Distance from an edge within which a released window snaps to it
    pub const EDGE_SNAP_THRESHOLD: f32 = 20.0;

    /// Smallest scale factor a window or custom frame may take
    pub const MIN_WINDOW_SCALE: f32 = 0.3;

    /// Largest scale factor a window or custom frame may take
    pub const MAX_WINDOW_SCALE: f32 = 2.0;

    /// Time without a ready signal before a player load counts as failed
    pub const DEFAULT_LOAD_TIMEOUT_MS: u64 = 15_000;

    /// Automatic retries after a failed load
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// First retry delay, doubled for each further attempt
    pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;

    /// Idle time before player controls hide
    pub const DEFAULT_CONTROLS_AUTO_HIDE_MS: u64 = 3_000;
}
