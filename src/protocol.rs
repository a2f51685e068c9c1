//! Wire types shared with the embedded player and the caller
//!
//! Commands flow engine → player as small JSON objects over a fire-and-forget
//! channel. Notifications flow back as arbitrary JSON; only a couple of
//! message types carry meaning for the engine.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Opaque stream identifier assigned by the streaming platform
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(String);

impl StreamId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for StreamId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Stream metadata supplied by the discovery layer
///
/// Field names follow the platform's API payload so the caller can hand the
/// fetched JSON straight through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamIdentity {
    pub id: StreamId,
    /// Login handle, used to build channel and embed URLs
    pub user_login: String,
    /// Display name
    pub user_name: String,
    /// Category label
    #[serde(default)]
    pub game_name: String,
    #[serde(default)]
    pub viewer_count: u64,
    pub started_at: DateTime<Utc>,
    /// Thumbnail URL template with `{width}` and `{height}` placeholders
    #[serde(default)]
    pub thumbnail_url: String,
}

impl StreamIdentity {
    /// Fill the thumbnail template for the requested pixel size
    pub fn thumbnail_url_for(&self, width: u32, height: u32) -> String {
        self.thumbnail_url
            .replace("{width}", &width.to_string())
            .replace("{height}", &height.to_string())
    }

    /// How long the stream has been live at `now`
    pub fn uptime(&self, now: DateTime<Utc>) -> Duration {
        let elapsed = now - self.started_at;
        if elapsed < Duration::zero() {
            Duration::zero()
        } else {
            elapsed
        }
    }

    /// URL used by the "open externally" fallback
    pub fn channel_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.user_login)
    }
}

/// Player command actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerAction {
    Mute,
    Unmute,
    Play,
    Pause,
}

/// Command sent to an embedded player
///
/// Serialized as `{"action":"mute","id":"<stream>"}`. No response is
/// expected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerCommand {
    pub action: PlayerAction,
    pub id: StreamId,
}

impl PlayerCommand {
    pub fn new(action: PlayerAction, id: StreamId) -> Self {
        Self { action, id }
    }

    pub fn to_json(&self) -> String {
        // A two-field struct of a unit enum and a string cannot fail to serialize
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Message posted by an embedded player
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerNotification {
    /// The player finished loading and can accept commands
    Ready,
    /// The player failed to load or play
    Error { message: String },
    /// Any other well-formed message; logged and ignored
    Unrecognized(serde_json::Value),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum KnownNotification {
    PlayerReady,
    PlayerError {
        #[serde(default)]
        message: String,
    },
}

impl PlayerNotification {
    /// Parse a raw notification payload
    ///
    /// Returns an error only for payloads that are not JSON at all.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        match serde_json::from_value::<KnownNotification>(value.clone()) {
            Ok(KnownNotification::PlayerReady) => Ok(Self::Ready),
            Ok(KnownNotification::PlayerError { message }) => Ok(Self::Error { message }),
            Err(_) => Ok(Self::Unrecognized(value)),
        }
    }
}

/// Lifecycle signals from the out-of-process renderer
///
/// These arrive on the renderer's schedule and are not ordered relative to
/// engine-issued commands.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerLifecycle {
    LoadStarted,
    LoadSucceeded,
    LoadFailed(String),
    Message(PlayerNotification),
}

/// Frame of one stream inside a layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamPosition {
    pub stream_id: StreamId,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub z_index: i32,
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
}

fn default_scale() -> f32 {
    1.0
}

fn default_opacity() -> f32 {
    1.0
}

impl StreamPosition {
    pub fn new(stream_id: StreamId, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            stream_id,
            x,
            y,
            width,
            height,
            z_index: 0,
            scale: default_scale(),
            opacity: default_opacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn identity() -> StreamIdentity {
        StreamIdentity {
            id: StreamId::new("4012"),
            user_login: "speedrunner".to_string(),
            user_name: "SpeedRunner".to_string(),
            game_name: "Celeste".to_string(),
            viewer_count: 1200,
            started_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            thumbnail_url: "https://cdn.example/live_user_speedrunner-{width}x{height}.jpg"
                .to_string(),
        }
    }

    #[test]
    fn test_command_wire_format() {
        let cmd = PlayerCommand::new(PlayerAction::Unmute, StreamId::new("abc"));
        assert_eq!(cmd.to_json(), r#"{"action":"unmute","id":"abc"}"#);

        let parsed = PlayerCommand::from_json(r#"{"action":"pause","id":"xyz"}"#).unwrap();
        assert_eq!(parsed.action, PlayerAction::Pause);
        assert_eq!(parsed.id.as_str(), "xyz");
    }

    #[test]
    fn test_notification_parsing() {
        assert_eq!(
            PlayerNotification::parse(r#"{"type":"player_ready"}"#).unwrap(),
            PlayerNotification::Ready
        );
        assert_eq!(
            PlayerNotification::parse(r#"{"type":"player_error","message":"offline"}"#).unwrap(),
            PlayerNotification::Error { message: "offline".to_string() }
        );
        assert!(matches!(
            PlayerNotification::parse(r#"{"type":"volume_changed","volume":0.4}"#).unwrap(),
            PlayerNotification::Unrecognized(_)
        ));
        assert!(PlayerNotification::parse("not json").is_err());
    }

    #[test]
    fn test_identity_helpers() {
        let stream = identity();
        assert_eq!(
            stream.thumbnail_url_for(320, 180),
            "https://cdn.example/live_user_speedrunner-320x180.jpg"
        );
        assert_eq!(
            stream.channel_url("https://www.twitch.tv/"),
            "https://www.twitch.tv/speedrunner"
        );

        let now = Utc.with_ymd_and_hms(2024, 5, 1, 14, 30, 0).unwrap();
        assert_eq!(stream.uptime(now), Duration::minutes(150));

        let before = Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap();
        assert_eq!(stream.uptime(before), Duration::zero());
    }

    #[test]
    fn test_identity_deserializes_api_payload() {
        let raw = r#"{
            "id": "99",
            "user_login": "chef",
            "user_name": "Chef",
            "game_name": "Just Chatting",
            "viewer_count": 42,
            "started_at": "2024-05-01T12:00:00Z",
            "thumbnail_url": "https://cdn.example/{width}x{height}.jpg"
        }"#;
        let stream: StreamIdentity = serde_json::from_str(raw).unwrap();
        assert_eq!(stream.id, StreamId::new("99"));
        assert_eq!(stream.viewer_count, 42);
    }
}
