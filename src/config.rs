//! Engine configuration
//!
//! Every tunable constant of the engine lives here so a single documented set
//! applies to all layouts, windows and players. The whole structure
//! round-trips through TOML.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{Error, Result};

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub registry: RegistryConfig,
    pub layout: LayoutConfig,
    pub floating: FloatingConfig,
    pub playback: PlaybackConfig,
    pub audio: AudioConfig,
    pub health: HealthConfig,
}

impl EngineConfig {
    /// Default config file location for the current platform
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("tv", "multistream", "multistream-engine")
            .map(|dirs| dirs.config_dir().join("engine.toml"))
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Save configuration as TOML, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.registry.max_streams == 0 {
            return Err(Error::Config("registry.max_streams must be at least 1".into()));
        }
        if self.layout.min_cell_width <= 0.0 || self.layout.min_cell_height <= 0.0 {
            return Err(Error::Config("layout minimum cell size must be positive".into()));
        }
        if self.layout.gap < 0.0 || self.layout.padding < 0.0 {
            return Err(Error::Config("layout gap and padding must not be negative".into()));
        }
        let floating = &self.floating;
        if floating.min_scale <= 0.0 || floating.min_scale > floating.max_scale {
            return Err(Error::Config(format!(
                "floating scale range is invalid: [{}, {}]",
                floating.min_scale, floating.max_scale
            )));
        }
        if floating.min_width > floating.max_width || floating.min_height > floating.max_height {
            return Err(Error::Config("floating minimum size exceeds maximum size".into()));
        }
        if floating.grow_factor <= 1.0 || floating.shrink_factor <= 0.0 || floating.shrink_factor >= 1.0
        {
            return Err(Error::Config("floating step factors must grow above 1 and shrink below 1".into()));
        }
        Ok(())
    }
}

/// Stream registry limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub max_streams: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_streams: MAX_STREAMS,
        }
    }
}

/// Grid geometry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Space between neighbouring cells
    pub gap: f32,
    /// Space between the grid and the viewport edges
    pub padding: f32,
    /// Floor applied to computed cell widths
    pub min_cell_width: f32,
    /// Floor applied to computed cell heights
    pub min_cell_height: f32,
    /// Snap step for custom positions, if any
    pub grid_snap_step: Option<f32>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            gap: DEFAULT_GRID_GAP,
            padding: DEFAULT_GRID_PADDING,
            min_cell_width: MIN_CELL_SIZE,
            min_cell_height: MIN_CELL_SIZE,
            grid_snap_step: None,
        }
    }
}

/// Floating and picture-in-picture window behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloatingConfig {
    /// Distance from an edge within which a released window snaps to it
    pub snap_threshold: f32,
    pub min_scale: f32,
    pub max_scale: f32,
    /// Factor applied by the grow button
    pub grow_factor: f32,
    /// Factor applied by the shrink button
    pub shrink_factor: f32,
    pub min_width: f32,
    pub min_height: f32,
    pub max_width: f32,
    pub max_height: f32,
    pub default_width: f32,
    pub default_height: f32,
}

impl Default for FloatingConfig {
    fn default() -> Self {
        Self {
            snap_threshold: EDGE_SNAP_THRESHOLD,
            min_scale: MIN_WINDOW_SCALE,
            max_scale: MAX_WINDOW_SCALE,
            grow_factor: 1.2,
            shrink_factor: 0.8,
            min_width: 160.0,
            min_height: 90.0,
            max_width: 960.0,
            max_height: 540.0,
            default_width: 240.0,
            default_height: 135.0,
        }
    }
}

/// Player loading, retry and controls timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Time without a ready signal before a load counts as failed
    pub load_timeout_ms: u64,
    /// Automatic retries after the first failed load
    pub max_retries: u32,
    /// First retry delay; doubles on every further retry
    pub retry_base_delay_ms: u64,
    /// Idle time before on-screen controls hide
    pub controls_auto_hide_ms: u64,
    /// Base URL for the "open externally" fallback
    pub external_base_url: String,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            load_timeout_ms: DEFAULT_LOAD_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            controls_auto_hide_ms: DEFAULT_CONTROLS_AUTO_HIDE_MS,
            external_base_url: "https://www.twitch.tv".to_string(),
        }
    }
}

impl PlaybackConfig {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn controls_auto_hide(&self) -> Duration {
        Duration::from_millis(self.controls_auto_hide_ms)
    }

    /// Delay before retry number `retry` (1-based)
    pub fn retry_delay(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(16);
        Duration::from_millis(self.retry_base_delay_ms.saturating_mul(1u64 << shift))
    }
}

/// Audio focus policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Make the first registered player audible without an explicit choice
    pub auto_activate_first: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            auto_activate_first: true,
        }
    }
}

/// Thresholds used by health scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Dropped frames above this count are penalized
    pub max_dropped_frames: u32,
    /// Player latency above this is penalized
    pub max_latency_ms: u32,
    /// Buffer health below this fraction (0..=1) is penalized
    pub min_buffer_health: f32,
    /// Bandwidth probe latency above this is penalized
    pub max_bandwidth_latency_ms: u32,
    /// Jitter above this is penalized
    pub max_jitter_ms: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            max_dropped_frames: 5,
            max_latency_ms: 300,
            min_buffer_health: 0.5,
            max_bandwidth_latency_ms: 300,
            max_jitter_ms: 50,
        }
    }
}
