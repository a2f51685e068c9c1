//! Custom (free-form) layouts
//!
//! In custom mode the caller owns every stream's frame. The engine never
//! moves stored frames; it hands back clamped copies that fit the current
//! viewport, so rotating the device and rotating back restores the
//! original arrangement.

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_WINDOW_SCALE, MIN_WINDOW_SCALE};
use crate::error::{LayoutError, Result};
use crate::layout::geometry::{ChromeInsets, Orientation, Size};
use crate::layout::grid::{LayoutEngine, LayoutMode};
use crate::protocol::{StreamId, StreamPosition};

const CUSTOM_LAYOUT_TYPE: &str = "custom";

/// Round `value` to the nearest multiple of `step`
pub fn snap_to_step(value: f32, step: f32) -> f32 {
    (value / step).round() * step
}

/// Bounds custom frames are clamped into
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CustomBounds {
    pub viewport: Size,
    pub min_size: Size,
    pub snap_step: Option<f32>,
}

impl CustomBounds {
    pub fn new(viewport: Size, min_size: Size, snap_step: Option<f32>) -> std::result::Result<Self, LayoutError> {
        if let Some(step) = snap_step {
            if !step.is_finite() || step <= 0.0 {
                return Err(LayoutError::InvalidStep(step));
            }
        }
        Ok(Self {
            viewport,
            min_size,
            snap_step,
        })
    }

    /// Snap to the grid step, then clamp so the frame lies on-screen
    ///
    /// Clamping runs last, so a frame pressed against the far edge may end
    /// off the snap grid.
    pub fn clamp(&self, position: &StreamPosition) -> StreamPosition {
        let snap = |v: f32| match self.snap_step {
            Some(step) => snap_to_step(v, step),
            None => v,
        };

        let max_width = self.viewport.width.max(0.0);
        let max_height = self.viewport.height.max(0.0);
        let width = snap(position.width).clamp(self.min_size.width.min(max_width), max_width);
        let height = snap(position.height).clamp(self.min_size.height.min(max_height), max_height);
        let x = snap(position.x).clamp(0.0, max_width - width);
        let y = snap(position.y).clamp(0.0, max_height - height);

        StreamPosition {
            stream_id: position.stream_id.clone(),
            x,
            y,
            width,
            height,
            z_index: position.z_index,
            scale: position.scale.clamp(MIN_WINDOW_SCALE, MAX_WINDOW_SCALE),
            opacity: position.opacity.clamp(0.0, 1.0),
        }
    }
}

impl LayoutEngine {
    /// Custom-frame bounds for `viewport` using this engine's settings
    pub fn custom_bounds(&self, viewport: Size) -> std::result::Result<CustomBounds, LayoutError> {
        let config = self.config();
        CustomBounds::new(
            viewport,
            Size::new(config.min_cell_width, config.min_cell_height),
            config.grid_snap_step,
        )
    }

    /// Clamped copies of caller-supplied frames
    pub fn validate_positions(
        &self,
        positions: &[StreamPosition],
        viewport: Size,
    ) -> std::result::Result<Vec<StreamPosition>, LayoutError> {
        let bounds = self.custom_bounds(viewport)?;
        Ok(positions.iter().map(|p| bounds.clamp(p)).collect())
    }
}

/// Layout mode plus, for custom mode, the caller's stored frames
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutConfiguration {
    pub mode: LayoutMode,
    /// Authoritative only in custom mode
    #[serde(default)]
    pub positions: Vec<StreamPosition>,
}

impl LayoutConfiguration {
    pub fn new(mode: LayoutMode) -> Self {
        Self {
            mode,
            positions: Vec::new(),
        }
    }

    pub fn custom(positions: Vec<StreamPosition>) -> Self {
        Self {
            mode: LayoutMode::Custom,
            positions,
        }
    }

    pub fn position_of(&self, id: &StreamId) -> Option<&StreamPosition> {
        self.positions.iter().find(|p| &p.stream_id == id)
    }

    /// Insert or replace the stored frame of one stream
    pub fn set_position(&mut self, position: StreamPosition) {
        match self.positions.iter_mut().find(|p| p.stream_id == position.stream_id) {
            Some(existing) => *existing = position,
            None => self.positions.push(position),
        }
    }

    pub fn remove_stream(&mut self, id: &StreamId) -> Option<StreamPosition> {
        let index = self.positions.iter().position(|p| &p.stream_id == id)?;
        Some(self.positions.remove(index))
    }

    /// Raise one stream above all others
    pub fn bring_to_front(&mut self, id: &StreamId) -> bool {
        let others_top = self
            .positions
            .iter()
            .filter(|p| &p.stream_id != id)
            .map(|p| p.z_index)
            .max();
        match self.positions.iter_mut().find(|p| &p.stream_id == id) {
            Some(position) => {
                if let Some(top) = others_top.filter(|top| position.z_index <= *top) {
                    position.z_index = top + 1;
                }
                true
            }
            None => false,
        }
    }

    /// Switch to custom mode
    ///
    /// Frames stored by an earlier visit to custom mode win. Streams without
    /// one keep the frame they have on screen now (`current`).
    pub fn promote_to_custom(&mut self, current: Vec<StreamPosition>) {
        if self.mode == LayoutMode::Custom {
            return;
        }
        self.mode = LayoutMode::Custom;
        for seed in current {
            if self.position_of(&seed.stream_id).is_none() {
                self.positions.push(seed);
            }
        }
    }

    /// Frames to render for `streams`
    ///
    /// Grid modes derive frames from the computed grid. Custom mode returns
    /// clamped copies of stored frames and seeds streams without one from the
    /// adaptive grid. Stored frames are never modified.
    pub fn resolve(
        &self,
        engine: &LayoutEngine,
        streams: &[StreamId],
        viewport: Size,
        orientation: Orientation,
        insets: ChromeInsets,
    ) -> std::result::Result<Vec<StreamPosition>, LayoutError> {
        let grid = engine.compute_layout(streams.len(), self.mode, viewport, orientation, insets);
        let derived = engine.derive_positions(streams, &grid);

        if self.mode != LayoutMode::Custom {
            return Ok(derived);
        }

        let bounds = engine.custom_bounds(viewport)?;
        Ok(streams
            .iter()
            .zip(derived)
            .map(|(id, seed)| bounds.clamp(self.position_of(id).unwrap_or(&seed)))
            .collect())
    }
}

/// Saved custom layout, as produced and consumed by the caller's storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedLayout {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub layout_type: String,
    pub positions: Vec<StreamPosition>,
    pub is_custom: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PersistedLayout {
    pub fn new(name: impl Into<String>, positions: Vec<StreamPosition>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            layout_type: CUSTOM_LAYOUT_TYPE.to_string(),
            positions,
            is_custom: true,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let layout: Self = serde_json::from_str(raw)?;
        if layout.layout_type != CUSTOM_LAYOUT_TYPE || !layout.is_custom {
            return Err(LayoutError::NotCustom(layout.layout_type).into());
        }
        Ok(layout)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn into_configuration(self) -> LayoutConfiguration {
        LayoutConfiguration::custom(self.positions)
    }
}
