//! Grid layout computation

use serde::{Deserialize, Serialize};

use crate::config::LayoutConfig;
use crate::layout::geometry::{ChromeInsets, Orientation, Point, Rect, Size};
use crate::protocol::{StreamId, StreamPosition};

/// Fixed grid shapes, named columns x rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GridShape {
    #[serde(rename = "1x1")]
    Single,
    #[serde(rename = "2x2")]
    Quad,
    #[serde(rename = "3x3")]
    Nine,
    #[serde(rename = "4x4")]
    Sixteen,
    /// Two streams next to each other
    #[serde(rename = "2x1")]
    SideBySide,
    /// Two streams stacked vertically
    #[serde(rename = "1x2")]
    Stacked,
}

impl GridShape {
    /// (columns, rows)
    pub const fn dimensions(self) -> (u32, u32) {
        match self {
            Self::Single => (1, 1),
            Self::Quad => (2, 2),
            Self::Nine => (3, 3),
            Self::Sixteen => (4, 4),
            Self::SideBySide => (2, 1),
            Self::Stacked => (1, 2),
        }
    }

    pub const fn capacity(self) -> usize {
        let (columns, rows) = self.dimensions();
        (columns * rows) as usize
    }
}

/// How stream frames are chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LayoutMode {
    /// Columns and rows fixed by the user's choice
    Fixed { shape: GridShape },
    /// Columns and rows follow stream count and orientation
    #[default]
    Adaptive,
    /// Frames are owned by the caller; the engine only validates them
    Custom,
}

/// Adaptive (columns, rows) for a stream count
///
/// Never shrinks as the count grows, in either orientation.
pub fn adaptive_shape(stream_count: usize, orientation: Orientation) -> (u32, u32) {
    let landscape = orientation == Orientation::Landscape;
    match stream_count {
        0 | 1 => (1, 1),
        2 if landscape => (2, 1),
        2 => (1, 2),
        3 | 4 => (2, 2),
        5 | 6 if landscape => (3, 2),
        5 | 6 => (2, 3),
        _ => (3, 3),
    }
}

/// Derived grid geometry; recomputed, never edited in place
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridDimensions {
    pub columns: u32,
    pub rows: u32,
    pub cell_width: f32,
    pub cell_height: f32,
    pub gap: f32,
    pub padding: f32,
    /// Top-left corner of the first cell, chrome insets included
    pub origin: Point,
    /// The minimum cell floor was applied; the grid needs to scroll
    pub overflows: bool,
}

impl GridDimensions {
    /// Placeholder for an empty grid; callers render an empty state instead
    pub fn empty(gap: f32, padding: f32, origin: Point) -> Self {
        Self {
            columns: 1,
            rows: 1,
            cell_width: 0.0,
            cell_height: 0.0,
            gap,
            padding,
            origin,
            overflows: false,
        }
    }

    pub fn capacity(&self) -> usize {
        (self.columns * self.rows) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.cell_width == 0.0 || self.cell_height == 0.0
    }

    /// Frame of the cell at `index`, filling rows left to right
    ///
    /// Indexes past the last row continue downward, which is where an
    /// overfull grid scrolls to.
    pub fn cell_frame(&self, index: usize) -> Rect {
        let columns = self.columns.max(1) as usize;
        let column = (index % columns) as f32;
        let row = (index / columns) as f32;
        Rect::new(
            self.origin.x + column * (self.cell_width + self.gap),
            self.origin.y + row * (self.cell_height + self.gap),
            self.cell_width,
            self.cell_height,
        )
    }

    /// Total size of the cell area, without padding or insets
    pub fn content_size(&self) -> Size {
        let columns = self.columns as f32;
        let rows = self.rows as f32;
        Size::new(
            columns * self.cell_width + (columns - 1.0) * self.gap,
            rows * self.cell_height + (rows - 1.0) * self.gap,
        )
    }
}

/// Grid geometry calculator
#[derive(Debug, Clone, Default)]
pub struct LayoutEngine {
    config: LayoutConfig,
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Compute grid geometry for `stream_count` streams
    ///
    /// Cell sizes are floored to whole units, then raised to the minimum
    /// cell size if needed. Raising can make the grid larger than the
    /// viewport; `overflows` reports it.
    pub fn compute_layout(
        &self,
        stream_count: usize,
        mode: LayoutMode,
        viewport: Size,
        orientation: Orientation,
        insets: ChromeInsets,
    ) -> GridDimensions {
        let gap = self.config.gap;
        let padding = self.config.padding;
        let origin = Point::new(insets.left + padding, insets.top + padding);

        if stream_count == 0 {
            return GridDimensions::empty(gap, padding, origin);
        }

        let (columns, rows) = match mode {
            LayoutMode::Fixed { shape } => shape.dimensions(),
            LayoutMode::Adaptive | LayoutMode::Custom => adaptive_shape(stream_count, orientation),
        };

        let available_width = viewport.width - 2.0 * padding - insets.horizontal_total();
        let available_height = viewport.height - 2.0 * padding - insets.vertical_total();

        let raw_width = cell_extent(available_width, columns, gap);
        let raw_height = cell_extent(available_height, rows, gap);

        let cell_width = raw_width.max(self.config.min_cell_width);
        let cell_height = raw_height.max(self.config.min_cell_height);
        let overflows = raw_width < self.config.min_cell_width
            || raw_height < self.config.min_cell_height;

        if overflows {
            tracing::debug!(
                stream_count,
                columns,
                rows,
                raw_width,
                raw_height,
                "Viewport below minimum cell size, layout will overflow"
            );
        }

        GridDimensions {
            columns,
            rows,
            cell_width,
            cell_height,
            gap,
            padding,
            origin,
            overflows,
        }
    }

    /// Frames for `streams` in grid order
    pub fn derive_positions(&self, streams: &[StreamId], grid: &GridDimensions) -> Vec<StreamPosition> {
        streams
            .iter()
            .enumerate()
            .map(|(index, id)| {
                let frame = grid.cell_frame(index);
                let mut position = StreamPosition::new(
                    id.clone(),
                    frame.origin.x,
                    frame.origin.y,
                    frame.size.width,
                    frame.size.height,
                );
                position.z_index = index as i32;
                position
            })
            .collect()
    }
}

fn cell_extent(available: f32, count: u32, gap: f32) -> f32 {
    let count = count.max(1) as f32;
    ((available - gap * (count - 1.0)) / count).floor()
}
