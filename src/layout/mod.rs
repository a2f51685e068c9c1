//! Layout geometry
//!
//! Turns stream count, layout mode, viewport and chrome insets into grid
//! geometry, and validates caller-owned positions for custom layouts. All
//! functions here are pure; nothing is cached between calls.

pub mod custom;
pub mod geometry;
pub mod grid;

pub use custom::{snap_to_step, CustomBounds, LayoutConfiguration, PersistedLayout};
pub use geometry::{ChromeInsets, Orientation, Point, Rect, Size};
pub use grid::{adaptive_shape, GridDimensions, GridShape, LayoutEngine, LayoutMode};
