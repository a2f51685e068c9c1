//! Drag, resize and edge-snap state machine for one floating window
//!
//! Gestures arrive as a start event, any number of synchronous updates, and
//! an end event. A drag and a resize never overlap: starting one while the
//! other is in progress is ignored. Geometry reported at the end of a
//! gesture always lies fully inside the viewport.

use serde::{Deserialize, Serialize};

use crate::config::FloatingConfig;
use crate::layout::{Point, Size};

/// Interaction state of a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GestureState {
    Idle,
    Dragging,
    Resizing,
}

/// Snapshot of a floating window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloatingWindowState {
    pub position: Point,
    pub size: Size,
    pub is_dragging: bool,
    pub is_resizing: bool,
}

/// Geometry change reported to the caller
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowUpdate {
    /// A drag ended at this (snapped) position
    Moved { position: Point },
    /// The size changed; `position` is set when keeping the window on-screen
    /// moved it as well
    Resized { size: Size, position: Option<Point> },
}

/// Grow and shrink buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeStep {
    Grow,
    Shrink,
}

/// Controller for one floating window
#[derive(Debug, Clone)]
pub struct FloatingWindowController {
    config: FloatingConfig,
    viewport: Size,
    position: Point,
    size: Size,
    gesture: GestureState,
    /// Pointer offset from the window's top-left corner, captured at drag start
    grab_offset: Point,
    /// Size at resize start; pinch scales are relative to it
    base_size: Size,
}

impl FloatingWindowController {
    /// Create a window, pulled inside the viewport if necessary
    pub fn new(config: FloatingConfig, viewport: Size, position: Point, size: Size) -> Self {
        let mut controller = Self {
            config,
            viewport,
            position,
            size,
            gesture: GestureState::Idle,
            grab_offset: Point::default(),
            base_size: size,
        };
        controller.size = controller.clamp_size(size);
        controller.position = controller.clamp_position(position);
        controller.base_size = controller.size;
        controller
    }

    /// Default-sized window in the bottom-right corner
    pub fn docked(config: FloatingConfig, viewport: Size) -> Self {
        let size = Size::new(config.default_width, config.default_height);
        let corner = Point::new(viewport.width - size.width, viewport.height - size.height);
        Self::new(config, viewport, corner, size)
    }

    pub fn state(&self) -> FloatingWindowState {
        FloatingWindowState {
            position: self.position,
            size: self.size,
            is_dragging: self.gesture == GestureState::Dragging,
            is_resizing: self.gesture == GestureState::Resizing,
        }
    }

    pub fn gesture(&self) -> GestureState {
        self.gesture
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    // ---- drag ----

    /// Start a drag at `pointer`; ignored unless idle
    pub fn begin_drag(&mut self, pointer: Point) -> bool {
        if self.gesture != GestureState::Idle {
            return false;
        }
        self.grab_offset = Point::new(pointer.x - self.position.x, pointer.y - self.position.y);
        self.gesture = GestureState::Dragging;
        true
    }

    /// Follow the pointer, clamped to the viewport; no snapping mid-drag
    pub fn drag_to(&mut self, pointer: Point) {
        if self.gesture != GestureState::Dragging {
            return;
        }
        let candidate = Point::new(pointer.x - self.grab_offset.x, pointer.y - self.grab_offset.y);
        self.position = self.clamp_position(candidate);
    }

    /// Finish the drag, snapping to nearby edges
    ///
    /// Returns the final position exactly once per drag.
    pub fn end_drag(&mut self) -> Option<WindowUpdate> {
        if self.gesture != GestureState::Dragging {
            return None;
        }
        self.gesture = GestureState::Idle;
        let clamped = self.clamp_position(self.position);
        self.position = self.snap_to_edges(clamped);

        tracing::debug!(x = self.position.x, y = self.position.y, "Floating window moved");
        Some(WindowUpdate::Moved {
            position: self.position,
        })
    }

    // ---- pinch resize ----

    /// Start a pinch resize; ignored unless idle
    pub fn begin_resize(&mut self) -> bool {
        if self.gesture != GestureState::Idle {
            return false;
        }
        self.base_size = self.size;
        self.gesture = GestureState::Resizing;
        true
    }

    /// Apply a pinch scale relative to the size at gesture start
    pub fn resize_by(&mut self, scale: f32) {
        if self.gesture != GestureState::Resizing {
            return;
        }
        // Unvalidated configs may carry the bounds swapped
        let low = self.config.min_scale.min(self.config.max_scale);
        let high = self.config.min_scale.max(self.config.max_scale);
        let scale = scale.clamp(low, high);
        self.size = self.clamp_size(self.base_size.scale(scale));
    }

    /// Finish the resize; reports the new size once per gesture
    pub fn end_resize(&mut self) -> Option<WindowUpdate> {
        if self.gesture != GestureState::Resizing {
            return None;
        }
        self.gesture = GestureState::Idle;
        let update = self.settle_size(self.size);
        tracing::debug!(
            width = self.size.width,
            height = self.size.height,
            "Floating window resized"
        );
        Some(update)
    }

    /// Grow or shrink by the configured step factor
    ///
    /// Ignored during a gesture.
    pub fn step_resize(&mut self, step: ResizeStep) -> Option<WindowUpdate> {
        if self.gesture != GestureState::Idle {
            return None;
        }
        let factor = match step {
            ResizeStep::Grow => self.config.grow_factor,
            ResizeStep::Shrink => self.config.shrink_factor,
        };
        let target = self.clamp_size(self.size.scale(factor));
        if target == self.size {
            return None;
        }
        Some(self.settle_size(target))
    }

    // ---- viewport / lifecycle ----

    /// Adopt a new viewport (rotation, split screen) and pull the window
    /// back inside it
    ///
    /// A gesture in progress ends here: a drag is clamped and snapped against
    /// the new viewport and reported as if released, a resize reports its
    /// settled size. The later end event then returns `None`.
    pub fn set_viewport(&mut self, viewport: Size) -> Option<WindowUpdate> {
        self.viewport = viewport;
        let gesture = std::mem::replace(&mut self.gesture, GestureState::Idle);

        let size = self.clamp_size(self.size);
        let resized = size != self.size;
        self.size = size;

        let mut position = self.clamp_position(self.position);
        if gesture == GestureState::Dragging {
            position = self.snap_to_edges(position);
        }
        let moved = position != self.position;
        self.position = position;

        if gesture != GestureState::Idle {
            tracing::debug!(?gesture, "Gesture settled by viewport change");
        }
        match gesture {
            GestureState::Dragging if resized => Some(WindowUpdate::Resized {
                size,
                position: Some(position),
            }),
            GestureState::Dragging => Some(WindowUpdate::Moved { position }),
            GestureState::Resizing => Some(WindowUpdate::Resized {
                size,
                position: moved.then_some(position),
            }),
            GestureState::Idle if resized => Some(WindowUpdate::Resized {
                size,
                position: moved.then_some(position),
            }),
            GestureState::Idle if moved => Some(WindowUpdate::Moved { position }),
            GestureState::Idle => None,
        }
    }

    /// Close the window, returning its last state for the caller to persist
    pub fn close(mut self) -> FloatingWindowState {
        if self.gesture == GestureState::Dragging {
            self.position = self.snap_to_edges(self.clamp_position(self.position));
        }
        self.gesture = GestureState::Idle;
        self.state()
    }

    // ---- helpers ----

    fn settle_size(&mut self, size: Size) -> WindowUpdate {
        let position = self.clamp_position_for(self.position, size);
        let moved = position != self.position;
        self.size = size;
        self.position = position;
        WindowUpdate::Resized {
            size,
            position: moved.then_some(position),
        }
    }

    /// Clamp to the configured size range and to the viewport
    fn clamp_size(&self, size: Size) -> Size {
        let max_width = self.config.max_width.min(self.viewport.width).max(0.0);
        let max_height = self.config.max_height.min(self.viewport.height).max(0.0);
        Size::new(
            size.width.clamp(self.config.min_width.min(max_width), max_width),
            size.height.clamp(self.config.min_height.min(max_height), max_height),
        )
    }

    fn clamp_position(&self, position: Point) -> Point {
        self.clamp_position_for(position, self.size)
    }

    fn clamp_position_for(&self, position: Point, size: Size) -> Point {
        let max_x = (self.viewport.width - size.width).max(0.0);
        let max_y = (self.viewport.height - size.height).max(0.0);
        Point::new(position.x.clamp(0.0, max_x), position.y.clamp(0.0, max_y))
    }

    /// Snap each axis independently to an edge within the threshold
    fn snap_to_edges(&self, position: Point) -> Point {
        let threshold = self.config.snap_threshold;
        let max_x = (self.viewport.width - self.size.width).max(0.0);
        let max_y = (self.viewport.height - self.size.height).max(0.0);
        Point::new(
            snap_axis(position.x, max_x, threshold),
            snap_axis(position.y, max_y, threshold),
        )
    }
}

fn snap_axis(value: f32, max: f32, threshold: f32) -> f32 {
    if value <= threshold {
        0.0
    } else if max - value <= threshold {
        max
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SCREEN: Size = Size::new(400.0, 800.0);

    fn window(x: f32, y: f32) -> FloatingWindowController {
        FloatingWindowController::new(
            FloatingConfig::default(),
            SCREEN,
            Point::new(x, y),
            Size::new(200.0, 100.0),
        )
    }

    fn drag(controller: &mut FloatingWindowController, from: Point, to: Point) -> Option<WindowUpdate> {
        assert!(controller.begin_drag(from));
        controller.drag_to(Point::new((from.x + to.x) / 2.0, (from.y + to.y) / 2.0));
        controller.drag_to(to);
        controller.end_drag()
    }

    #[test]
    fn test_drag_keeps_grab_offset() {
        let mut w = window(100.0, 300.0);
        let update = drag(&mut w, Point::new(150.0, 320.0), Point::new(130.0, 420.0));
        assert_eq!(update, Some(WindowUpdate::Moved { position: Point::new(80.0, 400.0) }));
        assert_eq!(w.gesture(), GestureState::Idle);
    }

    #[test]
    fn test_drag_snaps_to_edges() {
        let mut w = window(100.0, 300.0);
        // Ends at x = 15 (snaps to 0) and y = 690 (10 from bottom edge 700)
        let update = drag(&mut w, Point::new(100.0, 300.0), Point::new(15.0, 690.0));
        assert_eq!(update, Some(WindowUpdate::Moved { position: Point::new(0.0, 700.0) }));
    }

    #[test]
    fn test_drag_clamps_off_screen_pointer() {
        let mut w = window(100.0, 300.0);
        assert!(w.begin_drag(Point::new(110.0, 310.0)));
        w.drag_to(Point::new(-500.0, 5000.0));
        assert_eq!(w.position(), Point::new(0.0, 700.0));
        assert!(w.state().is_dragging);
        w.end_drag();
    }

    #[test]
    fn test_end_reported_once() {
        let mut w = window(100.0, 300.0);
        assert!(drag(&mut w, Point::new(100.0, 300.0), Point::new(120.0, 320.0)).is_some());
        assert_eq!(w.end_drag(), None);
    }

    #[test]
    fn test_gestures_are_exclusive() {
        let mut w = window(100.0, 300.0);
        assert!(w.begin_drag(Point::new(100.0, 300.0)));
        assert!(!w.begin_resize());
        w.resize_by(2.0);
        assert_eq!(w.size(), Size::new(200.0, 100.0));
        assert_eq!(w.end_resize(), None);
        assert!(w.end_drag().is_some());

        assert!(w.begin_resize());
        assert!(!w.begin_drag(Point::new(0.0, 0.0)));
        assert_eq!(w.step_resize(ResizeStep::Grow), None);
        assert!(w.end_resize().is_some());
    }

    #[test]
    fn test_pinch_scale_is_bounded() {
        let mut w = window(0.0, 0.0);
        assert!(w.begin_resize());
        w.resize_by(10.0);
        // 2.0x of 200x100 is 400x200; width also hits the 400 viewport
        assert_eq!(w.size(), Size::new(400.0, 200.0));
        w.resize_by(0.01);
        // 0.3x gives 60x30, raised to the 160x90 minimum
        assert_eq!(w.size(), Size::new(160.0, 90.0));
        assert_eq!(
            w.end_resize(),
            Some(WindowUpdate::Resized { size: Size::new(160.0, 90.0), position: None })
        );
    }

    #[test]
    fn test_resize_end_pulls_window_on_screen() {
        let mut w = window(200.0, 700.0);
        assert!(w.begin_resize());
        w.resize_by(1.5);
        assert_eq!(
            w.end_resize(),
            Some(WindowUpdate::Resized {
                size: Size::new(300.0, 150.0),
                position: Some(Point::new(100.0, 650.0)),
            })
        );
        assert!(w.state().position.x + w.size().width <= SCREEN.width);
    }

    fn close_to(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_step_resize() {
        let mut w = window(0.0, 0.0);
        match w.step_resize(ResizeStep::Grow) {
            Some(WindowUpdate::Resized { size, position: None }) => {
                assert!(close_to(size.width, 240.0) && close_to(size.height, 120.0));
            }
            other => panic!("unexpected update: {other:?}"),
        }

        let mut corner = window(200.0, 700.0);
        match corner.step_resize(ResizeStep::Grow) {
            Some(WindowUpdate::Resized { position: Some(position), .. }) => {
                assert!(close_to(position.x, 160.0) && close_to(position.y, 680.0));
            }
            other => panic!("unexpected update: {other:?}"),
        }
        assert!(corner.position().x + corner.size().width <= SCREEN.width);

        let mut small = FloatingWindowController::new(
            FloatingConfig::default(),
            SCREEN,
            Point::new(0.0, 0.0),
            Size::new(160.0, 90.0),
        );
        assert_eq!(small.step_resize(ResizeStep::Shrink), None);
    }

    #[test]
    fn test_rotation_reclamps() {
        let mut w = window(200.0, 700.0);
        let update = w.set_viewport(Size::new(800.0, 400.0));
        assert_eq!(update, Some(WindowUpdate::Moved { position: Point::new(200.0, 300.0) }));
        assert_eq!(w.set_viewport(Size::new(800.0, 400.0)), None);
    }

    #[test]
    fn test_rotation_settles_drag_in_progress() {
        let mut w = window(100.0, 300.0);
        assert!(w.begin_drag(Point::new(100.0, 300.0)));
        w.drag_to(Point::new(10.0, 50.0));

        // Same viewport, but the drag still ends here with x snapped to the edge
        assert_eq!(
            w.set_viewport(SCREEN),
            Some(WindowUpdate::Moved { position: Point::new(0.0, 50.0) })
        );
        assert_eq!(w.gesture(), GestureState::Idle);
        assert_eq!(w.end_drag(), None);
        assert_eq!(w.position(), Point::new(0.0, 50.0));
    }

    #[test]
    fn test_rotation_settles_resize_in_progress() {
        let mut w = window(200.0, 700.0);
        assert!(w.begin_resize());
        w.resize_by(1.5);

        assert_eq!(
            w.set_viewport(Size::new(800.0, 400.0)),
            Some(WindowUpdate::Resized {
                size: Size::new(300.0, 150.0),
                position: Some(Point::new(200.0, 250.0)),
            })
        );
        assert_eq!(w.end_resize(), None);
    }

    #[test]
    fn test_swapped_scale_bounds_do_not_panic() {
        let config = FloatingConfig {
            min_scale: 2.0,
            max_scale: 0.5,
            ..FloatingConfig::default()
        };
        let mut w = FloatingWindowController::new(config, SCREEN, Point::new(0.0, 0.0), Size::new(200.0, 100.0));
        assert!(w.begin_resize());
        w.resize_by(10.0);
        assert_eq!(w.size(), Size::new(400.0, 200.0));
        w.resize_by(0.1);
        // 0.5x gives 100x50, raised to the 160x90 minimum
        assert_eq!(w.size(), Size::new(160.0, 90.0));
    }

    #[test]
    fn test_docked_and_close() {
        let w = FloatingWindowController::docked(FloatingConfig::default(), SCREEN);
        assert_eq!(w.position(), Point::new(160.0, 665.0));

        let mut w = window(100.0, 300.0);
        w.begin_drag(Point::new(100.0, 300.0));
        w.drag_to(Point::new(5.0, 300.0));
        let last = w.close();
        assert_eq!(last.position, Point::new(0.0, 300.0));
        assert!(!last.is_dragging);
    }

    proptest! {
        #[test]
        fn prop_drag_end_on_screen(
            start_x in 0f32..200.0,
            start_y in 0f32..700.0,
            path in prop::collection::vec((-1000f32..1400.0, -1000f32..1800.0), 1..20),
        ) {
            let mut w = window(start_x, start_y);
            prop_assert!(w.begin_drag(Point::new(start_x + 10.0, start_y + 10.0)));
            let mut last = Point::default();
            for (x, y) in path {
                w.drag_to(Point::new(x, y));
                last = w.position();
            }
            let Some(WindowUpdate::Moved { position }) = w.end_drag() else {
                return Err(TestCaseError::fail("drag end not reported"));
            };

            let max_x = SCREEN.width - 200.0;
            let max_y = SCREEN.height - 100.0;
            prop_assert!((0.0..=max_x).contains(&position.x));
            prop_assert!((0.0..=max_y).contains(&position.y));

            let threshold = FloatingConfig::default().snap_threshold;
            if last.x <= threshold {
                prop_assert_eq!(position.x, 0.0);
            } else if max_x - last.x <= threshold {
                prop_assert_eq!(position.x, max_x);
            }
            if last.y <= threshold {
                prop_assert_eq!(position.y, 0.0);
            } else if max_y - last.y <= threshold {
                prop_assert_eq!(position.y, max_y);
            }
        }
    }
}
