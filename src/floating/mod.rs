//! Floating and picture-in-picture windows

pub mod window;

pub use window::{FloatingWindowController, FloatingWindowState, GestureState, ResizeStep, WindowUpdate};
