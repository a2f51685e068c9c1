//! Audio focus across concurrently rendered players

pub mod exclusivity;

pub use exclusivity::{AudioExclusivityManager, AudioSnapshot};
