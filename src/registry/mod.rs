//! Active stream registry

pub mod entry;
pub mod store;

pub use entry::StreamEntry;
pub use store::StreamRegistry;
