//! In-memory adapter implementations for tests and embedded use.

mod delivery;
mod directory;
mod store;

pub use delivery::RecordingDelivery;
pub use directory::InMemoryDirectory;
pub use store::InMemoryWorkflowStore;
