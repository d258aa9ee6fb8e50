//! Collaborator interfaces and inter-round persistence

pub mod catalog;
pub mod checkpoint;

pub use catalog::SceneCatalog;
pub use checkpoint::CheckpointStore;
