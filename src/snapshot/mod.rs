//! Feature Snapshot Module
//!
//! Detecting what changed in the feature catalog between two snapshots:
//! - Snapshot persistence (versioned, checksummed blobs)
//! - Feature diff engine (comparing snapshots)

pub mod diff;
pub mod store;

pub use diff::DiffEngine;
pub use store::{
    BlobStore, DiffRecord, FeatureSnapshot, FileBlobStore, InMemoryBlobStore, SnapshotStore,
};
