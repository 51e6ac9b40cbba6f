//! Reconciliation against the live feature store
//!
//! Turns the comparator's Removed/Added pairs into moves, splits and hard
//! deletions.

pub mod fetcher;
pub mod reconciler;

pub use fetcher::{FeatureFetcher, FeatureLookup, InMemoryFeatureFetcher, LiveCatalog};
pub use reconciler::{Reconciler, DEFAULT_CONCURRENCY};
