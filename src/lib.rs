//! WebFeature Diff - snapshot reconciliation and diff engine
//!
//! Tracks a catalog of web-platform features across periodic snapshots and
//! produces a structured change set:
//! - Comparator: additions, removals and field-level modifications, with
//!   quiet-rollout suppression for backfilled browser columns
//! - Reconciler: consults the live store to tell renames ("moves") and
//!   decompositions ("splits") from real removals and hard deletions
//! - Diff aggregate: canonical ordering and summaries for publication

pub mod config;
pub mod error;
pub mod models;
pub mod optional;
pub mod reconcile;
pub mod snapshot;

pub use error::{DiffError, DiffResult};
pub use models::{Feature, FeatureDiff, FeatureMap};
pub use optional::OptionallySet;
pub use reconcile::{FeatureFetcher, FeatureLookup, Reconciler};
pub use snapshot::DiffEngine;
