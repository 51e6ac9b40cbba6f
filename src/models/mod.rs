//! Data models
//!
//! The canonical feature view consumed by the comparator and the change
//! set it produces.

pub mod diff;
pub mod feature;

// Re-export commonly used types
pub use diff::*;
pub use feature::*;
