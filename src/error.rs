//! Error handling module
//!
//! Provides the unified error type shared by the comparator, the reconciler
//! and the blob layer. The comparator itself never fails; everything here
//! comes from the live lookup service or from snapshot storage.

use thiserror::Error;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum DiffError {
    /// The live store has no record of this feature id at all.
    #[error("Entity does not exist: {0}")]
    EntityDoesNotExist(String),

    #[error("Upstream lookup failed: {0}")]
    Upstream(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported snapshot schema version: {0}")]
    UnsupportedSchema(u32),

    #[error("Checksum mismatch for blob {key}")]
    ChecksumMismatch { key: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lookup task failed: {0}")]
    Task(String),

    #[error("Reconciliation cancelled")]
    Cancelled,
}

impl DiffError {
    /// True for the "no longer exists" sentinel returned by the live store.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DiffError::EntityDoesNotExist(_))
    }
}

/// Result type alias used across the crate
pub type DiffResult<T> = Result<T, DiffError>;

/// Helper function to create the "entity does not exist" sentinel
pub fn not_found_error(id: impl Into<String>) -> DiffError {
    DiffError::EntityDoesNotExist(id.into())
}

/// Helper function to create an upstream lookup error
pub fn upstream_error(msg: impl Into<String>) -> DiffError {
    DiffError::Upstream(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_entity_sentinel_is_not_found() {
        assert!(not_found_error("grid").is_not_found());
        assert!(!upstream_error("timeout").is_not_found());
        assert!(!DiffError::NotFound("previous.json".to_string()).is_not_found());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            not_found_error("grid").to_string(),
            "Entity does not exist: grid"
        );
        assert_eq!(
            DiffError::ChecksumMismatch { key: "a.json".to_string() }.to_string(),
            "Checksum mismatch for blob a.json"
        );
    }
}
