//! Live feature lookup
//!
//! The reconciler asks the authoritative store what became of each removed
//! feature. The answer is a closed sum type; "gone entirely" is the
//! [`DiffError::EntityDoesNotExist`] sentinel.

use crate::error::{not_found_error, DiffError, DiffResult};
use crate::models::feature::{Feature, FeatureMap};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// What the live store knows about a feature id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureLookup {
    /// The feature exists under the requested id
    Regular(Feature),
    /// The feature now lives under another id
    Moved { new_id: String },
    /// The feature was broken up into several new ids
    Split { new_ids: Vec<String> },
}

/// Authoritative live lookup service
#[async_trait]
pub trait FeatureFetcher: Send + Sync {
    /// Fails with [`DiffError::EntityDoesNotExist`] when the id is unknown;
    /// any other error is treated as transient by callers.
    async fn get_feature(&self, id: &str) -> DiffResult<FeatureLookup>;
}

/// Live catalog document loaded by [`InMemoryFeatureFetcher`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiveCatalog {
    #[serde(default)]
    pub features: FeatureMap,
    /// old id -> new id
    #[serde(default)]
    pub moved: BTreeMap<String, String>,
    /// old id -> new ids
    #[serde(default)]
    pub split: BTreeMap<String, Vec<String>>,
}

/// Thread-safe in-memory live store
pub struct InMemoryFeatureFetcher {
    catalog: Arc<RwLock<LiveCatalog>>,
}

impl InMemoryFeatureFetcher {
    pub fn new() -> Self {
        Self::from_catalog(LiveCatalog::default())
    }

    pub fn from_catalog(catalog: LiveCatalog) -> Self {
        Self {
            catalog: Arc::new(RwLock::new(catalog)),
        }
    }

    /// Parse a live catalog JSON document
    pub fn from_json(bytes: &[u8]) -> Result<Self, DiffError> {
        let catalog: LiveCatalog = serde_json::from_slice(bytes)?;
        tracing::info!(
            "Loaded live catalog: {} features, {} moved, {} split",
            catalog.features.len(),
            catalog.moved.len(),
            catalog.split.len()
        );
        Ok(Self::from_catalog(catalog))
    }

    pub async fn insert_feature(&self, feature: Feature) {
        let mut catalog = self.catalog.write().await;
        catalog.features.insert(feature.id.clone(), feature);
    }

    pub async fn mark_moved(&self, old_id: impl Into<String>, new_id: impl Into<String>) {
        let mut catalog = self.catalog.write().await;
        catalog.moved.insert(old_id.into(), new_id.into());
    }

    pub async fn mark_split(&self, old_id: impl Into<String>, new_ids: Vec<String>) {
        let mut catalog = self.catalog.write().await;
        catalog.split.insert(old_id.into(), new_ids);
    }
}

impl Default for InMemoryFeatureFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeatureFetcher for InMemoryFeatureFetcher {
    async fn get_feature(&self, id: &str) -> DiffResult<FeatureLookup> {
        let catalog = self.catalog.read().await;

        if let Some(new_id) = catalog.moved.get(id) {
            return Ok(FeatureLookup::Moved {
                new_id: new_id.clone(),
            });
        }
        if let Some(new_ids) = catalog.split.get(id) {
            return Ok(FeatureLookup::Split {
                new_ids: new_ids.clone(),
            });
        }
        catalog
            .features
            .get(id)
            .cloned()
            .map(FeatureLookup::Regular)
            .ok_or_else(|| not_found_error(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_lookup_variants() {
        let fetcher = InMemoryFeatureFetcher::new();
        fetcher.insert_feature(Feature::new("grid", "Grid")).await;
        fetcher.mark_moved("old-grid", "grid").await;
        fetcher
            .mark_split("layout", vec!["grid".to_string(), "flexbox".to_string()])
            .await;

        assert_eq!(
            fetcher.get_feature("grid").await.unwrap(),
            FeatureLookup::Regular(Feature::new("grid", "Grid"))
        );
        assert_eq!(
            fetcher.get_feature("old-grid").await.unwrap(),
            FeatureLookup::Moved {
                new_id: "grid".to_string()
            }
        );
        assert!(matches!(
            fetcher.get_feature("layout").await.unwrap(),
            FeatureLookup::Split { new_ids } if new_ids.len() == 2
        ));
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let fetcher = InMemoryFeatureFetcher::new();
        let err = fetcher.get_feature("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_from_json() {
        let json = br#"{
            "features": {"grid": {"id": "grid", "name": "Grid"}},
            "moved": {"old-grid": "grid"}
        }"#;
        let fetcher = InMemoryFeatureFetcher::from_json(json).unwrap();

        let lookup = tokio_test::block_on(fetcher.get_feature("old-grid")).unwrap();
        assert_eq!(
            lookup,
            FeatureLookup::Moved {
                new_id: "grid".to_string()
            }
        );
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            InMemoryFeatureFetcher::from_json(b"not json"),
            Err(DiffError::Serialization(_))
        ));
    }
}
