//! Feature Snapshot Store
//!
//! Snapshots and diffs are persisted as opaque blobs under string keys.
//! This module owns the blob envelope (metadata, schema version, checksum);
//! the backing store only moves bytes.

use crate::error::{DiffError, DiffResult};
use crate::models::diff::{DiffSummary, FeatureDiff};
use crate::models::feature::FeatureMap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Schema version written by this build.
///
/// Version 1 snapshots predate docs and per-browser dates; those fields
/// load as unset.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Opaque key-value blob storage
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn load(&self, key: &str) -> DiffResult<Vec<u8>>;
    async fn save(&self, key: &str, bytes: Vec<u8>) -> DiffResult<()>;
}

/// Thread-safe in-memory blob store
pub struct InMemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn load(&self, key: &str) -> DiffResult<Vec<u8>> {
        let blobs = self.blobs.read().await;
        blobs
            .get(key)
            .cloned()
            .ok_or_else(|| DiffError::NotFound(format!("Blob {} not found", key)))
    }

    async fn save(&self, key: &str, bytes: Vec<u8>) -> DiffResult<()> {
        let mut blobs = self.blobs.write().await;
        blobs.insert(key.to_string(), bytes);
        Ok(())
    }
}

/// Blob store rooted at a local directory
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Keys are relative paths that may not climb out of the root
    fn path_for(&self, key: &str) -> DiffResult<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(DiffError::Storage(format!("Invalid blob key: {:?}", key)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn load(&self, key: &str) -> DiffResult<Vec<u8>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(DiffError::NotFound(format!("Blob {} not found", key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, key: &str, bytes: Vec<u8>) -> DiffResult<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }
}

/// Snapshot envelope metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub id: Uuid,
    pub schema_version: u32,
    pub captured_at: DateTime<Utc>,
    pub checksum: String,
    pub feature_count: usize,
}

/// A persisted point-in-time view of the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureSnapshot {
    pub metadata: SnapshotMetadata,
    pub features: FeatureMap,
}

impl FeatureSnapshot {
    /// Wrap a feature map in a fresh current-version envelope
    pub fn new(features: FeatureMap) -> DiffResult<Self> {
        let checksum = Self::compute_checksum(&features)?;
        Ok(Self {
            metadata: SnapshotMetadata {
                id: Uuid::new_v4(),
                schema_version: CURRENT_SCHEMA_VERSION,
                captured_at: Utc::now(),
                checksum,
                feature_count: features.len(),
            },
            features,
        })
    }

    /// SHA-256 over the canonical JSON of the feature map
    pub fn compute_checksum(features: &FeatureMap) -> DiffResult<String> {
        let canonical = serde_json::to_vec(features)?;
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        Ok(format!("{:x}", hasher.finalize()))
    }
}

/// Metadata attached to a persisted diff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffMetadata {
    pub id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub old_snapshot_id: Uuid,
    pub new_snapshot_id: Uuid,
    pub summary: DiffSummary,
}

/// A persisted, canonically sorted diff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffRecord {
    pub metadata: DiffMetadata,
    pub diff: FeatureDiff,
}

impl DiffRecord {
    pub fn new(old: &SnapshotMetadata, new: &SnapshotMetadata, diff: FeatureDiff) -> Self {
        let diff = diff.into_sorted();
        Self {
            metadata: DiffMetadata {
                id: Uuid::new_v4(),
                generated_at: Utc::now(),
                old_snapshot_id: old.id,
                new_snapshot_id: new.id,
                summary: diff.summary(),
            },
            diff,
        }
    }
}

/// Snapshot and diff persistence on top of a [`BlobStore`]
pub struct SnapshotStore {
    blobs: Arc<dyn BlobStore>,
}

impl SnapshotStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    pub async fn save(&self, key: &str, snapshot: &FeatureSnapshot) -> DiffResult<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        self.blobs.save(key, bytes).await?;

        tracing::info!(
            "Saved snapshot {} as {}: {} features",
            snapshot.metadata.id,
            key,
            snapshot.features.len()
        );
        Ok(())
    }

    /// Load and validate a snapshot blob
    pub async fn load(&self, key: &str) -> DiffResult<FeatureSnapshot> {
        let bytes = self.blobs.load(key).await?;
        let snapshot: FeatureSnapshot = serde_json::from_slice(&bytes)?;

        if snapshot.metadata.schema_version > CURRENT_SCHEMA_VERSION {
            return Err(DiffError::UnsupportedSchema(snapshot.metadata.schema_version));
        }

        if let Some((key_id, feature)) = snapshot.features.iter().find(|(k, f)| **k != f.id) {
            return Err(DiffError::Storage(format!(
                "Snapshot {} maps key {} to feature {}",
                key, key_id, feature.id
            )));
        }

        let checksum = FeatureSnapshot::compute_checksum(&snapshot.features)?;
        if checksum != snapshot.metadata.checksum {
            return Err(DiffError::ChecksumMismatch {
                key: key.to_string(),
            });
        }

        tracing::debug!(
            "Loaded snapshot {} (schema v{}): {} features",
            key,
            snapshot.metadata.schema_version,
            snapshot.features.len()
        );
        Ok(snapshot)
    }

    pub async fn save_diff(&self, key: &str, record: &DiffRecord) -> DiffResult<()> {
        let bytes = serde_json::to_vec_pretty(record)?;
        self.blobs.save(key, bytes).await?;

        tracing::info!(
            "Saved diff {} as {}: {} changes",
            record.metadata.id,
            key,
            record.metadata.summary.total_changes
        );
        Ok(())
    }

    pub async fn load_diff(&self, key: &str) -> DiffResult<DiffRecord> {
        let bytes = self.blobs.load(key).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::feature::{BaselineInfoStatus, Feature};
    use pretty_assertions::assert_eq;

    fn features() -> FeatureMap {
        [
            Feature::new("grid", "Grid").with_baseline_status(BaselineInfoStatus::Widely),
            Feature::new("has", ":has()").with_mdn_urls(["https://mdn/has"]),
        ]
        .into_iter()
        .map(|f| (f.id.clone(), f))
        .collect()
    }

    #[test]
    fn test_checksum_consistency() {
        let checksum1 = FeatureSnapshot::compute_checksum(&features()).unwrap();
        let checksum2 = FeatureSnapshot::compute_checksum(&features()).unwrap();

        assert_eq!(checksum1, checksum2);
        assert_ne!(checksum1, FeatureSnapshot::compute_checksum(&FeatureMap::new()).unwrap());
    }

    #[tokio::test]
    async fn test_snapshot_save_and_load() {
        let store = SnapshotStore::new(Arc::new(InMemoryBlobStore::new()));
        let snapshot = FeatureSnapshot::new(features()).unwrap();

        store.save("current.json", &snapshot).await.unwrap();
        let loaded = store.load("current.json").await.unwrap();

        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.metadata.feature_count, 2);
    }

    #[tokio::test]
    async fn test_missing_blob() {
        let store = SnapshotStore::new(Arc::new(InMemoryBlobStore::new()));
        assert!(matches!(
            store.load("nope.json").await,
            Err(DiffError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_v1_snapshot_loads_with_unset_fields() {
        let blobs = Arc::new(InMemoryBlobStore::new());
        let mut map = FeatureMap::new();
        map.insert("grid".to_string(), Feature::new("grid", "Grid"));
        let checksum = FeatureSnapshot::compute_checksum(&map).unwrap();
        let json = format!(
            r#"{{
                "metadata": {{
                    "id": "00000000-0000-0000-0000-000000000001",
                    "schemaVersion": 1,
                    "capturedAt": "2024-01-01T00:00:00Z",
                    "checksum": "{}",
                    "featureCount": 1
                }},
                "features": {{"grid": {{"id": "grid", "name": "Grid"}}}}
            }}"#,
            checksum
        );
        blobs.save("v1.json", json.into_bytes()).await.unwrap();

        let loaded = SnapshotStore::new(blobs).load("v1.json").await.unwrap();

        assert_eq!(loaded.metadata.schema_version, 1);
        assert!(loaded.features["grid"].docs.is_unset());
    }

    #[tokio::test]
    async fn test_future_schema_is_rejected() {
        let blobs = Arc::new(InMemoryBlobStore::new());
        let mut snapshot = FeatureSnapshot::new(features()).unwrap();
        snapshot.metadata.schema_version = CURRENT_SCHEMA_VERSION + 1;
        blobs
            .save("future.json", serde_json::to_vec(&snapshot).unwrap())
            .await
            .unwrap();

        let result = SnapshotStore::new(blobs).load("future.json").await;
        assert!(matches!(result, Err(DiffError::UnsupportedSchema(3))));
    }

    #[tokio::test]
    async fn test_tampered_snapshot_fails_checksum() {
        let blobs = Arc::new(InMemoryBlobStore::new());
        let mut snapshot = FeatureSnapshot::new(features()).unwrap();
        snapshot
            .features
            .insert("extra".to_string(), Feature::new("extra", "Extra"));
        blobs
            .save("tampered.json", serde_json::to_vec(&snapshot).unwrap())
            .await
            .unwrap();

        let result = SnapshotStore::new(blobs).load("tampered.json").await;
        assert!(matches!(result, Err(DiffError::ChecksumMismatch { .. })));
    }

    #[tokio::test]
    async fn test_diff_record_is_sorted_and_summarized() {
        let store = SnapshotStore::new(Arc::new(InMemoryBlobStore::new()));
        let old = FeatureSnapshot::new(FeatureMap::new()).unwrap();
        let new = FeatureSnapshot::new(features()).unwrap();
        let diff = crate::snapshot::diff::DiffEngine::calculate_diff(&old.features, &new.features);

        let record = DiffRecord::new(&old.metadata, &new.metadata, diff);
        store.save_diff("diff.json", &record).await.unwrap();
        let loaded = store.load_diff("diff.json").await.unwrap();

        assert_eq!(loaded, record);
        assert_eq!(loaded.metadata.summary.added, 2);
        let names: Vec<&str> = loaded.diff.added.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec![":has()", "Grid"]);
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path());

        store.save("nested/a.json", b"{}".to_vec()).await.unwrap();
        assert_eq!(store.load("nested/a.json").await.unwrap(), b"{}".to_vec());
        assert!(matches!(
            store.load("missing.json").await,
            Err(DiffError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_file_store_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path());

        assert!(matches!(
            store.load("../etc/passwd").await,
            Err(DiffError::Storage(_))
        ));
        assert!(matches!(store.load("").await, Err(DiffError::Storage(_))));
    }
}
