//! On-disk persistence of trained snapshots.
//!
//! The current format spreads a snapshot across one JSON file per artifact
//! plus `metadata.json`, which is written last: a directory without it is never
//! treated as a complete snapshot. The older single-file `model.json` format is
//! still readable.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::forest::RandomForest;
use crate::core::training::ModelMetrics;
use crate::engine::{LegacyModel, SnapshotCell, TrainedSnapshot};
use crate::error::StoreError;

pub const ENCODER_FILE: &str = "encoder.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const COMPATIBILITY_FILE: &str = "compatibility_model.json";
pub const SATISFACTION_FILE: &str = "satisfaction_model.json";
pub const CLUSTERING_FILE: &str = "clustering_model.json";
pub const REDUCER_FILE: &str = "dimensionality_reducer.json";
pub const METADATA_FILE: &str = "metadata.json";
pub const LEGACY_FILE: &str = "model.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Metadata {
    trained: bool,
    version: Uuid,
    trained_at: DateTime<Utc>,
    feature_names: Vec<String>,
    feature_importance: BTreeMap<String, f64>,
    metrics: ModelMetrics,
}

/// Metrics as recorded by the single-file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LegacyMetrics {
    #[serde(default)]
    accuracy: f64,
    #[serde(default)]
    precision: f64,
    #[serde(default)]
    recall: f64,
    #[serde(default)]
    f1_score: f64,
    #[serde(default)]
    cross_val: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LegacyFile {
    model: RandomForest,
    features: Vec<String>,
    #[serde(default)]
    metrics: LegacyMetrics,
}

/// Result of reading a model directory
#[derive(Debug)]
pub enum LoadOutcome {
    Current(TrainedSnapshot),
    Legacy(LegacyModel),
    Empty,
}

/// File-backed snapshot store rooted at one directory
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    fn write<T: Serialize>(&self, file: &str, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value)?;
        fs::write(self.path(file), bytes)?;
        Ok(())
    }

    fn read<T: DeserializeOwned>(&self, file: &str) -> Result<T, StoreError> {
        let bytes = fs::read(self.path(file))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Persist every artifact of a snapshot
    pub fn save(&self, snapshot: &TrainedSnapshot) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;

        // A stale marker must not vouch for half-written artifacts
        let metadata_path = self.path(METADATA_FILE);
        if metadata_path.exists() {
            fs::remove_file(&metadata_path)?;
        }

        self.write(ENCODER_FILE, &snapshot.encoder)?;
        self.write(SCALER_FILE, &snapshot.scaler)?;
        self.write(COMPATIBILITY_FILE, &snapshot.classifier)?;
        self.write(SATISFACTION_FILE, &snapshot.satisfaction)?;
        self.write(CLUSTERING_FILE, &snapshot.clustering)?;
        self.write(REDUCER_FILE, &snapshot.reducer)?;
        self.write(
            METADATA_FILE,
            &Metadata {
                trained: true,
                version: snapshot.version,
                trained_at: snapshot.trained_at,
                feature_names: snapshot.feature_names.clone(),
                feature_importance: snapshot.feature_importance.clone(),
                metrics: snapshot.metrics.clone(),
            },
        )?;

        info!(dir = %self.dir.display(), version = %snapshot.version, "Snapshot saved");
        Ok(())
    }

    fn has_current(&self) -> bool {
        [ENCODER_FILE, COMPATIBILITY_FILE, METADATA_FILE]
            .iter()
            .all(|file| self.path(file).is_file())
    }

    /// Current format first, then legacy, otherwise empty
    pub fn load(&self) -> Result<LoadOutcome, StoreError> {
        if self.has_current() {
            let metadata: Metadata = self.read(METADATA_FILE)?;
            if metadata.trained {
                let snapshot = TrainedSnapshot {
                    version: metadata.version,
                    trained_at: metadata.trained_at,
                    encoder: self.read(ENCODER_FILE)?,
                    scaler: self.read(SCALER_FILE)?,
                    classifier: self.read(COMPATIBILITY_FILE)?,
                    satisfaction: self.read(SATISFACTION_FILE)?,
                    clustering: self.read(CLUSTERING_FILE)?,
                    reducer: self.read(REDUCER_FILE)?,
                    feature_names: metadata.feature_names,
                    feature_importance: metadata.feature_importance,
                    metrics: metadata.metrics,
                };
                info!(version = %snapshot.version, "Loaded trained snapshot");
                return Ok(LoadOutcome::Current(snapshot));
            }
            warn!("Metadata present but marked untrained; ignoring current-format files");
        }

        if self.path(LEGACY_FILE).is_file() {
            let legacy: LegacyFile = self.read(LEGACY_FILE)?;
            info!(features = legacy.features.len(), "Loaded legacy model");
            return Ok(LoadOutcome::Legacy(LegacyModel {
                classifier: legacy.model,
                feature_names: legacy.features,
                metrics: ModelMetrics {
                    accuracy: legacy.metrics.accuracy,
                    precision: legacy.metrics.precision,
                    recall: legacy.metrics.recall,
                    f1_score: legacy.metrics.f1_score,
                    cross_val_mean: legacy.metrics.cross_val,
                    ..ModelMetrics::default()
                },
            }));
        }

        Ok(LoadOutcome::Empty)
    }

    /// Load whatever is on disk and publish it; `false` when nothing was found
    pub fn restore_into(&self, cell: &SnapshotCell) -> Result<bool, StoreError> {
        match self.load()? {
            LoadOutcome::Current(snapshot) => {
                cell.publish(snapshot);
                Ok(true)
            }
            LoadOutcome::Legacy(model) => {
                cell.publish_legacy(model);
                Ok(true)
            }
            LoadOutcome::Empty => {
                info!(dir = %self.dir.display(), "No persisted model found");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("absent"));
        assert!(matches!(store.load().unwrap(), LoadOutcome::Empty));
    }

    #[test]
    fn test_restore_into_empty_cell() {
        let dir = tempfile::tempdir().unwrap();
        let cell = SnapshotCell::new();
        assert!(!ModelStore::new(dir.path()).restore_into(&cell).unwrap());
        assert!(cell.current().is_none());
    }

    #[test]
    fn test_legacy_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = serde_json::json!({
            "model": {
                "trees": [{
                    "root": {
                        "kind": "split",
                        "feature": 0,
                        "threshold": 0.5,
                        "left": { "kind": "leaf", "value": 0.0 },
                        "right": { "kind": "leaf", "value": 1.0 }
                    }
                }],
                "n_features": 1
            },
            "features": ["smoking_no"],
            "metrics": { "accuracy": 0.9, "cross_val": 0.8 }
        });
        fs::write(dir.path().join(LEGACY_FILE), legacy.to_string()).unwrap();

        match ModelStore::new(dir.path()).load().unwrap() {
            LoadOutcome::Legacy(model) => {
                assert_eq!(model.feature_names, vec!["smoking_no".to_string()]);
                assert_eq!(model.metrics.accuracy, 0.9);
                assert_eq!(model.metrics.cross_val_mean, 0.8);
                assert!(!model.classifier.supports_attribution());
                assert_eq!(model.classifier.predict_proba(&[1.0]), 1.0);
            }
            other => panic!("expected legacy model, got {:?}", other),
        }
    }
}
