//! Published model state and the encoded population the operations run on.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::core::boosting::GradientBoosting;
use crate::core::encoder::{EncodedVector, FeatureEncoder, StandardScaler};
use crate::core::explain::Explainer;
use crate::core::forest::RandomForest;
use crate::core::kmeans::KMeans;
use crate::core::pca::Pca;
use crate::core::similarity::{cosine_similarity, mean_vector};
use crate::core::training::ModelMetrics;
use crate::error::{EngineError, Result};
use crate::models::Resident;

/// Every artifact produced by one training run. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedSnapshot {
    pub version: Uuid,
    pub trained_at: DateTime<Utc>,
    pub encoder: FeatureEncoder,
    pub scaler: StandardScaler,
    pub classifier: RandomForest,
    pub satisfaction: GradientBoosting,
    pub clustering: KMeans,
    pub reducer: Pca,
    pub feature_names: Vec<String>,
    pub feature_importance: BTreeMap<String, f64>,
    pub metrics: ModelMetrics,
}

impl TrainedSnapshot {
    /// Classifier input for a pair: the scaled mean of both encodings
    pub fn pair_input(&self, a: &[f64], b: &[f64]) -> Vec<f64> {
        self.scaler.transform(&mean_vector(a, b))
    }

    /// Classifier input for a single resident
    pub fn resident_input(&self, resident: &Resident) -> Vec<f64> {
        self.scaler.transform(&self.encoder.transform(resident))
    }

    /// Classifier decision on each resident's own profile
    pub fn predict_residents(&self, residents: &[Resident]) -> Vec<u8> {
        residents
            .iter()
            .map(|r| self.classifier.predict(&self.resident_input(r)))
            .collect()
    }

    /// 2-D coordinates of a resident for layout
    pub fn project(&self, resident: &Resident) -> Vec<f64> {
        self.reducer.project(&self.encoder.transform(resident))
    }

    pub fn explainer(&self) -> Explainer<'_> {
        Explainer::new(&self.classifier, &self.feature_names)
    }
}

/// Classifier restored from the single-file format. It carries no encoder,
/// so it can only report metrics and importance-based explanations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyModel {
    pub classifier: RandomForest,
    pub feature_names: Vec<String>,
    pub metrics: ModelMetrics,
}

impl LegacyModel {
    pub fn explainer(&self) -> Explainer<'_> {
        Explainer::new(&self.classifier, &self.feature_names)
    }
}

/// Whatever model is currently being served
#[derive(Debug, Clone)]
pub enum Published {
    Trained(Arc<TrainedSnapshot>),
    Legacy(Arc<LegacyModel>),
}

impl Published {
    pub fn metrics(&self) -> &ModelMetrics {
        match self {
            Published::Trained(snapshot) => &snapshot.metrics,
            Published::Legacy(model) => &model.metrics,
        }
    }

    pub fn explainer(&self) -> Explainer<'_> {
        match self {
            Published::Trained(snapshot) => snapshot.explainer(),
            Published::Legacy(model) => model.explainer(),
        }
    }
}

/// Single-slot holder for the active model; readers clone the `Arc`
#[derive(Debug, Default)]
pub struct SnapshotCell {
    inner: RwLock<Option<Published>>,
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snapshot: TrainedSnapshot) -> Arc<TrainedSnapshot> {
        let snapshot = Arc::new(snapshot);
        info!(version = %snapshot.version, "Publishing trained snapshot");
        self.replace(Published::Trained(Arc::clone(&snapshot)));
        snapshot
    }

    pub fn publish_legacy(&self, model: LegacyModel) {
        info!(features = model.feature_names.len(), "Publishing legacy model");
        self.replace(Published::Legacy(Arc::new(model)));
    }

    fn replace(&self, published: Published) {
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(published);
    }

    pub fn current(&self) -> Option<Published> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Snapshot usable for scoring; legacy or missing models are not
    pub fn trained(&self) -> Result<Arc<TrainedSnapshot>> {
        match self.current() {
            Some(Published::Trained(snapshot)) => Ok(snapshot),
            Some(Published::Legacy(_)) => Err(EngineError::NotInitialized(
                "legacy model has no encoder; retrain to enable scoring".to_string(),
            )),
            None => Err(EngineError::NotInitialized("no trained model".to_string())),
        }
    }
}

/// Residents encoded against a snapshot's vocabulary, addressable by id
#[derive(Debug, Clone)]
pub struct Population {
    residents: Vec<Resident>,
    encoded: Vec<EncodedVector>,
    index: HashMap<u32, usize>,
}

impl Population {
    pub fn new(residents: Vec<Resident>, encoder: &FeatureEncoder) -> Result<Self> {
        let mut index = HashMap::with_capacity(residents.len());
        for (row, resident) in residents.iter().enumerate() {
            if index.insert(resident.id, row).is_some() {
                return Err(EngineError::InvalidParameter(format!(
                    "duplicate resident id {}",
                    resident.id
                )));
            }
        }
        let encoded = encoder.transform_all(&residents);
        Ok(Self {
            residents,
            encoded,
            index,
        })
    }

    pub fn len(&self) -> usize {
        self.residents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residents.is_empty()
    }

    pub fn residents(&self) -> &[Resident] {
        &self.residents
    }

    pub fn resident(&self, row: usize) -> &Resident {
        &self.residents[row]
    }

    pub fn encoded(&self, row: usize) -> &[f64] {
        &self.encoded[row]
    }

    pub fn encoded_rows(&self) -> &[EncodedVector] {
        &self.encoded
    }

    pub fn row_of(&self, id: u32) -> Result<usize> {
        self.index.get(&id).copied().ok_or(EngineError::NotFound(id))
    }

    /// Cosine similarity of two rows
    pub fn similarity(&self, row_a: usize, row_b: usize) -> f64 {
        cosine_similarity(&self.encoded[row_a], &self.encoded[row_b])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Attribute;

    fn encoder_for(residents: &[Resident]) -> FeatureEncoder {
        FeatureEncoder::fit(residents).unwrap()
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let residents = vec![
            Resident::new(1, "Ana", Some(20.0)),
            Resident::new(1, "Ana bis", Some(21.0)),
        ];
        let encoder = encoder_for(&residents);
        assert!(matches!(
            Population::new(residents, &encoder),
            Err(EngineError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_row_lookup_and_similarity() {
        let residents = vec![
            Resident::new(3, "Ana", Some(20.0)).with(Attribute::Smoking, "no"),
            Resident::new(7, "Luis", Some(30.0)).with(Attribute::Smoking, "yes"),
        ];
        let encoder = encoder_for(&residents);
        let population = Population::new(residents, &encoder).unwrap();

        assert_eq!(population.row_of(7).unwrap(), 1);
        assert!(matches!(population.row_of(99), Err(EngineError::NotFound(99))));
        assert!((population.similarity(0, 0) - 1.0).abs() < 1e-12);
        assert_eq!(population.similarity(0, 1), population.similarity(1, 0));
    }

    #[test]
    fn test_empty_cell_is_not_initialized() {
        let cell = SnapshotCell::new();
        assert!(cell.current().is_none());
        assert!(matches!(cell.trained(), Err(EngineError::NotInitialized(_))));
    }
}
