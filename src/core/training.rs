//! Batch training pipeline.
//!
//! Encodes the population, fits every learned artifact and evaluates the
//! compatibility classifier on a stratified hold-out split plus stratified
//! k-fold cross-validation. The caller receives a fully built snapshot or an
//! error; nothing is ever partially trained.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::boosting::{BoostingParams, GradientBoosting};
use crate::core::encoder::{FeatureEncoder, StandardScaler};
use crate::core::forest::{validate_labels, ForestParams, RandomForest};
use crate::core::kmeans::{KMeans, KMeansParams};
use crate::core::metrics::{accuracy, mean_std, weighted_scores};
use crate::core::pca::Pca;
use crate::engine::TrainedSnapshot;
use crate::error::{EngineError, Result, TrainingError};
use crate::models::Resident;

/// Minimum quality a trained classifier is expected to reach
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QualityTargets {
    pub min_accuracy: f64,
    pub min_f1: f64,
    pub min_cross_val: f64,
}

impl Default for QualityTargets {
    fn default() -> Self {
        Self {
            min_accuracy: 0.85,
            min_f1: 0.80,
            min_cross_val: 0.75,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub forest: ForestParams,
    pub boosting: BoostingParams,
    pub n_clusters: usize,
    pub n_init: usize,
    pub pca_components: usize,
    pub test_size: f64,
    pub cv_folds: usize,
    pub random_state: u64,
    pub quality: QualityTargets,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            forest: ForestParams::default(),
            boosting: BoostingParams::default(),
            n_clusters: 5,
            n_init: 10,
            pca_components: 2,
            test_size: 0.2,
            cv_folds: 5,
            random_state: 42,
            quality: QualityTargets::default(),
        }
    }
}

/// Evaluation of the compatibility classifier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub cross_val_mean: f64,
    pub cross_val_std: f64,
    /// Seconds
    pub training_time: f64,
    pub last_training: Option<DateTime<Utc>>,
    #[serde(default)]
    pub meets_quality_targets: bool,
}

impl ModelMetrics {
    pub fn meets(&self, targets: &QualityTargets) -> bool {
        self.accuracy >= targets.min_accuracy
            && self.f1_score >= targets.min_f1
            && self.cross_val_mean >= targets.min_cross_val
    }
}

/// Where the training labels came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelSource {
    Recorded,
    RuleBased,
}

/// Recorded labels when every resident carries one, otherwise the rule label
pub fn resolve_labels(residents: &[Resident]) -> (Vec<u8>, LabelSource) {
    let recorded: Option<Vec<u8>> = residents.iter().map(|r| r.compatible).collect();
    match recorded {
        Some(labels) if !labels.is_empty() => (labels, LabelSource::Recorded),
        _ => (
            residents.iter().map(Resident::rule_based_label).collect(),
            LabelSource::RuleBased,
        ),
    }
}

/// Stratified train/test split; returns (train, test) row indices
pub fn stratified_split(y: &[u8], test_size: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for class in [0u8, 1u8] {
        let mut rows: Vec<usize> = (0..y.len()).filter(|&i| y[i] == class).collect();
        if rows.is_empty() {
            continue;
        }
        rows.shuffle(&mut rng);
        // Both sides keep at least one member of each class
        let n_test = ((rows.len() as f64 * test_size).round() as usize).clamp(1, rows.len() - 1);
        test.extend_from_slice(&rows[..n_test]);
        train.extend_from_slice(&rows[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    (train, test)
}

/// Stratified k-fold assignment: fold index per row
///
/// Each class continues the round-robin where the previous one stopped, so
/// every fold gets a test row whenever there are at least `k` rows.
pub fn stratified_folds(y: &[u8], k: usize, seed: u64) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut folds = vec![0usize; y.len()];
    let mut next = 0;
    for class in [0u8, 1u8] {
        let mut rows: Vec<usize> = (0..y.len()).filter(|&i| y[i] == class).collect();
        rows.shuffle(&mut rng);
        for row in rows {
            folds[row] = next % k;
            next += 1;
        }
    }
    folds
}

fn select<T: Clone>(items: &[T], rows: &[usize]) -> Vec<T> {
    rows.iter().map(|&i| items[i].clone()).collect()
}

fn check_training_data(y: &[u8], config: &TrainingConfig) -> std::result::Result<(), TrainingError> {
    let positives = y.iter().filter(|&&label| label == 1).count();
    let negatives = y.len() - positives;
    let minority = positives.min(negatives);
    if minority == 0 {
        return Ok(());
    }
    if minority < 2 {
        return Err(TrainingError::InsufficientData(
            "each class needs at least 2 examples for a stratified split".to_string(),
        ));
    }
    if config.cv_folds < 2 || y.len() < config.cv_folds {
        return Err(TrainingError::InsufficientData(format!(
            "{} rows cannot fill {} cross-validation folds",
            y.len(),
            config.cv_folds
        )));
    }
    Ok(())
}

fn cross_validate(
    x: &[Vec<f64>],
    y: &[u8],
    config: &TrainingConfig,
) -> std::result::Result<Vec<f64>, TrainingError> {
    let folds = stratified_folds(y, config.cv_folds, config.random_state);

    let scores: Vec<Option<f64>> = (0..config.cv_folds)
        .into_par_iter()
        .map(|fold| -> std::result::Result<Option<f64>, TrainingError> {
            let (test, train): (Vec<usize>, Vec<usize>) = (0..y.len()).partition(|&i| folds[i] == fold);
            // A fold without test rows has nothing to score
            if test.is_empty() {
                return Ok(None);
            }
            let model = RandomForest::fit(&select(x, &train), &select(y, &train), &config.forest)?;
            let predicted: Vec<u8> = test.iter().map(|&i| model.predict(&x[i])).collect();
            Ok(Some(accuracy(&select(y, &test), &predicted)))
        })
        .collect::<std::result::Result<_, _>>()?;

    Ok(scores.into_iter().flatten().collect())
}

/// Outcome of a successful training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub snapshot: TrainedSnapshot,
    pub labels: Vec<u8>,
    pub label_source: LabelSource,
}

/// Fit every artifact on `residents` and evaluate the classifier
pub fn train(residents: &[Resident], config: &TrainingConfig) -> Result<TrainingReport> {
    if residents.is_empty() {
        return Err(EngineError::EmptyPopulation);
    }
    let started = Instant::now();

    let (labels, label_source) = resolve_labels(residents);
    info!(
        samples = residents.len(),
        positives = labels.iter().filter(|&&l| l == 1).count(),
        ?label_source,
        "Starting training run"
    );

    let encoder = FeatureEncoder::fit(residents)?;
    let encoded = encoder.transform_all(residents);
    let scaler = StandardScaler::fit(&encoded)?;
    let x = scaler.transform_all(&encoded);

    validate_labels(&x, &labels)?;
    check_training_data(&labels, config)?;

    let (train_rows, test_rows) = stratified_split(&labels, config.test_size, config.random_state);
    let x_train = select(&x, &train_rows);
    let y_train = select(&labels, &train_rows);

    let classifier = RandomForest::fit(&x_train, &y_train, &config.forest)?;
    let satisfaction = GradientBoosting::fit(&x_train, &y_train, &config.boosting)?;

    let clustering = KMeans::fit(
        &encoded,
        &KMeansParams {
            n_clusters: config.n_clusters.min(encoded.len()).max(1),
            n_init: config.n_init,
            random_state: config.random_state,
            ..KMeansParams::default()
        },
    )?;
    let reducer = Pca::fit(&encoded, config.pca_components)?;

    let y_test = select(&labels, &test_rows);
    let predicted: Vec<u8> = test_rows.iter().map(|&i| classifier.predict(&x[i])).collect();
    let (precision, recall, f1_score) = weighted_scores(&y_test, &predicted);
    let cv_scores = cross_validate(&x, &labels, config)?;
    let (cross_val_mean, cross_val_std) = mean_std(&cv_scores);

    let trained_at = Utc::now();
    let mut metrics = ModelMetrics {
        accuracy: accuracy(&y_test, &predicted),
        precision,
        recall,
        f1_score,
        cross_val_mean,
        cross_val_std,
        training_time: started.elapsed().as_secs_f64(),
        last_training: Some(trained_at),
        meets_quality_targets: false,
    };
    metrics.meets_quality_targets = metrics.meets(&config.quality);

    if metrics.meets_quality_targets {
        info!(
            accuracy = metrics.accuracy,
            f1 = metrics.f1_score,
            cv = metrics.cross_val_mean,
            "Training complete"
        );
    } else {
        warn!(
            accuracy = metrics.accuracy,
            f1 = metrics.f1_score,
            cv = metrics.cross_val_mean,
            "Training complete below quality targets"
        );
    }

    let feature_names = encoder.feature_names();
    let feature_importance: BTreeMap<String, f64> = feature_names
        .iter()
        .cloned()
        .zip(classifier.feature_importances().iter().copied())
        .collect();

    let snapshot = TrainedSnapshot {
        version: Uuid::new_v4(),
        trained_at,
        encoder,
        scaler,
        classifier,
        satisfaction,
        clustering,
        reducer,
        feature_names,
        feature_importance,
        metrics,
    };

    Ok(TrainingReport {
        snapshot,
        labels,
        label_source,
    })
}
