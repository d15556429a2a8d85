//! Compatibility classifier: a bagged forest of Gini trees.
//!
//! Each tree is grown on a bootstrap sample drawn from its own seeded RNG
//! (`random_state + tree_index`), so a fit is reproducible regardless of how
//! rayon schedules the trees.

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::tree::{ClassificationTree, TreeParams, WeightedSample};
use crate::error::TrainingError;

/// Forest hyperparameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub random_state: u64,
    /// Reweight classes inversely to their frequency
    pub balanced: bool,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            random_state: 42,
            balanced: true,
        }
    }
}

/// Bagged ensemble of classification trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<ClassificationTree>,
    n_features: usize,
    #[serde(default)]
    feature_importances: Vec<f64>,
}

/// `n / (2 * n_class)` per class, or unit weights when unbalanced
pub fn class_weights(y: &[u8], balanced: bool) -> [f64; 2] {
    if !balanced {
        return [1.0, 1.0];
    }
    let n = y.len() as f64;
    let positives = y.iter().filter(|&&label| label == 1).count() as f64;
    let negatives = n - positives;
    let weight = |count: f64| if count > 0.0 { n / (2.0 * count) } else { 0.0 };
    [weight(negatives), weight(positives)]
}

/// Check that a label vector is usable for binary training
pub fn validate_labels(x: &[Vec<f64>], y: &[u8]) -> Result<(), TrainingError> {
    if x.is_empty() {
        return Err(TrainingError::InsufficientData("no training rows".to_string()));
    }
    if x.len() != y.len() {
        return Err(TrainingError::InsufficientData(format!(
            "{} rows but {} labels",
            x.len(),
            y.len()
        )));
    }
    let first = y[0];
    if y.iter().all(|&label| label == first) {
        return Err(TrainingError::SingleClass(first));
    }
    Ok(())
}

fn bootstrap_counts(n_samples: usize, rng: &mut StdRng) -> Vec<usize> {
    let dist = Uniform::from(0..n_samples);
    let mut counts = vec![0usize; n_samples];
    for _ in 0..n_samples {
        counts[dist.sample(rng)] += 1;
    }
    counts
}

impl RandomForest {
    pub fn fit(x: &[Vec<f64>], y: &[u8], params: &ForestParams) -> Result<Self, TrainingError> {
        validate_labels(x, y)?;

        let n_samples = x.len();
        let n_features = x[0].len();
        let weights = class_weights(y, params.balanced);
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            max_features: Some(((n_features as f64).sqrt().round() as usize).max(1)),
            ..TreeParams::default()
        };

        let trees: Vec<ClassificationTree> = (0..params.n_estimators.max(1))
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(params.random_state.wrapping_add(i as u64));
                let counts = bootstrap_counts(n_samples, &mut rng);
                let samples: Vec<WeightedSample> = counts
                    .iter()
                    .enumerate()
                    .filter(|&(_, &c)| c > 0)
                    .map(|(row, &c)| (row, c as f64 * weights[y[row] as usize]))
                    .collect();
                ClassificationTree::fit(x, y, &samples, n_features, &tree_params, &mut rng)
            })
            .collect();

        let feature_importances = aggregate_importances(&trees, n_features);

        Ok(Self {
            trees,
            n_features,
            feature_importances,
        })
    }

    /// Positive-class probability: mean of per-tree leaf fractions
    pub fn predict_proba(&self, x: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.5;
        }
        self.trees.iter().map(|t| t.predict_proba(x)).sum::<f64>() / self.trees.len() as f64
    }

    pub fn predict(&self, x: &[f64]) -> u8 {
        u8::from(self.predict_proba(x) >= 0.5)
    }

    /// Normalized global importance (sums to 1, or all zeros without splits)
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Whether per-prediction path attribution is available
    pub fn supports_attribution(&self) -> bool {
        !self.trees.is_empty() && self.trees.iter().all(|t| t.root.has_node_values())
    }

    /// Additive decomposition of `predict_proba(x)` into a bias and one
    /// signed contribution per feature, averaged over trees.
    pub fn attribution(&self, x: &[f64]) -> Option<(f64, Vec<f64>)> {
        if self.trees.is_empty() {
            return None;
        }
        let mut contributions = vec![0.0; self.n_features];
        let mut bias = 0.0;
        for tree in &self.trees {
            bias += tree.root.path_contributions(x, &mut contributions)?;
        }
        let n = self.trees.len() as f64;
        contributions.iter_mut().for_each(|c| *c /= n);
        Some((bias / n, contributions))
    }
}

fn aggregate_importances(trees: &[ClassificationTree], n_features: usize) -> Vec<f64> {
    let mut total = vec![0.0; n_features];
    for tree in trees {
        let sum: f64 = tree.importances.iter().sum();
        if sum > 0.0 {
            for (t, v) in total.iter_mut().zip(&tree.importances) {
                *t += v / sum;
            }
        }
    }
    normalize(&mut total);
    total
}

/// Scale in place so the values sum to 1; leaves all-zero input untouched
pub fn normalize(values: &mut [f64]) {
    let sum: f64 = values.iter().sum();
    if sum > 0.0 {
        values.iter_mut().for_each(|v| *v /= sum);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> (Vec<Vec<f64>>, Vec<u8>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..40 {
            let signal = if i % 4 == 0 { 1.0 } else { 0.0 };
            let noise = (i % 3) as f64 / 3.0;
            x.push(vec![signal, noise]);
            y.push(signal as u8);
        }
        (x, y)
    }

    #[test]
    fn test_balanced_class_weights() {
        let y = vec![1, 0, 0, 0];
        let w = class_weights(&y, true);
        assert!((w[0] - 4.0 / 6.0).abs() < 1e-12);
        assert!((w[1] - 2.0).abs() < 1e-12);
        assert_eq!(class_weights(&y, false), [1.0, 1.0]);
    }

    #[test]
    fn test_single_class_rejected() {
        let x = vec![vec![0.0], vec![1.0]];
        let y = vec![1, 1];
        assert!(matches!(
            RandomForest::fit(&x, &y, &ForestParams::default()),
            Err(TrainingError::SingleClass(1))
        ));
    }

    #[test]
    fn test_forest_learns_signal() {
        let (x, y) = dataset();
        let params = ForestParams { n_estimators: 15, ..ForestParams::default() };
        let forest = RandomForest::fit(&x, &y, &params).unwrap();

        assert!(forest.predict_proba(&[1.0, 0.0]) > 0.5);
        assert!(forest.predict_proba(&[0.0, 0.0]) < 0.5);
        assert_eq!(forest.predict(&[1.0, 0.5]), 1);
    }

    #[test]
    fn test_importances_sum_to_one() {
        let (x, y) = dataset();
        let params = ForestParams { n_estimators: 10, ..ForestParams::default() };
        let forest = RandomForest::fit(&x, &y, &params).unwrap();

        let sum: f64 = forest.feature_importances().iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(forest.feature_importances()[0] > forest.feature_importances()[1]);
    }

    #[test]
    fn test_fit_is_reproducible() {
        let (x, y) = dataset();
        let params = ForestParams { n_estimators: 8, ..ForestParams::default() };
        let a = RandomForest::fit(&x, &y, &params).unwrap();
        let b = RandomForest::fit(&x, &y, &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_attribution_matches_probability() {
        let (x, y) = dataset();
        let params = ForestParams { n_estimators: 10, ..ForestParams::default() };
        let forest = RandomForest::fit(&x, &y, &params).unwrap();
        assert!(forest.supports_attribution());

        let sample = [1.0, 1.0 / 3.0];
        let (bias, contributions) = forest.attribution(&sample).unwrap();
        let total = bias + contributions.iter().sum::<f64>();
        assert!((total - forest.predict_proba(&sample)).abs() < 1e-9);
    }
}
