//! Secondary satisfaction classifier: gradient-boosted regression trees on
//! the binomial log-loss.

use serde::{Deserialize, Serialize};

use crate::core::forest::validate_labels;
use crate::core::tree::{RegressionTree, TreeParams};
use crate::error::TrainingError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 50,
            learning_rate: 0.1,
            max_depth: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    /// Prior log-odds of the positive class
    init: f64,
    learning_rate: f64,
    stages: Vec<RegressionTree>,
}

#[inline]
fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl GradientBoosting {
    pub fn fit(x: &[Vec<f64>], y: &[u8], params: &BoostingParams) -> Result<Self, TrainingError> {
        validate_labels(x, y)?;

        let n = x.len();
        let positive_rate = y.iter().filter(|&&label| label == 1).count() as f64 / n as f64;
        let prior = positive_rate.clamp(1e-6, 1.0 - 1e-6);
        let init = (prior / (1.0 - prior)).ln();

        let tree_params = TreeParams {
            max_depth: params.max_depth,
            ..TreeParams::default()
        };
        let rows: Vec<usize> = (0..n).collect();
        let mut raw = vec![init; n];
        let mut stages = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            let probabilities: Vec<f64> = raw.iter().map(|&z| sigmoid(z)).collect();
            let residuals: Vec<f64> = y
                .iter()
                .zip(&probabilities)
                .map(|(&label, p)| f64::from(label) - p)
                .collect();
            let hessians: Vec<f64> = probabilities.iter().map(|p| p * (1.0 - p)).collect();

            let tree = RegressionTree::fit(x, &residuals, &hessians, &rows, &tree_params);
            for (score, row) in raw.iter_mut().zip(x) {
                *score += params.learning_rate * tree.predict(row);
            }
            stages.push(tree);
        }

        Ok(Self {
            init,
            learning_rate: params.learning_rate,
            stages,
        })
    }

    /// Additive log-odds score
    pub fn decision_function(&self, x: &[f64]) -> f64 {
        self.init
            + self.learning_rate * self.stages.iter().map(|tree| tree.predict(x)).sum::<f64>()
    }

    pub fn predict_proba(&self, x: &[f64]) -> f64 {
        sigmoid(self.decision_function(x))
    }

    pub fn predict(&self, x: &[f64]) -> u8 {
        u8::from(self.predict_proba(x) >= 0.5)
    }

    pub fn n_stages(&self) -> usize {
        self.stages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prior_only_model() {
        let x = vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]];
        let y = vec![0, 0, 0, 1];
        let params = BoostingParams { n_estimators: 0, ..BoostingParams::default() };

        let model = GradientBoosting::fit(&x, &y, &params).unwrap();
        assert_eq!(model.n_stages(), 0);
        assert!((model.predict_proba(&[0.0]) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_boosting_separates_classes() {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
        let y: Vec<u8> = (0..20).map(|i| u8::from(i >= 10)).collect();

        let model = GradientBoosting::fit(&x, &y, &BoostingParams::default()).unwrap();
        assert_eq!(model.n_stages(), 50);
        assert!(model.predict_proba(&[2.0]) < 0.2);
        assert!(model.predict_proba(&[17.0]) > 0.8);
        assert_eq!(model.predict(&[15.0]), 1);
    }

    #[test]
    fn test_rejects_single_class() {
        let x = vec![vec![0.0], vec![1.0]];
        assert!(GradientBoosting::fit(&x, &[0, 0], &BoostingParams::default()).is_err());
    }
}
