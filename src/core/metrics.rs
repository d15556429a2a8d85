//! Binary classification metrics.
//!
//! Precision, recall and F1 are support-weighted across both classes; a class
//! with no predicted (or no actual) members contributes 0 rather than failing.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl ConfusionMatrix {
    pub fn from_labels(y_true: &[u8], y_pred: &[u8]) -> Self {
        let mut matrix = Self::default();
        for (&actual, &predicted) in y_true.iter().zip(y_pred) {
            match (actual, predicted) {
                (1, 1) => matrix.true_positive += 1,
                (0, 1) => matrix.false_positive += 1,
                (1, _) => matrix.false_negative += 1,
                _ => matrix.true_negative += 1,
            }
        }
        matrix
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }
}

#[inline]
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[inline]
fn harmonic(precision: f64, recall: f64) -> f64 {
    if precision + recall <= 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

pub fn accuracy(y_true: &[u8], y_pred: &[u8]) -> f64 {
    let m = ConfusionMatrix::from_labels(y_true, y_pred);
    ratio(m.true_positive + m.true_negative, m.total())
}

/// Support-weighted (precision, recall, f1)
pub fn weighted_scores(y_true: &[u8], y_pred: &[u8]) -> (f64, f64, f64) {
    let m = ConfusionMatrix::from_labels(y_true, y_pred);
    let total = m.total();
    if total == 0 {
        return (0.0, 0.0, 0.0);
    }

    let positive_support = m.true_positive + m.false_negative;
    let negative_support = m.true_negative + m.false_positive;

    let p_pos = ratio(m.true_positive, m.true_positive + m.false_positive);
    let r_pos = ratio(m.true_positive, positive_support);
    let p_neg = ratio(m.true_negative, m.true_negative + m.false_negative);
    let r_neg = ratio(m.true_negative, negative_support);

    let w_pos = positive_support as f64 / total as f64;
    let w_neg = negative_support as f64 / total as f64;

    (
        w_pos * p_pos + w_neg * p_neg,
        w_pos * r_pos + w_neg * r_neg,
        w_pos * harmonic(p_pos, r_pos) + w_neg * harmonic(p_neg, r_neg),
    )
}

/// Mean and population standard deviation
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// True positive rate and false positive rate; `None` when a class is absent
pub fn rates(y_true: &[u8], y_pred: &[u8]) -> (Option<f64>, Option<f64>) {
    let m = ConfusionMatrix::from_labels(y_true, y_pred);
    let positives = m.true_positive + m.false_negative;
    let negatives = m.false_positive + m.true_negative;
    let tpr = (positives > 0).then(|| ratio(m.true_positive, positives));
    let fpr = (negatives > 0).then(|| ratio(m.false_positive, negatives));
    (tpr, fpr)
}
