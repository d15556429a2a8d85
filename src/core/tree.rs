//! CART decision trees shared by the forest and the boosted ensemble.
//!
//! Classification trees split on weighted Gini impurity and keep the weighted
//! positive-class fraction at every node, which is what makes decision-path
//! attribution possible. Regression trees fit log-loss pseudo-residuals and
//! store Newton-step leaf values.

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Node of a fitted tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TreeNode {
    Leaf {
        value: f64,
        #[serde(default)]
        weight: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        /// Positive-class fraction at this node; absent in legacy artifacts
        #[serde(default)]
        value: Option<f64>,
        #[serde(default)]
        weight: f64,
    },
}

impl TreeNode {
    /// Leaf value reached by `x`
    pub fn predict(&self, x: &[f64]) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split { feature, threshold, left, right, .. } => {
                    let v = x.get(*feature).copied().unwrap_or(0.0);
                    node = if v <= *threshold { left } else { right };
                }
            }
        }
    }

    /// Value stored at this node, if any
    pub fn value(&self) -> Option<f64> {
        match self {
            TreeNode::Leaf { value, .. } => Some(*value),
            TreeNode::Split { value, .. } => *value,
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    /// True when every node carries its value
    pub fn has_node_values(&self) -> bool {
        match self {
            TreeNode::Leaf { .. } => true,
            TreeNode::Split { value, left, right, .. } => {
                value.is_some() && left.has_node_values() && right.has_node_values()
            }
        }
    }

    /// Decompose the prediction for `x` along its decision path.
    ///
    /// Each split credits the change in node value to the split feature, so
    /// `bias + Σ contributions == predict(x)`. Returns the bias (root value),
    /// or `None` when the tree lacks internal node values.
    pub fn path_contributions(&self, x: &[f64], contributions: &mut [f64]) -> Option<f64> {
        let bias = self.value()?;
        let mut node = self;
        let mut current = bias;

        while let TreeNode::Split { feature, threshold, left, right, .. } = node {
            let v = x.get(*feature).copied().unwrap_or(0.0);
            let next = if v <= *threshold { left } else { right };
            let next_value = next.value()?;
            if let Some(slot) = contributions.get_mut(*feature) {
                *slot += next_value - current;
            }
            current = next_value;
            node = next;
        }

        Some(bias)
    }
}

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Candidate features per split; `None` uses all features
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

/// Weighted sample: row index and weight
pub type WeightedSample = (usize, f64);

/// Binary Gini impurity from weighted class totals
#[inline]
fn gini(weight_pos: f64, weight_total: f64) -> f64 {
    if weight_total <= 0.0 {
        return 0.0;
    }
    let p = weight_pos / weight_total;
    1.0 - p * p - (1.0 - p) * (1.0 - p)
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Classification tree built on weighted samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationTree {
    pub root: TreeNode,
    /// Unnormalized weighted impurity decrease per feature
    #[serde(default)]
    pub importances: Vec<f64>,
}

impl ClassificationTree {
    pub fn fit(
        x: &[Vec<f64>],
        y: &[u8],
        samples: &[WeightedSample],
        n_features: usize,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let mut importances = vec![0.0; n_features];
        let root = grow_classifier(x, y, samples, n_features, params, 0, rng, &mut importances);
        Self { root, importances }
    }

    #[inline]
    pub fn predict_proba(&self, x: &[f64]) -> f64 {
        self.root.predict(x)
    }
}

#[allow(clippy::too_many_arguments)]
fn grow_classifier(
    x: &[Vec<f64>],
    y: &[u8],
    samples: &[WeightedSample],
    n_features: usize,
    params: &TreeParams,
    depth: usize,
    rng: &mut StdRng,
    importances: &mut [f64],
) -> TreeNode {
    let weight_total: f64 = samples.iter().map(|(_, w)| w).sum();
    let weight_pos: f64 = samples.iter().filter(|(i, _)| y[*i] == 1).map(|(_, w)| w).sum();
    let value = if weight_total > 0.0 { weight_pos / weight_total } else { 0.0 };
    let impurity = gini(weight_pos, weight_total);

    let leaf = TreeNode::Leaf { value, weight: weight_total };

    if depth >= params.max_depth
        || samples.len() < params.min_samples_split
        || impurity <= 1e-12
    {
        return leaf;
    }

    let features = candidate_features(n_features, params.max_features, rng);
    let mut best = best_gini_split(x, y, samples, &features, params.min_samples_leaf, weight_total, weight_pos);

    // Keep searching the remaining features until a valid split turns up
    if best.is_none() && features.len() < n_features {
        let rest: Vec<usize> = (0..n_features).filter(|f| !features.contains(f)).collect();
        best = best_gini_split(x, y, samples, &rest, params.min_samples_leaf, weight_total, weight_pos);
    }

    let Some(split) = best else {
        return leaf;
    };

    importances[split.feature] += split.gain;

    let (left, right): (Vec<WeightedSample>, Vec<WeightedSample>) = samples
        .iter()
        .copied()
        .partition(|(i, _)| x[*i][split.feature] <= split.threshold);

    TreeNode::Split {
        feature: split.feature,
        threshold: split.threshold,
        left: Box::new(grow_classifier(x, y, &left, n_features, params, depth + 1, rng, importances)),
        right: Box::new(grow_classifier(x, y, &right, n_features, params, depth + 1, rng, importances)),
        value: Some(value),
        weight: weight_total,
    }
}

fn candidate_features(n_features: usize, max_features: Option<usize>, rng: &mut StdRng) -> Vec<usize> {
    match max_features {
        Some(k) if k < n_features => rand::seq::index::sample(rng, n_features, k.max(1)).into_vec(),
        _ => (0..n_features).collect(),
    }
}

fn best_gini_split(
    x: &[Vec<f64>],
    y: &[u8],
    samples: &[WeightedSample],
    features: &[usize],
    min_samples_leaf: usize,
    weight_total: f64,
    weight_pos: f64,
) -> Option<SplitCandidate> {
    let parent = weight_total * gini(weight_pos, weight_total);
    let n = samples.len();
    let mut best: Option<SplitCandidate> = None;

    for &feature in features {
        let mut ordered: Vec<(f64, f64, u8)> = samples
            .iter()
            .map(|(i, w)| (x[*i][feature], *w, y[*i]))
            .collect();
        ordered.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_weight = 0.0;
        let mut left_pos = 0.0;

        for i in 0..n.saturating_sub(1) {
            let (v, w, label) = ordered[i];
            left_weight += w;
            if label == 1 {
                left_pos += w;
            }

            let next = ordered[i + 1].0;
            if (next - v).abs() <= 1e-12 {
                continue;
            }
            let left_count = i + 1;
            if left_count < min_samples_leaf || n - left_count < min_samples_leaf {
                continue;
            }

            let right_weight = weight_total - left_weight;
            let right_pos = weight_pos - left_pos;
            let gain = parent
                - left_weight * gini(left_pos, left_weight)
                - right_weight * gini(right_pos, right_weight);

            if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain + 1e-12) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: (v + next) / 2.0,
                    gain,
                });
            }
        }
    }

    best
}

/// Regression tree fitted to gradient-boosting pseudo-residuals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub root: TreeNode,
}

impl RegressionTree {
    /// Fit to residuals `y - p` with hessians `p (1 - p)`; leaves take the
    /// Newton step `Σr / Σh`.
    pub fn fit(
        x: &[Vec<f64>],
        residuals: &[f64],
        hessians: &[f64],
        rows: &[usize],
        params: &TreeParams,
    ) -> Self {
        let n_features = x.first().map_or(0, Vec::len);
        let root = grow_regressor(x, residuals, hessians, rows, n_features, params, 0);
        Self { root }
    }

    #[inline]
    pub fn predict(&self, x: &[f64]) -> f64 {
        self.root.predict(x)
    }
}

fn newton_value(residuals: &[f64], hessians: &[f64], rows: &[usize]) -> f64 {
    let numerator: f64 = rows.iter().map(|&i| residuals[i]).sum();
    let denominator: f64 = rows.iter().map(|&i| hessians[i]).sum();
    if denominator.abs() < 1e-12 {
        0.0
    } else {
        numerator / denominator
    }
}

fn grow_regressor(
    x: &[Vec<f64>],
    residuals: &[f64],
    hessians: &[f64],
    rows: &[usize],
    n_features: usize,
    params: &TreeParams,
    depth: usize,
) -> TreeNode {
    let leaf = TreeNode::Leaf {
        value: newton_value(residuals, hessians, rows),
        weight: rows.len() as f64,
    };

    if depth >= params.max_depth || rows.len() < params.min_samples_split {
        return leaf;
    }

    let n = rows.len();
    let total: f64 = rows.iter().map(|&i| residuals[i]).sum();
    let parent_score = total * total / n as f64;
    let mut best: Option<SplitCandidate> = None;

    for feature in 0..n_features {
        let mut ordered: Vec<(f64, f64)> = rows.iter().map(|&i| (x[i][feature], residuals[i])).collect();
        ordered.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_sum = 0.0;
        for i in 0..n - 1 {
            left_sum += ordered[i].1;
            let (v, next) = (ordered[i].0, ordered[i + 1].0);
            if (next - v).abs() <= 1e-12 {
                continue;
            }
            let left_count = i + 1;
            let right_count = n - left_count;
            if left_count < params.min_samples_leaf || right_count < params.min_samples_leaf {
                continue;
            }
            let right_sum = total - left_sum;
            // Reduction in squared error
            let gain = left_sum * left_sum / left_count as f64
                + right_sum * right_sum / right_count as f64
                - parent_score;

            if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain + 1e-12) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: (v + next) / 2.0,
                    gain,
                });
            }
        }
    }

    let Some(split) = best else {
        return leaf;
    };

    let (left, right): (Vec<usize>, Vec<usize>) =
        rows.iter().copied().partition(|&i| x[i][split.feature] <= split.threshold);

    TreeNode::Split {
        feature: split.feature,
        threshold: split.threshold,
        left: Box::new(grow_regressor(x, residuals, hessians, &left, n_features, params, depth + 1)),
        right: Box::new(grow_regressor(x, residuals, hessians, &right, n_features, params, depth + 1)),
        value: None,
        weight: n as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn xor_free_data() -> (Vec<Vec<f64>>, Vec<u8>) {
        let x = vec![
            vec![0.0, 1.0],
            vec![0.1, 0.0],
            vec![0.2, 1.0],
            vec![0.9, 0.0],
            vec![1.0, 1.0],
            vec![0.8, 0.0],
        ];
        let y = vec![0, 0, 0, 1, 1, 1];
        (x, y)
    }

    #[test]
    fn test_gini_bounds() {
        assert_eq!(gini(0.0, 4.0), 0.0);
        assert_eq!(gini(4.0, 4.0), 0.0);
        assert!((gini(2.0, 4.0) - 0.5).abs() < 1e-12);
        assert_eq!(gini(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_classification_tree_separates_classes() {
        let (x, y) = xor_free_data();
        let samples: Vec<WeightedSample> = (0..x.len()).map(|i| (i, 1.0)).collect();
        let mut rng = StdRng::seed_from_u64(7);

        let tree = ClassificationTree::fit(&x, &y, &samples, 2, &TreeParams::default(), &mut rng);

        assert_eq!(tree.predict_proba(&[0.05, 0.5]), 0.0);
        assert_eq!(tree.predict_proba(&[0.95, 0.5]), 1.0);
        assert!(tree.importances[0] > 0.0);
        assert_eq!(tree.importances[1], 0.0);
    }

    #[test]
    fn test_max_depth_zero_is_leaf() {
        let (x, y) = xor_free_data();
        let samples: Vec<WeightedSample> = (0..x.len()).map(|i| (i, 1.0)).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let params = TreeParams { max_depth: 0, ..TreeParams::default() };

        let tree = ClassificationTree::fit(&x, &y, &samples, 2, &params, &mut rng);
        assert_eq!(tree.root.depth(), 0);
        assert!((tree.predict_proba(&[0.0, 0.0]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_path_contributions_are_additive() {
        let (x, y) = xor_free_data();
        let samples: Vec<WeightedSample> = (0..x.len()).map(|i| (i, 1.0)).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let tree = ClassificationTree::fit(&x, &y, &samples, 2, &TreeParams::default(), &mut rng);

        for row in &x {
            let mut contributions = vec![0.0; 2];
            let bias = tree.root.path_contributions(row, &mut contributions).unwrap();
            let total = bias + contributions.iter().sum::<f64>();
            assert!((total - tree.predict_proba(row)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_missing_node_values_disable_attribution() {
        let node = TreeNode::Split {
            feature: 0,
            threshold: 0.5,
            left: Box::new(TreeNode::Leaf { value: 0.0, weight: 1.0 }),
            right: Box::new(TreeNode::Leaf { value: 1.0, weight: 1.0 }),
            value: None,
            weight: 2.0,
        };

        assert!(!node.has_node_values());
        assert!(node.path_contributions(&[1.0], &mut [0.0]).is_none());
    }

    #[test]
    fn test_regression_tree_newton_leaves() {
        let x = vec![vec![0.0], vec![0.0], vec![1.0], vec![1.0]];
        let residuals = vec![-0.5, -0.5, 0.5, 0.5];
        let hessians = vec![0.25; 4];
        let rows = vec![0, 1, 2, 3];

        let tree = RegressionTree::fit(&x, &residuals, &hessians, &rows, &TreeParams::default());
        assert!((tree.predict(&[0.0]) + 2.0).abs() < 1e-9);
        assert!((tree.predict(&[1.0]) - 2.0).abs() < 1e-9);
    }
}
