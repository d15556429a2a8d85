//! K-Means clustering.
//!
//! Lloyd's algorithm with k-means++ seeding. `n_init` independent runs, each
//! with its own derived seed, are executed and the lowest-inertia run wins.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::similarity::squared_distance;
use crate::error::TrainingError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KMeansParams {
    pub n_clusters: usize,
    pub n_init: usize,
    pub max_iter: usize,
    pub tol: f64,
    pub random_state: u64,
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self {
            n_clusters: 5,
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
            random_state: 42,
        }
    }
}

/// Fitted clustering: centroids plus the training assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeans {
    centroids: Vec<Vec<f64>>,
    labels: Vec<usize>,
    inertia: f64,
    n_iter: usize,
}

/// Index of the nearest centroid; ties resolve to the lowest index
pub fn nearest_centroid(centroids: &[Vec<f64>], x: &[f64]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, centroid) in centroids.iter().enumerate() {
        let d = squared_distance(centroid, x);
        if d < best_distance {
            best = i;
            best_distance = d;
        }
    }
    best
}

fn kmeans_plus_plus(x: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(x[rng.gen_range(0..x.len())].clone());

    while centroids.len() < k {
        let distances: Vec<f64> = x
            .iter()
            .map(|row| {
                centroids
                    .iter()
                    .map(|c| squared_distance(c, row))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();

        // All points coincide with a centroid: fall back to a uniform pick
        let next = match WeightedIndex::new(&distances) {
            Ok(dist) => dist.sample(rng),
            Err(_) => rng.gen_range(0..x.len()),
        };
        centroids.push(x[next].clone());
    }

    centroids
}

fn lloyd(x: &[Vec<f64>], mut centroids: Vec<Vec<f64>>, params: &KMeansParams) -> KMeans {
    let width = centroids.first().map_or(0, Vec::len);
    let mut labels = vec![0usize; x.len()];
    let mut n_iter = 0;

    for iteration in 0..params.max_iter.max(1) {
        n_iter = iteration + 1;
        for (label, row) in labels.iter_mut().zip(x) {
            *label = nearest_centroid(&centroids, row);
        }

        let mut sums = vec![vec![0.0; width]; centroids.len()];
        let mut counts = vec![0usize; centroids.len()];
        for (row, &label) in x.iter().zip(&labels) {
            counts[label] += 1;
            for (s, v) in sums[label].iter_mut().zip(row) {
                *s += v;
            }
        }

        let mut shift = 0.0;
        for ((centroid, sum), &count) in centroids.iter_mut().zip(sums).zip(&counts) {
            // Empty clusters keep their previous centroid
            if count == 0 {
                continue;
            }
            let updated: Vec<f64> = sum.into_iter().map(|s| s / count as f64).collect();
            shift += squared_distance(centroid, &updated);
            *centroid = updated;
        }

        if shift <= params.tol {
            break;
        }
    }

    for (label, row) in labels.iter_mut().zip(x) {
        *label = nearest_centroid(&centroids, row);
    }
    let inertia = x
        .iter()
        .zip(&labels)
        .map(|(row, &label)| squared_distance(&centroids[label], row))
        .sum();

    KMeans { centroids, labels, inertia, n_iter }
}

impl KMeans {
    pub fn fit(x: &[Vec<f64>], params: &KMeansParams) -> Result<Self, TrainingError> {
        if params.n_clusters == 0 || params.n_clusters > x.len() {
            return Err(TrainingError::InsufficientData(format!(
                "cannot form {} clusters from {} rows",
                params.n_clusters,
                x.len()
            )));
        }

        let runs: Vec<KMeans> = (0..params.n_init.max(1))
            .into_par_iter()
            .map(|run| {
                let mut rng = StdRng::seed_from_u64(params.random_state.wrapping_add(run as u64));
                let seeds = kmeans_plus_plus(x, params.n_clusters, &mut rng);
                lloyd(x, seeds, params)
            })
            .collect();

        // First run wins ties so the result does not depend on scheduling
        let mut best: Option<KMeans> = None;
        for run in runs {
            if best.as_ref().map_or(true, |b| run.inertia < b.inertia) {
                best = Some(run);
            }
        }
        best.ok_or_else(|| TrainingError::InsufficientData("no clustering run completed".to_string()))
    }

    pub fn predict(&self, x: &[f64]) -> usize {
        nearest_centroid(&self.centroids, x)
    }

    pub fn centroids(&self) -> &[Vec<f64>] {
        &self.centroids
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.0],
            vec![0.1, 0.2],
            vec![0.2, 0.1],
            vec![5.0, 5.0],
            vec![5.1, 4.9],
            vec![4.9, 5.2],
        ]
    }

    #[test]
    fn test_two_blobs() {
        let params = KMeansParams { n_clusters: 2, ..KMeansParams::default() };
        let model = KMeans::fit(&blobs(), &params).unwrap();
        let labels = model.labels();

        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_ne!(labels[0], labels[3]);
        assert!(model.inertia() < 1.0);
        assert_eq!(model.predict(&[5.0, 5.1]), labels[3]);
    }

    #[test]
    fn test_reproducible() {
        let params = KMeansParams { n_clusters: 2, ..KMeansParams::default() };
        assert_eq!(KMeans::fit(&blobs(), &params).unwrap(), KMeans::fit(&blobs(), &params).unwrap());
    }

    #[test]
    fn test_too_many_clusters() {
        let params = KMeansParams { n_clusters: 7, ..KMeansParams::default() };
        assert!(KMeans::fit(&blobs(), &params).is_err());
    }

    #[test]
    fn test_identical_points() {
        let x = vec![vec![1.0, 1.0]; 4];
        let params = KMeansParams { n_clusters: 2, ..KMeansParams::default() };
        let model = KMeans::fit(&x, &params).unwrap();
        assert_eq!(model.inertia(), 0.0);
    }

    #[test]
    fn test_nearest_centroid_tie_breaks_low() {
        let centroids = vec![vec![0.0], vec![2.0]];
        assert_eq!(nearest_centroid(&centroids, &[1.0]), 0);
    }
}
