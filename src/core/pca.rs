use serde::{Deserialize, Serialize};

use crate::error::TrainingError;

const POWER_ITERATIONS: usize = 500;
const CONVERGENCE: f64 = 1e-10;

/// Principal component projection used to lay the population out in 2-D.
///
/// Components are the leading eigenvectors of the covariance matrix, found
/// by power iteration with deflation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pca {
    mean: Vec<f64>,
    components: Vec<Vec<f64>>,
    explained_variance: Vec<f64>,
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn normalize(v: &mut [f64]) -> f64 {
    let norm = dot(v, v).sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    norm
}

impl Pca {
    pub fn fit(x: &[Vec<f64>], n_components: usize) -> Result<Self, TrainingError> {
        let first = x
            .first()
            .ok_or_else(|| TrainingError::InsufficientData("no rows to project".to_string()))?;
        let width = first.len();
        let n = x.len() as f64;

        let mut mean = vec![0.0; width];
        for row in x {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let denominator = if x.len() > 1 { n - 1.0 } else { 1.0 };
        let mut covariance = vec![vec![0.0; width]; width];
        for row in x {
            let centered: Vec<f64> = row.iter().zip(&mean).map(|(v, m)| v - m).collect();
            for i in 0..width {
                for j in i..width {
                    covariance[i][j] += centered[i] * centered[j] / denominator;
                }
            }
        }
        for i in 0..width {
            for j in 0..i {
                covariance[i][j] = covariance[j][i];
            }
        }

        let mut components = Vec::new();
        let mut explained_variance = Vec::new();

        for _ in 0..n_components.min(width) {
            let (vector, eigenvalue) = leading_eigenvector(&covariance);
            // Deflate so the next iteration finds the following component
            for i in 0..width {
                for j in 0..width {
                    covariance[i][j] -= eigenvalue * vector[i] * vector[j];
                }
            }
            components.push(vector);
            explained_variance.push(eigenvalue.max(0.0));
        }

        Ok(Self {
            mean,
            components,
            explained_variance,
        })
    }

    /// Coordinates of `x` in component space
    pub fn project(&self, x: &[f64]) -> Vec<f64> {
        let centered: Vec<f64> = x.iter().zip(&self.mean).map(|(v, m)| v - m).collect();
        self.components.iter().map(|c| dot(c, &centered)).collect()
    }

    pub fn components(&self) -> &[Vec<f64>] {
        &self.components
    }

    pub fn explained_variance(&self) -> &[f64] {
        &self.explained_variance
    }
}

fn leading_eigenvector(matrix: &[Vec<f64>]) -> (Vec<f64>, f64) {
    let width = matrix.len();
    let mut v: Vec<f64> = (0..width).map(|j| 1.0 + j as f64 / width as f64).collect();
    normalize(&mut v);

    for _ in 0..POWER_ITERATIONS {
        let mut next: Vec<f64> = matrix.iter().map(|row| dot(row, &v)).collect();
        if normalize(&mut next) <= CONVERGENCE {
            return (v, 0.0);
        }
        let delta: f64 = next.iter().zip(&v).map(|(a, b)| (a - b).abs()).sum();
        v = next;
        if delta < CONVERGENCE {
            break;
        }
    }

    // Fix the sign so the largest coordinate is positive
    let pivot = v
        .iter()
        .copied()
        .fold(0.0_f64, |acc, x| if x.abs() > acc.abs() { x } else { acc });
    if pivot < 0.0 {
        v.iter_mut().for_each(|x| *x = -*x);
    }

    let mv: Vec<f64> = matrix.iter().map(|row| dot(row, &v)).collect();
    let eigenvalue = dot(&v, &mv);
    (v, eigenvalue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_component_follows_spread() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, 0.5 * (i % 2) as f64]).collect();
        let pca = Pca::fit(&x, 2).unwrap();

        let first = &pca.components()[0];
        assert!(first[0].abs() > 0.99);
        assert!(pca.explained_variance()[0] > pca.explained_variance()[1]);
    }

    #[test]
    fn test_components_are_orthonormal() {
        let x = vec![
            vec![1.0, 2.0, 0.0],
            vec![2.0, 1.0, 1.0],
            vec![3.0, 4.0, 0.0],
            vec![4.0, 3.0, 1.0],
        ];
        let pca = Pca::fit(&x, 2).unwrap();
        let c = pca.components();

        assert!((dot(&c[0], &c[0]) - 1.0).abs() < 1e-6);
        assert!((dot(&c[1], &c[1]) - 1.0).abs() < 1e-6);
        assert!(dot(&c[0], &c[1]).abs() < 1e-6);
    }

    #[test]
    fn test_projection_of_mean_is_origin() {
        let x = vec![vec![0.0, 0.0], vec![2.0, 2.0]];
        let pca = Pca::fit(&x, 2).unwrap();
        let projected = pca.project(&[1.0, 1.0]);
        assert!(projected.iter().all(|v| v.abs() < 1e-12));
    }
}
