use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::models::{Attribute, Resident};

/// Fixed-width numeric representation of a resident
pub type EncodedVector = Vec<f64>;

/// Age statistics captured at fit time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgeStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// One-hot encoder for categorical attributes plus min-max scaled age.
///
/// Layout: `age` first, then one indicator per observed value of each
/// attribute, attributes in `Attribute::ALL` order and values sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    age: AgeStats,
    vocabulary: Vec<(Attribute, Vec<String>)>,
}

impl FeatureEncoder {
    /// Learn the vocabulary and age statistics from a training population
    pub fn fit(residents: &[Resident]) -> Result<Self> {
        if residents.is_empty() {
            return Err(EngineError::EmptyPopulation);
        }

        let ages: Vec<f64> = residents.iter().filter_map(|r| r.age).collect();
        let age = if ages.is_empty() {
            AgeStats { min: 0.0, max: 0.0, mean: 0.0 }
        } else {
            AgeStats {
                min: ages.iter().copied().fold(f64::INFINITY, f64::min),
                max: ages.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                mean: ages.iter().sum::<f64>() / ages.len() as f64,
            }
        };

        let vocabulary = Attribute::ALL
            .iter()
            .map(|attribute| {
                let mut values: Vec<String> = residents
                    .iter()
                    .map(|r| r.attribute(*attribute).to_string())
                    .collect();
                values.sort();
                values.dedup();
                (*attribute, values)
            })
            .collect();

        Ok(Self { age, vocabulary })
    }

    /// Number of features produced by `transform`
    pub fn width(&self) -> usize {
        1 + self.vocabulary.iter().map(|(_, v)| v.len()).sum::<usize>()
    }

    pub fn age_stats(&self) -> AgeStats {
        self.age
    }

    /// Feature identifiers aligned with the encoded layout
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.width());
        names.push("age".to_string());
        for (attribute, values) in &self.vocabulary {
            for value in values {
                names.push(format!("{}_{}", attribute.key(), value));
            }
        }
        names
    }

    /// Encode one resident; values not seen at fit time encode as all zeros
    pub fn transform(&self, resident: &Resident) -> EncodedVector {
        let mut encoded = Vec::with_capacity(self.width());
        encoded.push(self.scale_age(resident.age));

        for (attribute, values) in &self.vocabulary {
            let observed = resident.attribute(*attribute);
            let hit = values.binary_search_by(|v| v.as_str().cmp(observed)).ok();
            encoded.extend((0..values.len()).map(|i| if Some(i) == hit { 1.0 } else { 0.0 }));
        }

        encoded
    }

    pub fn transform_all(&self, residents: &[Resident]) -> Vec<EncodedVector> {
        residents.iter().map(|r| self.transform(r)).collect()
    }

    #[inline]
    fn scale_age(&self, age: Option<f64>) -> f64 {
        let value = age.unwrap_or(self.age.mean);
        let range = self.age.max - self.age.min;
        if range <= 0.0 {
            return 0.0;
        }
        ((value - self.age.min) / range).clamp(0.0, 1.0)
    }
}

/// Per-column standardization applied before the classifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &[EncodedVector]) -> Result<Self> {
        let first = rows.first().ok_or(EngineError::EmptyPopulation)?;
        let width = first.len();
        let n = rows.len() as f64;

        let mut mean = vec![0.0; width];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut variance = vec![0.0; width];
        for row in rows {
            for ((var, v), m) in variance.iter_mut().zip(row).zip(&mean) {
                *var += (v - m).powi(2);
            }
        }

        // Constant columns keep unit scale
        let scale = variance
            .into_iter()
            .map(|var| {
                let std = (var / n).sqrt();
                if std > 1e-12 { std } else { 1.0 }
            })
            .collect();

        Ok(Self { mean, scale })
    }

    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }

    pub fn transform_all(&self, rows: &[EncodedVector]) -> Vec<Vec<f64>> {
        rows.iter().map(|r| self.transform(r)).collect()
    }
}
