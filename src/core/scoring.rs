use crate::engine::{Population, TrainedSnapshot};
use crate::error::{EngineError, Result};
use crate::models::{CompatibilityResult, LabelThresholds};

/// Lower bound of a reported compatibility score
pub const MIN_COMPATIBILITY: f64 = 10.0;
/// Upper bound of a reported compatibility score
pub const MAX_COMPATIBILITY: f64 = 95.0;

/// Blend formula:
/// compatibility = clamp(100 * (0.5 * similarity + 0.5 * probability), 10, 95)
#[inline]
pub fn blended_score(similarity: f64, probability: f64) -> f64 {
    (100.0 * (0.5 * similarity + 0.5 * probability)).clamp(MIN_COMPATIBILITY, MAX_COMPATIBILITY)
}

#[inline]
fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Pairwise scorer bound to one snapshot and one encoded population
#[derive(Debug, Clone, Copy)]
pub struct ScoreBlender<'a> {
    snapshot: &'a TrainedSnapshot,
    population: &'a Population,
    thresholds: LabelThresholds,
}

impl<'a> ScoreBlender<'a> {
    pub fn new(snapshot: &'a TrainedSnapshot, population: &'a Population) -> Self {
        Self {
            snapshot,
            population,
            thresholds: LabelThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: LabelThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn population(&self) -> &'a Population {
        self.population
    }

    /// Score two residents by id
    pub fn blend(&self, id_a: u32, id_b: u32) -> Result<CompatibilityResult> {
        if id_a == id_b {
            return Err(EngineError::InvalidPair(id_a));
        }
        let row_a = self.population.row_of(id_a)?;
        let row_b = self.population.row_of(id_b)?;
        Ok(self.blend_rows(row_a, row_b))
    }

    /// Score two population rows; callers guarantee the rows differ
    pub fn blend_rows(&self, row_a: usize, row_b: usize) -> CompatibilityResult {
        let similarity = self.population.similarity(row_a, row_b);
        let input = self
            .snapshot
            .pair_input(self.population.encoded(row_a), self.population.encoded(row_b));
        let probability = self.snapshot.classifier.predict_proba(&input);
        let satisfaction = self.snapshot.satisfaction.predict_proba(&input);

        let compatibility_pct = round1(blended_score(similarity, probability));

        CompatibilityResult {
            resident_a: self.population.resident(row_a).id,
            resident_b: self.population.resident(row_b).id,
            compatibility_pct,
            similarity_pct: round1(similarity * 100.0),
            model_probability_pct: round1(probability * 100.0),
            satisfaction_pct: round1(satisfaction * 100.0),
            recommendation: self.thresholds.label(compatibility_pct),
        }
    }
}

/// Blended compatibility of two residents with default label thresholds
pub fn blend(
    snapshot: &TrainedSnapshot,
    population: &Population,
    id_a: u32,
    id_b: u32,
) -> Result<CompatibilityResult> {
    ScoreBlender::new(snapshot, population).blend(id_a, id_b)
}
