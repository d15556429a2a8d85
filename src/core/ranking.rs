use rayon::prelude::*;
use tracing::debug;

use crate::core::scoring::ScoreBlender;
use crate::error::{EngineError, Result};
use crate::models::{Attribute, RankedList, RankedMatch, Resident, SharedTrait};

/// Attributes reported as shared when equal
pub const SHARED_FACTORS: [Attribute; 6] = [
    Attribute::Smoking,
    Attribute::Pets,
    Attribute::Tidiness,
    Attribute::Sport,
    Attribute::Chronotype,
    Attribute::Education,
];

/// Attributes reported as differing when unequal
pub const DIFFERING_FACTORS: [Attribute; 5] = [
    Attribute::Smoking,
    Attribute::Pets,
    Attribute::Tidiness,
    Attribute::Sport,
    Attribute::Chronotype,
];

/// Score at or above which a candidate counts as strong
pub const STRONG_CANDIDATE_SCORE: f64 = 70.0;

/// Ranking limits
#[derive(Debug, Clone, Copy)]
pub struct RankingLimits {
    pub candidate_cap: usize,
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for RankingLimits {
    fn default() -> Self {
        Self {
            candidate_cap: 20,
            default_limit: 5,
            max_limit: 15,
        }
    }
}

/// Ranks the best roommates for a base resident
#[derive(Debug, Clone, Copy, Default)]
pub struct Ranker {
    limits: RankingLimits,
}

impl Ranker {
    pub fn new(limits: RankingLimits) -> Self {
        Self { limits }
    }

    /// Find the best matches for `base_id`.
    ///
    /// `limit` defaults to the configured value and is capped at the
    /// configured maximum; an explicit `0` is rejected.
    pub fn recommend(&self, blender: &ScoreBlender<'_>, base_id: u32, limit: Option<usize>) -> Result<RankedList> {
        let limit = match limit {
            Some(0) => {
                return Err(EngineError::InvalidParameter("limit must be positive".to_string()));
            }
            Some(n) => n.min(self.limits.max_limit),
            None => self.limits.default_limit,
        };

        let population = blender.population();
        let base_row = population.row_of(base_id)?;
        let base = population.resident(base_row);

        let candidates: Vec<usize> = (0..population.len())
            .filter(|&row| row != base_row)
            .take(self.limits.candidate_cap)
            .collect();

        let mut scored: Vec<RankedMatch> = candidates
            .par_iter()
            .map(|&row| {
                let candidate = population.resident(row);
                RankedMatch {
                    resident_id: candidate.id,
                    name: candidate.name.clone(),
                    age: candidate.age,
                    compatibility: blender.blend_rows(base_row, row),
                    shared: shared_traits(base, candidate),
                    differing: differing_traits(base, candidate),
                }
            })
            .collect();

        // Sort by score (descending) and then by id (ascending)
        scored.sort_by(|a, b| {
            b.compatibility
                .compatibility_pct
                .partial_cmp(&a.compatibility.compatibility_pct)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.resident_id.cmp(&b.resident_id))
        });

        let top: Vec<f64> = scored.iter().take(10).map(|m| m.compatibility.compatibility_pct).collect();
        let average_top_score =
            (!top.is_empty()).then(|| ((top.iter().sum::<f64>() / top.len() as f64) * 10.0).round() / 10.0);
        let strong_candidates = scored
            .iter()
            .filter(|m| m.compatibility.compatibility_pct >= STRONG_CANDIDATE_SCORE)
            .count();

        scored.truncate(limit);
        debug!(base_id, returned = scored.len(), "Ranked candidates");

        Ok(RankedList {
            base_id,
            matches: scored,
            average_top_score,
            strong_candidates,
        })
    }
}

/// Rank with default limits
pub fn recommend(blender: &ScoreBlender<'_>, base_id: u32, limit: Option<usize>) -> Result<RankedList> {
    Ranker::default().recommend(blender, base_id, limit)
}

pub fn shared_traits(a: &Resident, b: &Resident) -> Vec<SharedTrait> {
    SHARED_FACTORS
        .iter()
        .filter(|&&attribute| a.attribute(attribute) == b.attribute(attribute))
        .map(|&attribute| SharedTrait {
            attribute,
            value: a.attribute(attribute).to_string(),
        })
        .collect()
}

pub fn differing_traits(a: &Resident, b: &Resident) -> Vec<Attribute> {
    DIFFERING_FACTORS
        .iter()
        .copied()
        .filter(|&attribute| a.attribute(attribute) != b.attribute(attribute))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_and_differing() {
        let a = Resident::new(1, "Ana", Some(22.0))
            .with(Attribute::Smoking, "no")
            .with(Attribute::Pets, "no pets")
            .with(Attribute::Education, "university");
        let b = Resident::new(2, "Bea", Some(24.0))
            .with(Attribute::Smoking, "no")
            .with(Attribute::Pets, "has pets")
            .with(Attribute::Education, "university");

        let shared = shared_traits(&a, &b);
        assert!(shared.contains(&SharedTrait { attribute: Attribute::Smoking, value: "no".to_string() }));
        assert!(shared.contains(&SharedTrait { attribute: Attribute::Education, value: "university".to_string() }));
        assert!(!shared.iter().any(|t| t.attribute == Attribute::Pets));

        assert_eq!(differing_traits(&a, &b), vec![Attribute::Pets]);
    }

    #[test]
    fn test_default_limits() {
        let limits = RankingLimits::default();
        assert_eq!(limits.candidate_cap, 20);
        assert_eq!(limits.default_limit, 5);
        assert_eq!(limits.max_limit, 15);
    }
}
