use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::debug;

use crate::core::kmeans::{KMeans, KMeansParams};
use crate::core::scoring::ScoreBlender;
use crate::core::similarity::{cosine_similarity, squared_distance};
use crate::engine::Population;
use crate::error::{EngineError, Result};
use crate::models::{Attribute, Group, GroupingRequest, GroupingResult, SharedTrait, UNKNOWN};

/// Partitions a population into capacity-bounded affinity groups
///
/// # Pipeline Stages
/// 1. K-Means on the encoded population
/// 2. Capacity repair: over-full clusters shed their least typical members
/// 3. Per-group scoring and shared traits
#[derive(Debug, Clone, Copy)]
pub struct GroupingEngine {
    n_init: usize,
    random_state: u64,
}

impl Default for GroupingEngine {
    fn default() -> Self {
        Self {
            n_init: 10,
            random_state: 42,
        }
    }
}

impl GroupingEngine {
    pub fn new(n_init: usize, random_state: u64) -> Self {
        Self { n_init, random_state }
    }

    pub fn form_groups(&self, blender: &ScoreBlender<'_>, request: GroupingRequest) -> Result<GroupingResult> {
        let population = blender.population();
        validate(population, request)?;

        let clustering = KMeans::fit(
            population.encoded_rows(),
            &KMeansParams {
                n_clusters: request.group_count,
                n_init: self.n_init,
                random_state: self.random_state,
                ..KMeansParams::default()
            },
        )?;

        let mut clusters: Vec<Vec<usize>> = vec![Vec::new(); request.group_count];
        for (row, &label) in clustering.labels().iter().enumerate() {
            clusters[label].push(row);
        }

        let pending = enforce_capacity(population, clustering.centroids(), &mut clusters, request.max_size);

        let mut groups: Vec<Group> = clusters
            .into_iter()
            .filter(|rows| !rows.is_empty())
            .map(|rows| build_group(blender, rows))
            .collect();
        groups.sort_by_key(|g| g.members.first().copied());

        let mut pending: Vec<u32> = pending.into_iter().map(|row| population.resident(row).id).collect();
        pending.sort_unstable();

        debug!(groups = groups.len(), pending = pending.len(), "Grouping complete");
        Ok(GroupingResult { groups, pending })
    }
}

/// Group a population with default clustering settings
pub fn form_groups(blender: &ScoreBlender<'_>, request: GroupingRequest) -> Result<GroupingResult> {
    GroupingEngine::default().form_groups(blender, request)
}

fn validate(population: &Population, request: GroupingRequest) -> Result<()> {
    if request.group_count <= 1 {
        return Err(EngineError::InvalidParameter(format!(
            "group count must be at least 2, got {}",
            request.group_count
        )));
    }
    if request.max_size == 0 {
        return Err(EngineError::InvalidParameter("max group size must be positive".to_string()));
    }
    if population.is_empty() {
        return Err(EngineError::EmptyPopulation);
    }
    if request.group_count > population.len() {
        return Err(EngineError::InvalidParameter(format!(
            "cannot form {} groups from {} residents",
            request.group_count,
            population.len()
        )));
    }
    Ok(())
}

/// Move members out of over-full clusters. Returns rows that found no room.
fn enforce_capacity(
    population: &Population,
    centroids: &[Vec<f64>],
    clusters: &mut [Vec<usize>],
    max_size: usize,
) -> Vec<usize> {
    let mut pending = Vec::new();

    for index in 0..clusters.len() {
        while clusters[index].len() > max_size {
            let centroid = &centroids[index];

            // Least typical member; ties go to the lowest resident id
            let Some(position) = clusters[index]
                .iter()
                .enumerate()
                .min_by(|&(_, &a), &(_, &b)| {
                    let sa = cosine_similarity(population.encoded(a), centroid);
                    let sb = cosine_similarity(population.encoded(b), centroid);
                    sa.partial_cmp(&sb)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| population.resident(a).id.cmp(&population.resident(b).id))
                })
                .map(|(position, _)| position)
            else {
                break;
            };
            let row = clusters[index].remove(position);

            let target = clusters
                .iter()
                .enumerate()
                .filter(|(other, members)| *other != index && members.len() < max_size)
                .map(|(other, _)| (other, squared_distance(population.encoded(row), &centroids[other])))
                .min_by(|a, b| {
                    a.1.partial_cmp(&b.1)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.0.cmp(&b.0))
                })
                .map(|(other, _)| other);

            match target {
                Some(other) => clusters[other].push(row),
                None => pending.push(row),
            }
        }
    }

    pending
}

fn build_group(blender: &ScoreBlender<'_>, mut rows: Vec<usize>) -> Group {
    let population = blender.population();
    rows.sort_by_key(|&row| population.resident(row).id);

    let pairs: Vec<(usize, usize)> = rows
        .iter()
        .enumerate()
        .flat_map(|(i, &a)| rows[i + 1..].iter().map(move |&b| (a, b)))
        .collect();

    let average_compatibility = if pairs.is_empty() {
        None
    } else {
        let total: f64 = pairs
            .par_iter()
            .map(|&(a, b)| blender.blend_rows(a, b).compatibility_pct)
            .sum();
        Some(((total / pairs.len() as f64) * 10.0).round() / 10.0)
    };

    Group {
        members: rows.iter().map(|&row| population.resident(row).id).collect(),
        average_compatibility,
        common_traits: common_traits(population, &rows),
    }
}

/// Values held by more than half of the members, in attribute order
pub fn common_traits(population: &Population, rows: &[usize]) -> Vec<SharedTrait> {
    Attribute::ALL
        .iter()
        .filter_map(|&attribute| {
            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for &row in rows {
                *counts.entry(population.resident(row).attribute(attribute)).or_insert(0) += 1;
            }
            counts
                .into_iter()
                .find(|(value, count)| *value != UNKNOWN && count * 2 > rows.len())
                .map(|(value, _)| SharedTrait {
                    attribute,
                    value: value.to_string(),
                })
        })
        .collect()
}
