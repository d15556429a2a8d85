// Integration tests for RoomMatch Algo

use roommatch_algo::core::forest::ForestParams;
use roommatch_algo::core::training::{train, LabelSource, TrainingConfig};
use roommatch_algo::core::{form_groups, recommend, Explanation, ScoreBlender};
use roommatch_algo::engine::{Population, SnapshotCell, TrainedSnapshot};
use roommatch_algo::error::EngineError;
use roommatch_algo::models::{Attribute, GroupingRequest, Resident};
use roommatch_algo::services::{LoadOutcome, ModelStore};

fn create_test_resident(id: u32) -> Resident {
    Resident::new(id, format!("Resident {}", id), Some(18.0 + (id % 30) as f64))
        .with(Attribute::Gender, if id % 2 == 0 { "female" } else { "male" })
        .with(Attribute::Smoking, if id % 3 == 0 { "yes" } else { "no" })
        .with(Attribute::Tidiness, if id % 4 == 0 { "messy" } else { "tidy" })
        .with(Attribute::Pets, if id % 5 == 0 { "has pets" } else { "no pets" })
        .with(Attribute::Sport, if id % 2 == 0 { "yes" } else { "no" })
        .with(Attribute::Chronotype, if id % 3 == 1 { "early bird" } else { "night owl" })
        .with(Attribute::Music, ["rock", "pop", "jazz"][(id % 3) as usize])
}

fn training_config() -> TrainingConfig {
    TrainingConfig {
        forest: ForestParams {
            n_estimators: 20,
            ..ForestParams::default()
        },
        ..TrainingConfig::default()
    }
}

fn trained_snapshot() -> TrainedSnapshot {
    let residents: Vec<Resident> = (1..=40).map(create_test_resident).collect();
    let report = train(&residents, &training_config()).unwrap();
    assert_eq!(report.label_source, LabelSource::RuleBased);
    report.snapshot
}

fn population(snapshot: &TrainedSnapshot, ids: impl IntoIterator<Item = u32>) -> Population {
    let residents = ids.into_iter().map(create_test_resident).collect();
    Population::new(residents, &snapshot.encoder).unwrap()
}

#[test]
fn test_integration_four_residents_two_groups() {
    let snapshot = trained_snapshot();
    // Two pairs with near-identical profiles
    let residents = vec![
        create_test_resident(2),
        create_test_resident(14),
        create_test_resident(3),
        create_test_resident(33),
    ];
    let population = Population::new(residents, &snapshot.encoder).unwrap();
    let blender = ScoreBlender::new(&snapshot, &population);

    let result = form_groups(&blender, GroupingRequest { group_count: 2, max_size: 2 }).unwrap();

    assert_eq!(result.groups.len(), 2);
    assert!(result.pending.is_empty());
    for group in &result.groups {
        assert_eq!(group.members.len(), 2);
        assert!(group.average_compatibility.is_some());
    }

    let mut all: Vec<u32> = result.groups.iter().flat_map(|g| g.members.clone()).collect();
    all.sort();
    assert_eq!(all, vec![2, 3, 14, 33]);
}

#[test]
fn test_integration_grouping_partition_respects_capacity() {
    let snapshot = trained_snapshot();
    let population = population(&snapshot, 1..=30);
    let blender = ScoreBlender::new(&snapshot, &population);

    let result = form_groups(&blender, GroupingRequest { group_count: 3, max_size: 8 }).unwrap();

    let mut seen: Vec<u32> = result
        .groups
        .iter()
        .flat_map(|g| g.members.clone())
        .chain(result.pending.iter().copied())
        .collect();
    seen.sort();
    assert_eq!(seen, (1..=30).collect::<Vec<u32>>());
    assert!(result.groups.iter().all(|g| g.members.len() <= 8));

    // Groups ordered by smallest member
    let firsts: Vec<u32> = result.groups.iter().map(|g| g.members[0]).collect();
    assert!(firsts.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_integration_grouping_errors() {
    let snapshot = trained_snapshot();
    let population = population(&snapshot, 1..=4);
    let blender = ScoreBlender::new(&snapshot, &population);

    let too_many = form_groups(&blender, GroupingRequest { group_count: 5, max_size: 2 });
    assert!(matches!(too_many, Err(EngineError::InvalidParameter(_))));

    let zero_capacity = form_groups(&blender, GroupingRequest { group_count: 2, max_size: 0 });
    assert!(matches!(zero_capacity, Err(EngineError::InvalidParameter(_))));
}

#[test]
fn test_integration_blend_bounds_and_errors() {
    let snapshot = trained_snapshot();
    let population = population(&snapshot, 1..=12);
    let blender = ScoreBlender::new(&snapshot, &population);

    for a in 1..=12 {
        for b in (a + 1)..=12 {
            let result = blender.blend(a, b).unwrap();
            assert!((10.0..=95.0).contains(&result.compatibility_pct));
            assert!((0.0..=100.0).contains(&result.model_probability_pct));
            assert!((0.0..=100.0).contains(&result.satisfaction_pct));
        }
    }

    assert!(matches!(blender.blend(4, 4), Err(EngineError::InvalidPair(4))));
    assert!(matches!(blender.blend(4, 99), Err(EngineError::NotFound(99))));
    // Identical ids are reported before unknown ones
    assert!(matches!(blender.blend(99, 99), Err(EngineError::InvalidPair(99))));
}

#[test]
fn test_integration_ranking_order() {
    let snapshot = trained_snapshot();
    let population = population(&snapshot, 1..=25);
    let blender = ScoreBlender::new(&snapshot, &population);

    let ranked = recommend(&blender, 1, Some(15)).unwrap();
    assert_eq!(ranked.base_id, 1);
    assert_eq!(ranked.matches.len(), 15);
    assert!(ranked.matches.iter().all(|m| m.resident_id != 1));

    for pair in ranked.matches.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(
            a.compatibility.compatibility_pct > b.compatibility.compatibility_pct
                || (a.compatibility.compatibility_pct == b.compatibility.compatibility_pct
                    && a.resident_id < b.resident_id)
        );
    }

    let default_limit = recommend(&blender, 1, None).unwrap();
    assert_eq!(default_limit.matches.len(), 5);
    assert!(matches!(recommend(&blender, 1, Some(0)), Err(EngineError::InvalidParameter(_))));
    assert!(matches!(recommend(&blender, 404, None), Err(EngineError::NotFound(404))));
}

#[test]
fn test_integration_explanation_is_additive() {
    let snapshot = trained_snapshot();
    let resident = create_test_resident(7);
    let instance = snapshot.resident_input(&resident);

    let explainer = snapshot.explainer();
    assert!(explainer.supports_attribution());

    match explainer.explain(&instance).unwrap() {
        Explanation::Attribution { probability, .. } => {
            let expected = snapshot.classifier.predict_proba(&instance);
            assert!((probability - expected).abs() < 1e-9);
        }
        other => panic!("expected attribution, got {:?}", other),
    }

    let (bias, contributions) = snapshot.classifier.attribution(&instance).unwrap();
    let total: f64 = bias + contributions.iter().sum::<f64>();
    assert!((total - snapshot.classifier.predict_proba(&instance)).abs() < 1e-9);
}

#[test]
fn test_integration_train_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = ModelStore::new(dir.path());
    let snapshot = trained_snapshot();
    store.save(&snapshot).unwrap();

    let restored = match store.load().unwrap() {
        LoadOutcome::Current(restored) => restored,
        other => panic!("expected current snapshot, got {:?}", other),
    };
    assert_eq!(restored.version, snapshot.version);
    assert_eq!(restored.feature_names, snapshot.feature_names);

    let probe = create_test_resident(11);
    let restored_p = restored.classifier.predict_proba(&restored.resident_input(&probe));
    let original_p = snapshot.classifier.predict_proba(&snapshot.resident_input(&probe));
    assert!((restored_p - original_p).abs() < 1e-9);

    let cell = SnapshotCell::new();
    assert!(store.restore_into(&cell).unwrap());
    assert_eq!(cell.trained().unwrap().version, snapshot.version);
}

#[test]
fn test_integration_training_is_reproducible() {
    let residents: Vec<Resident> = (1..=40).map(create_test_resident).collect();
    let first = train(&residents, &training_config()).unwrap().snapshot;
    let second = train(&residents, &training_config()).unwrap().snapshot;

    assert_eq!(first.classifier, second.classifier);
    assert_ne!(first.version, second.version);
}
