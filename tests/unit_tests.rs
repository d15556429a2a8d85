// Unit tests for RoomMatch Algo

use roommatch_algo::core::{
    blended_score, compare_pair, cosine_similarity, humanize, privacy_check,
    fairness::{age_band, FairnessAuditor, SensitiveFeatures},
    metrics::{accuracy, weighted_scores},
    FeatureEncoder,
};
use roommatch_algo::models::{Attribute, LabelThresholds, Recommendation, Resident, UNKNOWN};

fn resident(id: u32, smoking: &str, tidiness: &str, pets: &str) -> Resident {
    Resident::new(id, format!("Resident {}", id), Some(20.0 + id as f64))
        .with(Attribute::Smoking, smoking)
        .with(Attribute::Tidiness, tidiness)
        .with(Attribute::Pets, pets)
}

#[test]
fn test_similarity_reflexive_and_symmetric() {
    let a = vec![0.2, 1.0, 0.0, 1.0, 0.0];
    let b = vec![0.7, 0.0, 1.0, 1.0, 0.0];

    assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-9);
    assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
}

#[test]
fn test_similarity_zero_vector() {
    assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
}

#[test]
fn test_blended_score_bounds() {
    assert_eq!(blended_score(1.0, 1.0), 95.0);
    assert_eq!(blended_score(0.0, 0.0), 10.0);
    assert_eq!(blended_score(-1.0, 0.0), 10.0);
    assert!((blended_score(0.6, 0.8) - 70.0).abs() < 1e-9);
}

#[test]
fn test_rule_label() {
    assert_eq!(resident(1, "no", "tidy", "no pets").rule_based_label(), 1);
    assert_eq!(resident(2, "yes", "messy", "has pets").rule_based_label(), 0);
}

#[test]
fn test_encoder_is_deterministic() {
    let residents = vec![
        resident(1, "no", "tidy", "no pets"),
        resident(2, "yes", "messy", "has pets"),
        resident(3, "no", "messy", "no pets"),
    ];
    let encoder = FeatureEncoder::fit(&residents).unwrap();

    let first = encoder.transform(&residents[0]);
    let second = encoder.transform(&residents[0]);
    assert_eq!(first, second);
    assert_eq!(first.len(), encoder.width());
    assert_eq!(encoder.feature_names()[0], "age");
    assert!(encoder.feature_names().contains(&"smoking_no".to_string()));
}

#[test]
fn test_encoder_ignores_unseen_values() {
    let residents = vec![resident(1, "no", "tidy", "no pets"), resident(2, "yes", "messy", "has pets")];
    let encoder = FeatureEncoder::fit(&residents).unwrap();
    let names = encoder.feature_names();

    let stranger = resident(3, "sometimes", "tidy", "no pets");
    let encoded = encoder.transform(&stranger);
    for (name, value) in names.iter().zip(&encoded) {
        if name.starts_with("smoking_") {
            assert_eq!(*value, 0.0, "{}", name);
        }
    }
}

#[test]
fn test_label_thresholds() {
    let thresholds = LabelThresholds::default();
    assert_eq!(thresholds.label(80.0), Recommendation::Excellent);
    assert_eq!(thresholds.label(79.9), Recommendation::Good);
    assert_eq!(thresholds.label(39.9), Recommendation::Poor);
}

fn groups(a: usize, b: usize) -> Vec<String> {
    std::iter::repeat("a".to_string())
        .take(a)
        .chain(std::iter::repeat("b".to_string()).take(b))
        .collect()
}

fn predictions(ones_a: usize, size_a: usize, ones_b: usize, size_b: usize) -> Vec<u8> {
    (0..size_a)
        .map(|i| u8::from(i < ones_a))
        .chain((0..size_b).map(|i| u8::from(i < ones_b)))
        .collect()
}

#[test]
fn test_parity_gap_of_point_four_is_bias() {
    let y_pred = predictions(6, 10, 2, 10);
    let y_true = y_pred.clone();
    let mut sensitive = SensitiveFeatures::new();
    sensitive.insert("gender".to_string(), groups(10, 10));

    let report = FairnessAuditor::default().analyze(&y_true, &y_pred, &sensitive).unwrap();
    let gender = &report.attributes["gender"];
    assert!((gender.demographic_parity_difference - 0.4).abs() < 1e-9);
    assert!(gender.bias_detected);
    assert!(report.bias_detected);
    assert_eq!(report.recommendations.len(), 1);
}

#[test]
fn test_parity_gap_of_point_zero_two_is_not_bias() {
    let y_pred = predictions(25, 50, 24, 50);
    let y_true = y_pred.clone();
    let mut sensitive = SensitiveFeatures::new();
    sensitive.insert("gender".to_string(), groups(50, 50));

    let report = FairnessAuditor::default().analyze(&y_true, &y_pred, &sensitive).unwrap();
    assert!((report.attributes["gender"].demographic_parity_difference - 0.02).abs() < 1e-9);
    assert!(!report.bias_detected);
    assert!(report.recommendations.is_empty());
}

#[test]
fn test_age_band_and_privacy() {
    assert_eq!(age_band(Some(25.0)), "<25");
    assert_eq!(age_band(Some(35.0)), "25-35");
    assert_eq!(age_band(Some(36.0)), ">35");
    assert_eq!(age_band(None), UNKNOWN);

    let report = privacy_check(&["id", "nombre", "telefono", "smoking"]);
    assert!(report.pii_detected);
    assert_eq!(report.anonymization_score, 0.5);
}

#[test]
fn test_compare_pair_agreement() {
    let a = resident(1, "no", "tidy", "no pets");
    let b = resident(2, "no", "tidy", "has pets");
    let comparison = compare_pair(&a, &b);

    assert_eq!(comparison.factors.len(), 6);
    // smoking and tidiness agree, plus the three factors both leave unknown
    assert!((comparison.agreement_score - 5.0 / 6.0 * 100.0).abs() < 1e-9);
    assert!(comparison.summary.starts_with("Excellent"));
}

#[test]
fn test_humanize() {
    assert_eq!(humanize("smoking_no"), "Both non-smokers");
    assert_eq!(humanize("music_rock"), "Music Rock");
}

#[test]
fn test_weighted_scores_zero_division() {
    let y_true = vec![1, 1, 1, 1];
    let y_pred = vec![1, 1, 1, 1];
    assert_eq!(accuracy(&y_true, &y_pred), 1.0);
    let (precision, recall, f1) = weighted_scores(&y_true, &y_pred);
    assert_eq!((precision, recall, f1), (1.0, 1.0, 1.0));
}
