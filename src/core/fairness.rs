//! Demographic bias and privacy auditing of classifier output.
//!
//! Findings are advisory: they are reported alongside the model and never
//! block training or publishing.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::metrics::{accuracy, rates};
use crate::error::{EngineError, Result};
use crate::models::{Attribute, Resident, UNKNOWN};

/// Fields that directly identify a person, including source-system aliases
pub const PII_FIELDS: [&str; 9] = [
    "name",
    "phone",
    "email",
    "address",
    "national_id",
    "nombre",
    "telefono",
    "direccion",
    "cedula",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FairnessThresholds {
    pub demographic_parity: f64,
    pub equalized_odds: f64,
    /// Group positive-rate spread that raises a monitoring alert
    pub selection_rate: f64,
}

impl Default for FairnessThresholds {
    fn default() -> Self {
        Self {
            demographic_parity: 0.10,
            equalized_odds: 0.10,
            selection_rate: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeBias {
    #[serde(rename = "selectionRates")]
    pub selection_rates: BTreeMap<String, f64>,
    #[serde(rename = "demographicParityDifference")]
    pub demographic_parity_difference: f64,
    #[serde(rename = "equalizedOddsDifference")]
    pub equalized_odds_difference: f64,
    #[serde(rename = "biasDetected")]
    pub bias_detected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasReport {
    #[serde(rename = "overallAccuracy")]
    pub overall_accuracy: f64,
    pub attributes: BTreeMap<String, AttributeBias>,
    #[serde(rename = "biasDetected")]
    pub bias_detected: bool,
    pub recommendations: Vec<String>,
    #[serde(rename = "ethicsScore")]
    pub ethics_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivacyReport {
    #[serde(rename = "piiDetected")]
    pub pii_detected: bool,
    #[serde(rename = "anonymizationScore")]
    pub anonymization_score: f64,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringReport {
    #[serde(rename = "totalPredictions")]
    pub total_predictions: usize,
    #[serde(rename = "positiveRate")]
    pub positive_rate: f64,
    pub alerts: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BiasStatus {
    Detected,
    Clear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EthicsSummary {
    #[serde(rename = "ethicsScore")]
    pub ethics_score: f64,
    #[serde(rename = "biasStatus")]
    pub bias_status: BiasStatus,
    #[serde(rename = "privacyScore")]
    pub privacy_score: f64,
    #[serde(rename = "overallCompliance")]
    pub overall_compliance: bool,
    pub recommendations: Vec<String>,
}

/// Sensitive attribute name -> group value per row
pub type SensitiveFeatures = BTreeMap<String, Vec<String>>;

/// Positive-prediction rate per group
fn group_rates(y_pred: &[u8], groups: &[String]) -> BTreeMap<String, f64> {
    let mut totals: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for (&prediction, group) in y_pred.iter().zip(groups) {
        let entry = totals.entry(group.as_str()).or_insert((0, 0));
        entry.0 += usize::from(prediction == 1);
        entry.1 += 1;
    }
    totals
        .into_iter()
        .map(|(group, (positive, count))| (group.to_string(), positive as f64 / count as f64))
        .collect()
}

fn spread<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let (min, max) = values
        .into_iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if min.is_finite() && max.is_finite() {
        max - min
    } else {
        0.0
    }
}

/// Largest spread of true-positive or false-positive rate across groups
fn equalized_odds_difference(y_true: &[u8], y_pred: &[u8], groups: &[String]) -> f64 {
    let labels: BTreeSet<&str> = groups.iter().map(String::as_str).collect();
    let mut tprs = Vec::new();
    let mut fprs = Vec::new();

    for label in labels {
        let (truth, predicted): (Vec<u8>, Vec<u8>) = y_true
            .iter()
            .zip(y_pred)
            .zip(groups)
            .filter(|(_, g)| g.as_str() == label)
            .map(|((&t, &p), _)| (t, p))
            .unzip();
        let (tpr, fpr) = rates(&truth, &predicted);
        tprs.extend(tpr);
        fprs.extend(fpr);
    }

    spread(tprs).max(spread(fprs))
}

/// Aggregate ethics score: 100, -30 on bias, -5 per recommendation, +20 x accuracy
pub fn ethics_score(bias_detected: bool, recommendations: usize, overall_accuracy: f64) -> f64 {
    let mut score: f64 = 100.0;
    if bias_detected {
        score -= 30.0;
    }
    score -= 5.0 * recommendations as f64;
    score += 20.0 * overall_accuracy;
    score.clamp(0.0, 100.0)
}

/// Age band used as a sensitive attribute; bins are right-inclusive
pub fn age_band(age: Option<f64>) -> &'static str {
    match age {
        Some(a) if a > 0.0 && a <= 25.0 => "<25",
        Some(a) if a > 25.0 && a <= 35.0 => "25-35",
        Some(a) if a > 35.0 && a <= 100.0 => ">35",
        _ => UNKNOWN,
    }
}

/// Default sensitive attributes of a population: gender and age band
pub fn sensitive_features(residents: &[Resident]) -> SensitiveFeatures {
    let mut features = SensitiveFeatures::new();
    features.insert(
        Attribute::Gender.key().to_string(),
        residents.iter().map(|r| r.attribute(Attribute::Gender).to_string()).collect(),
    );
    features.insert(
        "age_group".to_string(),
        residents.iter().map(|r| age_band(r.age).to_string()).collect(),
    );
    features
}

/// Per-row view of sensitive features, as `monitor` expects
pub fn demographic_rows(features: &SensitiveFeatures) -> Vec<BTreeMap<String, String>> {
    let rows = features.values().map(Vec::len).max().unwrap_or(0);
    (0..rows)
        .map(|row| {
            features
                .iter()
                .map(|(name, values)| {
                    let value = values.get(row).cloned().unwrap_or_else(|| UNKNOWN.to_string());
                    (name.clone(), value)
                })
                .collect()
        })
        .collect()
}

/// Flag directly identifying columns among the input fields
pub fn privacy_check<S: AsRef<str>>(columns: &[S]) -> PrivacyReport {
    let present: Vec<&str> = PII_FIELDS
        .iter()
        .copied()
        .filter(|field| columns.iter().any(|c| c.as_ref() == *field))
        .collect();

    let anonymization_score = if columns.is_empty() {
        1.0
    } else {
        1.0 - present.len() as f64 / columns.len() as f64
    };

    let recommendations = if present.is_empty() {
        Vec::new()
    } else {
        vec![
            "Anonymize or encrypt sensitive fields".to_string(),
            "Hash unique identifiers".to_string(),
            "Consider differential privacy techniques".to_string(),
        ]
    };

    PrivacyReport {
        pii_detected: !present.is_empty(),
        anonymization_score,
        issues: present.iter().map(|f| format!("Sensitive field detected: {}", f)).collect(),
        recommendations,
    }
}

/// Ethics summary: 100, -30 on bias, -20 when identifying fields are present
pub fn ethics_summary(bias: &BiasReport, privacy: &PrivacyReport, minimum: f64) -> EthicsSummary {
    let mut score: f64 = 100.0;
    if bias.bias_detected {
        score -= 30.0;
    }
    if privacy.pii_detected {
        score -= 20.0;
    }
    let score = score.max(0.0);

    EthicsSummary {
        ethics_score: score,
        bias_status: if bias.bias_detected { BiasStatus::Detected } else { BiasStatus::Clear },
        privacy_score: privacy.anonymization_score * 100.0,
        overall_compliance: score >= minimum,
        recommendations: bias.recommendations.clone(),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FairnessAuditor {
    thresholds: FairnessThresholds,
}

impl FairnessAuditor {
    pub fn new(thresholds: FairnessThresholds) -> Self {
        Self { thresholds }
    }

    /// Group-wise bias metrics for every sensitive attribute
    pub fn analyze(&self, y_true: &[u8], y_pred: &[u8], sensitive: &SensitiveFeatures) -> Result<BiasReport> {
        if y_true.len() != y_pred.len() {
            return Err(EngineError::InvalidParameter(format!(
                "{} labels but {} predictions",
                y_true.len(),
                y_pred.len()
            )));
        }

        let mut attributes = BTreeMap::new();
        let mut recommendations = Vec::new();

        for (name, groups) in sensitive {
            if groups.len() != y_pred.len() {
                return Err(EngineError::InvalidParameter(format!(
                    "sensitive attribute '{}' has {} values for {} predictions",
                    name,
                    groups.len(),
                    y_pred.len()
                )));
            }

            let selection_rates = group_rates(y_pred, groups);
            let demographic_parity_difference = spread(selection_rates.values().copied());
            let equalized_odds_difference = equalized_odds_difference(y_true, y_pred, groups);
            let bias_detected = demographic_parity_difference > self.thresholds.demographic_parity;

            if bias_detected {
                warn!(attribute = %name, difference = demographic_parity_difference, "Bias detected");
                recommendations.push(format!(
                    "Bias detected in {}: difference {:.3}",
                    name, demographic_parity_difference
                ));
            }

            attributes.insert(
                name.clone(),
                AttributeBias {
                    selection_rates,
                    demographic_parity_difference,
                    equalized_odds_difference,
                    bias_detected,
                },
            );
        }

        let overall_accuracy = accuracy(y_true, y_pred);
        let bias_detected = attributes.values().any(|a| a.bias_detected);

        Ok(BiasReport {
            overall_accuracy,
            ethics_score: ethics_score(bias_detected, recommendations.len(), overall_accuracy),
            attributes,
            bias_detected,
            recommendations,
        })
    }

    /// Lightweight check of a batch of live predictions
    pub fn monitor(&self, predictions: &[u8], demographics: &[BTreeMap<String, String>]) -> Result<MonitoringReport> {
        if predictions.len() != demographics.len() {
            return Err(EngineError::InvalidParameter(
                "predictions and demographics differ in length".to_string(),
            ));
        }

        let positive_rate = if predictions.is_empty() {
            0.0
        } else {
            predictions.iter().filter(|&&p| p == 1).count() as f64 / predictions.len() as f64
        };

        let mut alerts = Vec::new();
        if let Some(first) = demographics.first() {
            for key in first.keys() {
                let groups: Vec<String> = demographics
                    .iter()
                    .map(|d| d.get(key).cloned().unwrap_or_else(|| UNKNOWN.to_string()))
                    .collect();
                let by_group = group_rates(predictions, &groups);
                if by_group.len() > 1 && spread(by_group.values().copied()) > self.thresholds.selection_rate {
                    alerts.push(format!("Significant difference in {}: {:?}", key, by_group));
                }
            }
        }

        Ok(MonitoringReport {
            total_predictions: predictions.len(),
            positive_rate,
            alerts,
        })
    }
}
