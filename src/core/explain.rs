//! Per-prediction and global explanations for the compatibility classifier.
//!
//! Two modes are available. When every tree carries the class distribution of
//! its internal nodes, predictions are decomposed along their decision paths
//! into signed per-feature attributions. Otherwise (models restored from the
//! legacy single-file format) explanations fall back to global importance.

use serde::{Deserialize, Serialize};

use crate::core::forest::RandomForest;
use crate::error::{EngineError, Result};
use crate::models::{Attribute, Resident};

/// Feature identifiers and their readable phrases; a key matches the whole
/// identifier or its `<key>_` prefix
const HUMANIZED: &[(&str, &str)] = &[
    ("smoking_no", "Both non-smokers"),
    ("smoking_yes", "At least one smokes"),
    ("tidiness_tidy", "Preference for order and cleanliness"),
    ("tidiness_messy", "More relaxed about tidiness"),
    ("pets_no pets", "No pets"),
    ("pets_has pets", "Has pets"),
    ("sport_yes", "Active, sporty lifestyle"),
    ("sport_no", "Less focused on sport"),
    ("chronotype_early bird", "Morning schedules"),
    ("chronotype_night owl", "Night-time schedules"),
    ("visits_yes", "Frequent visitors"),
    ("visits_no", "Few visitors"),
    ("instrument_yes", "Plays an instrument"),
    ("gender_male", "Male gender"),
    ("gender_female", "Female gender"),
    ("age", "Age compatibility"),
];

/// Readable phrase for a feature identifier
pub fn humanize(feature: &str) -> String {
    let lowered = feature.to_lowercase();
    let matches = |key: &str| {
        lowered
            .strip_prefix(key)
            .map_or(false, |rest| rest.is_empty() || rest.starts_with('_'))
    };
    if let Some((_, phrase)) = HUMANIZED.iter().find(|(key, _)| matches(*key)) {
        return phrase.to_string();
    }
    title_case(&feature.replace('_', " "))
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    High,
    Low,
}

/// Signed contribution of one feature to a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImpact {
    pub feature: String,
    #[serde(rename = "humanName")]
    pub human_name: String,
    pub impact: f64,
    pub value: f64,
}

/// Feature ranked by global importance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedFeature {
    pub feature: String,
    #[serde(rename = "humanName")]
    pub human_name: String,
    pub importance: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Explanation {
    Attribution {
        probability: f64,
        verdict: Verdict,
        bias: f64,
        #[serde(rename = "topPositive")]
        top_positive: Vec<FeatureImpact>,
        #[serde(rename = "topNegative")]
        top_negative: Vec<FeatureImpact>,
        summary: String,
    },
    Importance {
        prediction: u8,
        confidence: f64,
        #[serde(rename = "topFactors")]
        top_factors: Vec<RankedFeature>,
        summary: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalFeature {
    pub feature: String,
    #[serde(rename = "humanName")]
    pub human_name: String,
    pub importance: f64,
    pub rank: usize,
}

/// Feature whose mean differs between compatible and incompatible residents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub feature: String,
    #[serde(rename = "humanName")]
    pub human_name: String,
    pub difference: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalReport {
    pub importance: Vec<GlobalFeature>,
    #[serde(rename = "highCompatibilityPatterns")]
    pub high_compatibility_patterns: Vec<Pattern>,
    #[serde(rename = "lowCompatibilityPatterns")]
    pub low_compatibility_patterns: Vec<Pattern>,
    pub insights: Vec<String>,
}

/// Minimum class-mean gap for a feature to count as a pattern
const PATTERN_THRESHOLD: f64 = 0.1;

/// Explainer over a published classifier. Borrows the snapshot it was built
/// from; build a new one when a new snapshot is published.
#[derive(Debug, Clone, Copy)]
pub struct Explainer<'a> {
    classifier: &'a RandomForest,
    feature_names: &'a [String],
    top_k: usize,
    fallback_top: usize,
}

impl<'a> Explainer<'a> {
    pub fn new(classifier: &'a RandomForest, feature_names: &'a [String]) -> Self {
        Self {
            classifier,
            feature_names,
            top_k: 5,
            fallback_top: 8,
        }
    }

    pub fn with_limits(mut self, top_k: usize, fallback_top: usize) -> Self {
        self.top_k = top_k;
        self.fallback_top = fallback_top;
        self
    }

    pub fn supports_attribution(&self) -> bool {
        self.classifier.supports_attribution()
    }

    fn feature_name(&self, index: usize) -> String {
        self.feature_names
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("feature_{}", index))
    }

    /// Explain one classifier input, choosing the richest available mode
    pub fn explain(&self, instance: &[f64]) -> Result<Explanation> {
        if instance.len() != self.classifier.n_features() {
            return Err(EngineError::InvalidParameter(format!(
                "instance has {} features, model expects {}",
                instance.len(),
                self.classifier.n_features()
            )));
        }
        if self.supports_attribution() {
            if let Some(explanation) = self.explain_attribution(instance) {
                return Ok(explanation);
            }
        }
        Ok(self.explain_importance(instance))
    }

    /// Signed decision-path attribution; `None` without node values
    pub fn explain_attribution(&self, instance: &[f64]) -> Option<Explanation> {
        let (bias, contributions) = self.classifier.attribution(instance)?;
        let probability = self.classifier.predict_proba(instance);

        let mut impacts: Vec<FeatureImpact> = contributions
            .iter()
            .enumerate()
            .map(|(i, &impact)| {
                let feature = self.feature_name(i);
                FeatureImpact {
                    human_name: humanize(&feature),
                    feature,
                    impact,
                    value: instance.get(i).copied().unwrap_or(0.0),
                }
            })
            .collect();
        impacts.sort_by(|a, b| {
            b.impact
                .abs()
                .partial_cmp(&a.impact.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let top_positive: Vec<FeatureImpact> =
            impacts.iter().filter(|f| f.impact > 0.0).take(self.top_k).cloned().collect();
        let top_negative: Vec<FeatureImpact> =
            impacts.iter().filter(|f| f.impact < 0.0).take(self.top_k).cloned().collect();

        let verdict = if probability >= 0.5 { Verdict::High } else { Verdict::Low };
        let summary = attribution_summary(verdict, &top_positive, &top_negative);

        Some(Explanation::Attribution {
            probability,
            verdict,
            bias,
            top_positive,
            top_negative,
            summary,
        })
    }

    /// Global-importance explanation without sign information
    pub fn explain_importance(&self, instance: &[f64]) -> Explanation {
        let probability = self.classifier.predict_proba(instance);
        let mut ranked: Vec<RankedFeature> = self
            .classifier
            .feature_importances()
            .iter()
            .enumerate()
            .map(|(i, &importance)| {
                let feature = self.feature_name(i);
                RankedFeature {
                    human_name: humanize(&feature),
                    feature,
                    importance,
                    value: instance.get(i).copied().unwrap_or(0.0),
                }
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.importance
                .partial_cmp(&a.importance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(self.fallback_top);

        let summary = match ranked.first() {
            Some(top) => format!("Prediction driven mainly by {} and other key factors", top.human_name),
            None => "No feature importance available".to_string(),
        };

        Explanation::Importance {
            prediction: u8::from(probability >= 0.5),
            confidence: probability.max(1.0 - probability),
            top_factors: ranked,
            summary,
        }
    }

    /// Importance ranking plus the features that separate the two classes
    pub fn global_report(&self, x: &[Vec<f64>], y: &[u8]) -> GlobalReport {
        let mut importance: Vec<GlobalFeature> = self
            .classifier
            .feature_importances()
            .iter()
            .enumerate()
            .map(|(i, &value)| {
                let feature = self.feature_name(i);
                GlobalFeature {
                    human_name: humanize(&feature),
                    feature,
                    importance: value,
                    rank: 0,
                }
            })
            .collect();
        importance.sort_by(|a, b| {
            b.importance
                .partial_cmp(&a.importance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for (rank, entry) in importance.iter_mut().enumerate() {
            entry.rank = rank + 1;
        }

        let (high, low) = self.class_patterns(x, y);
        let insights = insights(&importance);

        GlobalReport {
            importance,
            high_compatibility_patterns: high,
            low_compatibility_patterns: low,
            insights,
        }
    }

    fn class_patterns(&self, x: &[Vec<f64>], y: &[u8]) -> (Vec<Pattern>, Vec<Pattern>) {
        let width = self.classifier.n_features();
        let mut sums = [vec![0.0; width], vec![0.0; width]];
        let mut counts = [0usize; 2];
        for (row, &label) in x.iter().zip(y) {
            let class = usize::from(label == 1);
            counts[class] += 1;
            for (s, v) in sums[class].iter_mut().zip(row) {
                *s += v;
            }
        }
        if counts[0] == 0 || counts[1] == 0 {
            return (Vec::new(), Vec::new());
        }

        let mut high = Vec::new();
        let mut low = Vec::new();
        for i in 0..width {
            let difference = sums[1][i] / counts[1] as f64 - sums[0][i] / counts[0] as f64;
            let feature = self.feature_name(i);
            let pattern = |difference: f64| Pattern {
                human_name: humanize(&feature),
                feature: feature.clone(),
                difference,
            };
            if difference > PATTERN_THRESHOLD && high.len() < 5 {
                high.push(pattern(difference));
            } else if difference < -PATTERN_THRESHOLD && low.len() < 5 {
                low.push(pattern(difference.abs()));
            }
        }
        (high, low)
    }
}

fn attribution_summary(verdict: Verdict, positive: &[FeatureImpact], negative: &[FeatureImpact]) -> String {
    let mut lines = vec![match verdict {
        Verdict::High => "The model predicts HIGH compatibility because:".to_string(),
        Verdict::Low => "The model predicts LOW compatibility because:".to_string(),
    }];

    if !positive.is_empty() {
        lines.push("Favorable factors:".to_string());
        lines.extend(positive.iter().take(3).map(|f| format!("  - {}", f.human_name)));
    }
    if !negative.is_empty() {
        lines.push("Possible sources of conflict:".to_string());
        lines.extend(negative.iter().take(3).map(|f| format!("  - {}", f.human_name)));
    }

    lines.push(match verdict {
        Verdict::High => "Recommendation: a good match; agree on clear house rules.".to_string(),
        Verdict::Low => "Recommendation: talk through habits and expectations before deciding.".to_string(),
    });
    lines.join("\n")
}

fn insights(importance: &[GlobalFeature]) -> Vec<String> {
    if importance.is_empty() {
        return vec!["Not enough data to generate insights".to_string()];
    }
    let mut lines = vec!["Compatibility model insights:".to_string()];
    lines.extend(
        importance
            .iter()
            .take(3)
            .enumerate()
            .map(|(i, f)| format!("{}. {} is a critical factor for compatibility", i + 1, f.human_name)),
    );
    lines.push("The model prioritizes lifestyle habits and living preferences".to_string());
    lines.push("Accuracy improves with more behavioural data".to_string());
    lines
}

/// Attributes compared side by side for a pair
pub const KEY_FACTORS: [Attribute; 6] = [
    Attribute::Smoking,
    Attribute::Pets,
    Attribute::Tidiness,
    Attribute::Sport,
    Attribute::Chronotype,
    Attribute::Visits,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    High,
    Medium,
}

impl Impact {
    pub fn of(attribute: Attribute) -> Self {
        match attribute {
            Attribute::Smoking | Attribute::Tidiness | Attribute::Chronotype => Impact::High,
            _ => Impact::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorComparison {
    pub attribute: Attribute,
    #[serde(rename = "valueA")]
    pub value_a: String,
    #[serde(rename = "valueB")]
    pub value_b: String,
    pub compatible: bool,
    pub impact: Impact,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairComparison {
    #[serde(rename = "residentA")]
    pub resident_a: u32,
    #[serde(rename = "residentB")]
    pub resident_b: u32,
    pub factors: Vec<FactorComparison>,
    /// Share of key factors in agreement, 0-100
    #[serde(rename = "agreementScore")]
    pub agreement_score: f64,
    pub summary: String,
}

/// Side-by-side comparison of the key lifestyle factors of two residents
pub fn compare_pair(a: &Resident, b: &Resident) -> PairComparison {
    let factors: Vec<FactorComparison> = KEY_FACTORS
        .iter()
        .map(|&attribute| {
            let value_a = a.attribute(attribute).to_string();
            let value_b = b.attribute(attribute).to_string();
            FactorComparison {
                attribute,
                compatible: value_a == value_b,
                value_a,
                value_b,
                impact: Impact::of(attribute),
            }
        })
        .collect();

    let agreeing = factors.iter().filter(|f| f.compatible).count();
    let agreement_score = agreeing as f64 / KEY_FACTORS.len() as f64 * 100.0;
    let summary = if agreement_score >= 75.0 {
        "Excellent compatibility on most key aspects"
    } else if agreement_score >= 50.0 {
        "Moderate compatibility; some aspects to discuss"
    } else {
        "Low compatibility; consider other candidates"
    };

    PairComparison {
        resident_a: a.id,
        resident_b: b.id,
        factors,
        agreement_score,
        summary: summary.to_string(),
    }
}
