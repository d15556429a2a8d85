use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{EngineError, Result};

/// Sentinel substituted for missing or malformed categorical values
pub const UNKNOWN: &str = "unknown";

/// Categorical lifestyle attributes, in encoding order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Gender,
    Smoking,
    Pets,
    Tidiness,
    Sport,
    Chronotype,
    Education,
    Music,
    WeekendPlan,
    Visits,
    Personality,
    Instrument,
}

impl Attribute {
    pub const ALL: [Attribute; 12] = [
        Attribute::Gender,
        Attribute::Smoking,
        Attribute::Pets,
        Attribute::Tidiness,
        Attribute::Sport,
        Attribute::Chronotype,
        Attribute::Education,
        Attribute::Music,
        Attribute::WeekendPlan,
        Attribute::Visits,
        Attribute::Personality,
        Attribute::Instrument,
    ];

    /// Record key and feature-name prefix
    pub fn key(&self) -> &'static str {
        match self {
            Attribute::Gender => "gender",
            Attribute::Smoking => "smoking",
            Attribute::Pets => "pets",
            Attribute::Tidiness => "tidiness",
            Attribute::Sport => "sport",
            Attribute::Chronotype => "chronotype",
            Attribute::Education => "education",
            Attribute::Music => "music",
            Attribute::WeekendPlan => "weekend_plan",
            Attribute::Visits => "visits",
            Attribute::Personality => "personality",
            Attribute::Instrument => "instrument",
        }
    }
}

impl std::fmt::Display for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Resident participating in compatibility matching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resident {
    pub id: u32,
    pub name: String,
    pub age: Option<f64>,
    /// Every attribute in `Attribute::ALL` is present; missing ones hold `UNKNOWN`
    pub attributes: BTreeMap<Attribute, String>,
    #[serde(default)]
    pub compatible: Option<u8>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Resident {
    pub fn new(id: u32, name: impl Into<String>, age: Option<f64>) -> Self {
        let attributes = Attribute::ALL
            .iter()
            .map(|a| (*a, UNKNOWN.to_string()))
            .collect();

        Self {
            id,
            name: name.into(),
            age,
            attributes,
            compatible: None,
            created_at: None,
        }
    }

    /// Builder-style attribute setter; the value is normalized
    pub fn with(mut self, attribute: Attribute, value: &str) -> Self {
        self.attributes.insert(attribute, normalize(value));
        self
    }

    pub fn with_label(mut self, compatible: u8) -> Self {
        self.compatible = Some(compatible);
        self
    }

    pub fn attribute(&self, attribute: Attribute) -> &str {
        self.attributes
            .get(&attribute)
            .map(String::as_str)
            .unwrap_or(UNKNOWN)
    }

    /// Rule-derived compatibility label used when no ground truth is available.
    ///
    /// One point each for non-smoker, tidy and no pets; label is 1 with two or
    /// more points.
    pub fn rule_based_label(&self) -> u8 {
        let mut points = 0;
        if self.attribute(Attribute::Smoking) == "no" {
            points += 1;
        }
        if self.attribute(Attribute::Tidiness) == "tidy" {
            points += 1;
        }
        if self.attribute(Attribute::Pets) == "no pets" {
            points += 1;
        }

        if points >= 2 { 1 } else { 0 }
    }

    /// Parse a resident from a plain key/value record.
    ///
    /// Missing attributes fall back to `UNKNOWN`; an unusable identifier is an
    /// `EncodingFailure`.
    pub fn from_record(record: &Map<String, Value>) -> Result<Self> {
        let id = parse_id(record.get("id"))?;

        let name = match record.get("name") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            _ => format!("Resident {}", id),
        };

        let age = match record.get("age") {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            Some(other) => {
                tracing::warn!("Resident {}: ignoring non-numeric age {}", id, other);
                None
            }
        };

        let attributes = Attribute::ALL
            .iter()
            .map(|a| (*a, categorical_value(record.get(a.key()))))
            .collect();

        let compatible = match record.get("compatible") {
            Some(Value::Bool(b)) => Some(u8::from(*b)),
            Some(Value::Number(n)) => match n.as_u64() {
                Some(0) => Some(0),
                Some(1) => Some(1),
                _ => None,
            },
            _ => None,
        };

        let created_at = record
            .get("created_at")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(Self {
            id,
            name,
            age,
            attributes,
            compatible,
            created_at,
        })
    }

    /// Parse a batch, skipping records that cannot be recovered
    pub fn parse_batch(records: &[Map<String, Value>]) -> (Vec<Resident>, Vec<EngineError>) {
        let mut residents = Vec::with_capacity(records.len());
        let mut rejected = Vec::new();

        for record in records {
            match Resident::from_record(record) {
                Ok(resident) => residents.push(resident),
                Err(e) => {
                    tracing::warn!("Skipping resident record: {}", e);
                    rejected.push(e);
                }
            }
        }

        (residents, rejected)
    }
}

fn normalize(value: &str) -> String {
    let trimmed = value.trim().to_lowercase();
    if trimmed.is_empty() {
        UNKNOWN.to_string()
    } else {
        trimmed
    }
}

fn categorical_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => normalize(s),
        Some(Value::Bool(true)) => "yes".to_string(),
        Some(Value::Bool(false)) => "no".to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => UNKNOWN.to_string(),
    }
}

fn parse_id(value: Option<&Value>) -> Result<u32> {
    let raw = match value {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    match raw {
        Some(id) if id > 0 && id <= u32::MAX as u64 => Ok(id as u32),
        _ => Err(EngineError::EncodingFailure(format!(
            "record has no usable positive integer id (got {:?})",
            value
        ))),
    }
}

/// Categorical recommendation attached to a compatibility score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Excellent,
    Good,
    Fair,
    Poor,
}

/// Score thresholds for the recommendation label
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LabelThresholds {
    pub excellent: f64,
    pub good: f64,
    pub fair: f64,
}

impl Default for LabelThresholds {
    fn default() -> Self {
        Self {
            excellent: 80.0,
            good: 60.0,
            fair: 40.0,
        }
    }
}

impl LabelThresholds {
    pub fn label(&self, compatibility_pct: f64) -> Recommendation {
        if compatibility_pct >= self.excellent {
            Recommendation::Excellent
        } else if compatibility_pct >= self.good {
            Recommendation::Good
        } else if compatibility_pct >= self.fair {
            Recommendation::Fair
        } else {
            Recommendation::Poor
        }
    }
}

/// Blended compatibility between two residents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityResult {
    #[serde(rename = "residentA")]
    pub resident_a: u32,
    #[serde(rename = "residentB")]
    pub resident_b: u32,
    #[serde(rename = "compatibilityPct")]
    pub compatibility_pct: f64,
    #[serde(rename = "similarityPct")]
    pub similarity_pct: f64,
    #[serde(rename = "modelProbabilityPct")]
    pub model_probability_pct: f64,
    #[serde(rename = "satisfactionPct")]
    pub satisfaction_pct: f64,
    pub recommendation: Recommendation,
}

/// Attribute value held in common
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedTrait {
    pub attribute: Attribute,
    pub value: String,
}

/// Capacity-bounded affinity group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub members: Vec<u32>,
    /// `None` for single-member groups
    #[serde(rename = "averageCompatibility")]
    pub average_compatibility: Option<f64>,
    #[serde(rename = "commonTraits")]
    pub common_traits: Vec<SharedTrait>,
}

/// Groups plus residents left out by capacity constraints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupingResult {
    pub groups: Vec<Group>,
    pub pending: Vec<u32>,
}

/// Grouping parameters
#[derive(Debug, Clone, Copy)]
pub struct GroupingRequest {
    pub group_count: usize,
    pub max_size: usize,
}

/// One ranked candidate for a base resident
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedMatch {
    #[serde(rename = "residentId")]
    pub resident_id: u32,
    pub name: String,
    pub age: Option<f64>,
    pub compatibility: CompatibilityResult,
    pub shared: Vec<SharedTrait>,
    pub differing: Vec<Attribute>,
}

/// Ranked candidates for a base resident
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedList {
    #[serde(rename = "baseId")]
    pub base_id: u32,
    pub matches: Vec<RankedMatch>,
    /// Mean score of the ten best candidates
    #[serde(rename = "averageTopScore")]
    pub average_top_score: Option<f64>,
    /// Candidates scoring 70 or more
    #[serde(rename = "strongCandidates")]
    pub strong_candidates: usize,
}
