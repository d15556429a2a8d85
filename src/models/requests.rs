use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request to score one pair of residents
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CompatibilityRequest {
    #[validate(range(min = 1))]
    #[serde(alias = "resident_a", rename = "residentA")]
    pub resident_a: u32,
    #[validate(range(min = 1))]
    #[serde(alias = "resident_b", rename = "residentB")]
    pub resident_b: u32,
}

/// Request for the best matches of one resident
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecommendationRequest {
    #[validate(range(min = 1))]
    #[serde(alias = "resident_id", rename = "residentId")]
    pub resident_id: u32,
    /// Defaults to the configured limit; larger values are capped
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Request to partition the population into groups
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GroupsRequest {
    #[validate(range(min = 2, message = "at least two groups are required"))]
    #[serde(alias = "group_count", rename = "groupCount")]
    pub group_count: usize,
    #[validate(range(min = 1))]
    #[serde(default)]
    #[serde(alias = "max_size", rename = "maxSize")]
    pub max_size: Option<usize>,
}

/// Request to explain one prediction
///
/// `residentId` explains the resident's own encoded profile. A raw
/// `instance` vector is accepted too, which is the only option while a
/// legacy model without an encoder is being served.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ExplainRequest {
    #[validate(range(min = 1))]
    #[serde(default)]
    #[serde(alias = "resident_id", rename = "residentId")]
    pub resident_id: Option<u32>,
    #[validate(length(min = 1))]
    #[serde(default)]
    pub instance: Option<Vec<f64>>,
}

/// Request to compare the key lifestyle factors of two residents
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExplainPairRequest {
    #[validate(range(min = 1))]
    #[serde(alias = "resident_a", rename = "residentA")]
    pub resident_a: u32,
    #[validate(range(min = 1))]
    #[serde(alias = "resident_b", rename = "residentB")]
    pub resident_b: u32,
}
