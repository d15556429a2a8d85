use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::fairness::{BiasReport, MonitoringReport, PrivacyReport};
use crate::core::training::{LabelSource, ModelMetrics};
use crate::services::CacheStats;

/// Which kind of model is being served
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ready,
    Legacy,
    Untrained,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    #[serde(rename = "modelVersion")]
    pub model_version: Option<Uuid>,
    /// Population cache occupancy
    pub cache: CacheStats,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

/// Metrics of the served model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub status: HealthStatus,
    #[serde(rename = "modelVersion")]
    pub model_version: Option<Uuid>,
    pub metrics: ModelMetrics,
}

/// Outcome of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainResponse {
    #[serde(rename = "modelVersion")]
    pub model_version: Uuid,
    pub samples: usize,
    /// Source records skipped because they could not be parsed
    pub rejected: usize,
    #[serde(rename = "labelSource")]
    pub label_source: LabelSource,
    pub metrics: ModelMetrics,
    pub bias: BiasReport,
    pub privacy: PrivacyReport,
}

/// Bias analysis of the served classifier over the current population
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasResponse {
    pub bias: BiasReport,
    pub monitoring: MonitoringReport,
}
