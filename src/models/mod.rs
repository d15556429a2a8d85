// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    Attribute, CompatibilityResult, Group, GroupingRequest, GroupingResult, LabelThresholds, RankedList, RankedMatch,
    Recommendation, Resident, SharedTrait, UNKNOWN,
};
pub use requests::{CompatibilityRequest, ExplainPairRequest, ExplainRequest, GroupsRequest, RecommendationRequest};
pub use responses::{BiasResponse, ErrorResponse, HealthResponse, HealthStatus, MetricsResponse, TrainResponse};
