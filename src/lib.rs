//! RoomMatch Algo - compatibility scoring, grouping and explainability engine
//!
//! Encodes resident lifestyle attributes, trains a pairwise compatibility
//! classifier, blends its probability with profile similarity, forms
//! capacity-bounded affinity groups, ranks matches, explains individual
//! predictions and audits the classifier for demographic bias.

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{cosine_similarity, FeatureEncoder, ScoreBlender, TrainingConfig};
pub use engine::{Population, SnapshotCell, TrainedSnapshot};
pub use error::{EngineError, Result};
pub use models::{CompatibilityResult, GroupingRequest, GroupingResult, RankedList, Resident};
