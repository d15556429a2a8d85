// Core algorithm exports
pub mod boosting;
pub mod encoder;
pub mod explain;
pub mod fairness;
pub mod forest;
pub mod grouping;
pub mod kmeans;
pub mod metrics;
pub mod pca;
pub mod ranking;
pub mod scoring;
pub mod similarity;
pub mod training;
pub mod tree;

pub use encoder::{EncodedVector, FeatureEncoder, StandardScaler};
pub use explain::{compare_pair, humanize, Explainer, Explanation, GlobalReport, PairComparison};
pub use fairness::{
    demographic_rows, ethics_summary, privacy_check, sensitive_features, BiasReport, EthicsSummary, FairnessAuditor,
    FairnessThresholds,
};
pub use grouping::{form_groups, GroupingEngine};
pub use ranking::{recommend, Ranker, RankingLimits};
pub use scoring::{blend, blended_score, ScoreBlender};
pub use similarity::cosine_similarity;
pub use training::{train, ModelMetrics, TrainingConfig, TrainingReport};
