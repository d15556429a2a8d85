use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::core::boosting::BoostingParams;
use crate::core::fairness::FairnessThresholds;
use crate::core::forest::ForestParams;
use crate::core::ranking::RankingLimits;
use crate::core::training::{QualityTargets, TrainingConfig};
use crate::models::LabelThresholds;

/// Application configuration
///
/// Every field has a default, so an empty configuration is valid.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub model: ModelSettings,
    #[serde(default)]
    pub residents: ResidentSettings,
    #[serde(default)]
    pub training: TrainingSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub grouping: GroupingSettings,
    #[serde(default)]
    pub ranking: RankingSettings,
    #[serde(default)]
    pub fairness: FairnessSettings,
    #[serde(default)]
    pub explain: ExplainSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }

#[derive(Debug, Clone, Deserialize)]
pub struct ModelSettings {
    /// Directory holding the persisted snapshot
    #[serde(default = "default_model_path")]
    pub path: PathBuf,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self { path: default_model_path() }
    }
}

fn default_model_path() -> PathBuf { PathBuf::from("models") }

#[derive(Debug, Clone, Deserialize)]
pub struct ResidentSettings {
    #[serde(default = "default_residents_path")]
    pub path: PathBuf,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_cache_size")]
    pub cache_size: u64,
}

impl Default for ResidentSettings {
    fn default() -> Self {
        Self {
            path: default_residents_path(),
            cache_ttl_secs: default_cache_ttl(),
            cache_size: default_cache_size(),
        }
    }
}

fn default_residents_path() -> PathBuf { PathBuf::from("data/residents.json") }
fn default_cache_ttl() -> u64 { 300 }
fn default_cache_size() -> u64 { 16 }

#[derive(Debug, Clone, Deserialize)]
pub struct TrainingSettings {
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_true")]
    pub balanced: bool,
    #[serde(default = "default_boosting_stages")]
    pub boosting_stages: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_boosting_depth")]
    pub boosting_depth: usize,
    #[serde(default = "default_n_clusters")]
    pub n_clusters: usize,
    #[serde(default = "default_n_init")]
    pub n_init: usize,
    #[serde(default = "default_pca_components")]
    pub pca_components: usize,
    #[serde(default = "default_test_size")]
    pub test_size: f64,
    #[serde(default = "default_cv_folds")]
    pub cv_folds: usize,
    #[serde(default = "default_random_state")]
    pub random_state: u64,
    #[serde(default = "default_min_accuracy")]
    pub min_accuracy: f64,
    #[serde(default = "default_min_f1")]
    pub min_f1: f64,
    #[serde(default = "default_min_cross_val")]
    pub min_cross_val: f64,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            n_estimators: default_n_estimators(),
            max_depth: default_max_depth(),
            balanced: default_true(),
            boosting_stages: default_boosting_stages(),
            learning_rate: default_learning_rate(),
            boosting_depth: default_boosting_depth(),
            n_clusters: default_n_clusters(),
            n_init: default_n_init(),
            pca_components: default_pca_components(),
            test_size: default_test_size(),
            cv_folds: default_cv_folds(),
            random_state: default_random_state(),
            min_accuracy: default_min_accuracy(),
            min_f1: default_min_f1(),
            min_cross_val: default_min_cross_val(),
        }
    }
}

fn default_n_estimators() -> usize { 100 }
fn default_max_depth() -> usize { 10 }
fn default_true() -> bool { true }
fn default_boosting_stages() -> usize { 50 }
fn default_learning_rate() -> f64 { 0.1 }
fn default_boosting_depth() -> usize { 6 }
fn default_n_clusters() -> usize { 5 }
fn default_n_init() -> usize { 10 }
fn default_pca_components() -> usize { 2 }
fn default_test_size() -> f64 { 0.2 }
fn default_cv_folds() -> usize { 5 }
fn default_random_state() -> u64 { 42 }
fn default_min_accuracy() -> f64 { 0.85 }
fn default_min_f1() -> f64 { 0.80 }
fn default_min_cross_val() -> f64 { 0.75 }

impl TrainingSettings {
    pub fn to_config(&self) -> TrainingConfig {
        TrainingConfig {
            forest: ForestParams {
                n_estimators: self.n_estimators,
                max_depth: self.max_depth,
                random_state: self.random_state,
                balanced: self.balanced,
            },
            boosting: BoostingParams {
                n_estimators: self.boosting_stages,
                learning_rate: self.learning_rate,
                max_depth: self.boosting_depth,
            },
            n_clusters: self.n_clusters,
            n_init: self.n_init,
            pca_components: self.pca_components,
            test_size: self.test_size,
            cv_folds: self.cv_folds,
            random_state: self.random_state,
            quality: QualityTargets {
                min_accuracy: self.min_accuracy,
                min_f1: self.min_f1,
                min_cross_val: self.min_cross_val,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringSettings {
    #[serde(default = "default_excellent")]
    pub excellent: f64,
    #[serde(default = "default_good")]
    pub good: f64,
    #[serde(default = "default_fair")]
    pub fair: f64,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            excellent: default_excellent(),
            good: default_good(),
            fair: default_fair(),
        }
    }
}

fn default_excellent() -> f64 { 80.0 }
fn default_good() -> f64 { 60.0 }
fn default_fair() -> f64 { 40.0 }

impl ScoringSettings {
    pub fn thresholds(&self) -> LabelThresholds {
        LabelThresholds {
            excellent: self.excellent,
            good: self.good,
            fair: self.fair,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupingSettings {
    /// Capacity used when a request does not name one
    #[serde(default = "default_max_size")]
    pub default_max_size: usize,
    #[serde(default = "default_n_init")]
    pub n_init: usize,
    #[serde(default = "default_random_state")]
    pub random_state: u64,
}

impl Default for GroupingSettings {
    fn default() -> Self {
        Self {
            default_max_size: default_max_size(),
            n_init: default_n_init(),
            random_state: default_random_state(),
        }
    }
}

fn default_max_size() -> usize { 4 }

#[derive(Debug, Clone, Deserialize)]
pub struct RankingSettings {
    #[serde(default = "default_candidate_cap")]
    pub candidate_cap: usize,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

impl Default for RankingSettings {
    fn default() -> Self {
        Self {
            candidate_cap: default_candidate_cap(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

fn default_candidate_cap() -> usize { 20 }
fn default_limit() -> usize { 5 }
fn default_max_limit() -> usize { 15 }

impl RankingSettings {
    pub fn limits(&self) -> RankingLimits {
        RankingLimits {
            candidate_cap: self.candidate_cap,
            default_limit: self.default_limit,
            max_limit: self.max_limit,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FairnessSettings {
    #[serde(default = "default_parity")]
    pub demographic_parity: f64,
    #[serde(default = "default_parity")]
    pub equalized_odds: f64,
    #[serde(default = "default_selection_rate")]
    pub selection_rate: f64,
    /// Ethics score required for overall compliance
    #[serde(default = "default_ethics_minimum")]
    pub ethics_minimum: f64,
}

impl Default for FairnessSettings {
    fn default() -> Self {
        Self {
            demographic_parity: default_parity(),
            equalized_odds: default_parity(),
            selection_rate: default_selection_rate(),
            ethics_minimum: default_ethics_minimum(),
        }
    }
}

fn default_parity() -> f64 { 0.10 }
fn default_selection_rate() -> f64 { 0.15 }
fn default_ethics_minimum() -> f64 { 80.0 }

impl FairnessSettings {
    pub fn thresholds(&self) -> FairnessThresholds {
        FairnessThresholds {
            demographic_parity: self.demographic_parity,
            equalized_odds: self.equalized_odds,
            selection_rate: self.selection_rate,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExplainSettings {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_fallback_top")]
    pub fallback_top: usize,
}

impl Default for ExplainSettings {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            fallback_top: default_fallback_top(),
        }
    }
}

fn default_top_k() -> usize { 5 }
fn default_fallback_top() -> usize { 8 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

const ENV_PREFIX: &str = "ROOMMATCH";

fn environment() -> Environment {
    // e.g., ROOMMATCH__SERVER__PORT -> server.port
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with ROOMMATCH__)
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(environment())
            .build()?
            .try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(environment())
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_is_valid() {
        let settings: Settings = Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.ranking.default_limit, 5);
        assert_eq!(settings.grouping.default_max_size, 4);
        assert_eq!(settings.fairness.ethics_minimum, 80.0);
        assert_eq!(settings.explain.fallback_top, 8);
    }

    #[test]
    fn test_training_conversion() {
        let config = TrainingSettings::default().to_config();
        assert_eq!(config.forest.n_estimators, 100);
        assert_eq!(config.forest.max_depth, 10);
        assert_eq!(config.boosting.max_depth, 6);
        assert_eq!(config.cv_folds, 5);
        assert_eq!(config.quality.min_accuracy, 0.85);
    }

    #[test]
    fn test_scoring_thresholds() {
        let thresholds = ScoringSettings::default().thresholds();
        assert_eq!(thresholds.excellent, 80.0);
        assert_eq!(thresholds.good, 60.0);
        assert_eq!(thresholds.fair, 40.0);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[ranking]\nmax_limit = 10\n\n[training]\nn_estimators = 25").unwrap();

        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(settings.ranking.max_limit, 10);
        assert_eq!(settings.ranking.candidate_cap, 20);
        assert_eq!(settings.training.n_estimators, 25);
        assert_eq!(settings.logging.format, "json");
    }

    #[test]
    fn test_default_logging() {
        let level = default_log_level();
        let format = default_log_format();
        assert_eq!(level, "info");
        assert_eq!(format, "json");
    }
}
