// Route exports
pub mod error;
pub mod ethics;
pub mod matching;
pub mod model;

use std::sync::Arc;

use actix_web::web;

use crate::config::Settings;
use crate::engine::{Population, SnapshotCell, TrainedSnapshot};
use crate::error::EngineError;
use crate::models::Resident;
use crate::services::{LoadedResidents, ModelStore, PopulationCache, ResidentSource};

pub use error::{json_payload_error, query_payload_error, ApiError};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub cell: Arc<SnapshotCell>,
    pub store: ModelStore,
    pub source: Arc<dyn ResidentSource>,
    pub cache: PopulationCache,
    pub settings: Arc<Settings>,
    /// Held for a whole train, save and publish cycle
    pub training: Arc<tokio::sync::Mutex<()>>,
}

impl AppState {
    pub fn new(settings: Settings, source: Arc<dyn ResidentSource>) -> Self {
        Self {
            cell: Arc::new(SnapshotCell::new()),
            store: ModelStore::new(settings.model.path.clone()),
            cache: PopulationCache::new(settings.residents.cache_size, settings.residents.cache_ttl_secs),
            source,
            settings: Arc::new(settings),
            training: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub async fn residents(&self) -> Result<Arc<LoadedResidents>, ApiError> {
        Ok(self.cache.get_or_load(self.source.as_ref()).await?)
    }

    /// Published snapshot plus the current population encoded with it
    pub async fn population(&self) -> Result<(Arc<TrainedSnapshot>, Population), ApiError> {
        let snapshot = self.cell.trained()?;
        let loaded = self.residents().await?;
        let population = Population::new(loaded.residents.clone(), &snapshot.encoder)?;
        Ok((snapshot, population))
    }
}

pub(crate) fn find_resident(loaded: &LoadedResidents, id: u32) -> Result<&Resident, ApiError> {
    loaded
        .residents
        .iter()
        .find(|r| r.id == id)
        .ok_or(ApiError::Engine(EngineError::NotFound(id)))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(model::configure)
            .configure(matching::configure)
            .configure(ethics::configure),
    );
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::services::StaticSource;
    use serde_json::{json, Map, Value};

    /// 24 residents with a mix of rule-derived labels
    pub fn records() -> Vec<Map<String, Value>> {
        (1..=24u32)
            .map(|i| {
                let value = json!({
                    "id": i,
                    "name": format!("Resident {}", i),
                    "age": 19 + i,
                    "gender": if i % 2 == 0 { "female" } else { "male" },
                    "smoking": if i % 2 == 0 { "no" } else { "yes" },
                    "tidiness": if i % 3 == 0 { "messy" } else { "tidy" },
                    "pets": if i % 4 == 0 { "has pets" } else { "no pets" },
                    "sport": if i % 5 == 0 { "never" } else { "often" },
                    "chronotype": if i % 2 == 0 { "early bird" } else { "night owl" },
                });
                value.as_object().cloned().unwrap_or_default()
            })
            .collect()
    }

    pub fn state() -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.model.path = dir.path().to_path_buf();
        settings.training.n_estimators = 15;
        settings.training.boosting_stages = 10;
        (AppState::new(settings, Arc::new(StaticSource::new(records()))), dir)
    }
}
