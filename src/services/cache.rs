use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::services::residents::{load_residents, LoadedResidents, ResidentSource, SourceError};

const POPULATION_KEY: &str = "residents:all";

/// In-memory cache of the parsed resident population
///
/// Re-reading and re-parsing the source on every request is wasteful, so the
/// parsed list is kept for a configured TTL and dropped on retraining.
#[derive(Clone)]
pub struct PopulationCache {
    entries: moka::future::Cache<String, Arc<LoadedResidents>>,
}

impl PopulationCache {
    pub fn new(max_entries: u64, ttl_secs: u64) -> Self {
        let entries = moka::future::CacheBuilder::new(max_entries.max(1))
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();
        Self { entries }
    }

    /// Cached population, loading it from `source` on a miss
    pub async fn get_or_load(&self, source: &dyn ResidentSource) -> Result<Arc<LoadedResidents>, SourceError> {
        if let Some(hit) = self.entries.get(POPULATION_KEY).await {
            tracing::trace!("Population cache hit");
            return Ok(hit);
        }

        tracing::trace!("Population cache miss");
        let loaded = Arc::new(load_residents(source)?);
        self.entries
            .insert(POPULATION_KEY.to_string(), Arc::clone(&loaded))
            .await;
        Ok(loaded)
    }

    pub async fn invalidate(&self) {
        self.entries.invalidate(POPULATION_KEY).await;
        tracing::debug!("Population cache invalidated");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.entry_count(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::residents::StaticSource;
    use serde_json::json;

    fn source(count: u32) -> StaticSource {
        let records = (1..=count)
            .map(|id| json!({ "id": id, "name": format!("R{}", id) }).as_object().cloned().unwrap())
            .collect();
        StaticSource::new(records)
    }

    #[tokio::test]
    async fn test_hit_returns_cached_population() {
        let cache = PopulationCache::new(10, 60);
        let first = cache.get_or_load(&source(2)).await.unwrap();
        // A different source is not consulted while the entry is live
        let second = cache.get_or_load(&source(5)).await.unwrap();

        assert_eq!(first.residents.len(), 2);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let cache = PopulationCache::new(10, 60);
        cache.get_or_load(&source(2)).await.unwrap();
        cache.invalidate().await;

        let reloaded = cache.get_or_load(&source(3)).await.unwrap();
        assert_eq!(reloaded.residents.len(), 3);
    }

    #[test]
    fn test_stats_count_entries() {
        let cache = PopulationCache::new(10, 60);
        assert_eq!(cache.stats().entries, 0);

        tokio_test::block_on(async {
            cache.get_or_load(&source(1)).await.unwrap();
            cache.entries.run_pending_tasks().await;
        });
        assert_eq!(cache.stats().entries, 1);
    }
}
