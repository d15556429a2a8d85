// Service exports
pub mod cache;
pub mod model_store;
pub mod residents;

pub use cache::{CacheStats, PopulationCache};
pub use model_store::{LoadOutcome, ModelStore};
pub use residents::{load_residents, JsonFileSource, LoadedResidents, ResidentSource, SourceError, StaticSource};
